//! Push gateway client — the flaky external dependency behind token
//! cleanup and server metadata sync.
//!
//! The gateway sits on another network and is routinely unavailable;
//! connection failures, timeouts, 429 and 5xx all map to
//! [`PushError::Unavailable`], the transient kind the retry coordinator
//! acts on. Other non-success statuses are treated as permanent.

use async_trait::async_trait;

use crate::error::PushError;

/// Remote push notification gateway.
#[async_trait]
pub trait PushGateway: Send + Sync {
    /// Unregister every device token held for a user.
    async fn clear_device_tokens(&self, user_id: i64) -> Result<(), PushError>;

    /// Push this server's metadata for a tenant to the gateway.
    async fn sync_server_metadata(&self, tenant_id: i64) -> Result<(), PushError>;
}

/// HTTP implementation of [`PushGateway`].
pub struct HttpPushGateway {
    base_url: String,
    client: reqwest::Client,
}

impl HttpPushGateway {
    pub fn new(base_url: String) -> Self {
        Self {
            base_url,
            client: reqwest::Client::new(),
        }
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/api/v1/{path}", self.base_url.trim_end_matches('/'))
    }

    async fn post(&self, path: &str, body: serde_json::Value) -> Result<(), PushError> {
        let resp = self
            .client
            .post(self.api_url(path))
            .json(&body)
            .send()
            .await
            .map_err(|e| PushError::Unavailable {
                reason: e.to_string(),
            })?;

        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }

        let reason = resp.text().await.unwrap_or_default();
        if status.is_server_error() || status.as_u16() == 429 {
            return Err(PushError::Unavailable {
                reason: format!("{status}: {reason}"),
            });
        }
        Err(PushError::Request {
            status: status.as_u16(),
            reason,
        })
    }
}

#[async_trait]
impl PushGateway for HttpPushGateway {
    async fn clear_device_tokens(&self, user_id: i64) -> Result<(), PushError> {
        self.post(
            "devices/clear",
            serde_json::json!({ "user_id": user_id }),
        )
        .await
    }

    async fn sync_server_metadata(&self, tenant_id: i64) -> Result<(), PushError> {
        self.post(
            "server/metadata",
            serde_json::json!({ "tenant_id": tenant_id }),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_url_joins_cleanly() {
        let gateway = HttpPushGateway::new("https://push.example.com/".into());
        assert_eq!(
            gateway.api_url("devices/clear"),
            "https://push.example.com/api/v1/devices/clear"
        );
    }
}
