//! Notification sink — user-facing and administrative notices.
//!
//! Delivery is an external collaborator's concern and strictly
//! best-effort: the methods are infallible and implementations log their
//! own failures rather than surfacing them into job control flow.

use async_trait::async_trait;
use tracing::info;

/// Outbound notifications emitted by stateful jobs.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Send a direct message to one user.
    async fn notify_user(&self, user_id: i64, message: &str);

    /// Broadcast a state change to administrative listeners of a tenant.
    async fn notify_observers(&self, tenant_id: i64);
}

/// Sink that only writes to the log. Used when no messaging backend is
/// wired up.
pub struct LogNotifier;

#[async_trait]
impl NotificationSink for LogNotifier {
    async fn notify_user(&self, user_id: i64, message: &str) {
        info!(user_id, message, "User notification");
    }

    async fn notify_observers(&self, tenant_id: i64) {
        info!(tenant_id, "Observer notification");
    }
}
