//! Device token cleanup — depends on the flaky push gateway.
//!
//! Transient gateway unavailability resubmits the event through the retry
//! coordinator; every other error propagates to the worker loop as a
//! genuine failure.

use tracing::{info, warn};

use crate::dispatch::HandlerDeps;
use crate::error::{Error, PushError, Result};
use crate::event::{Envelope, JobEvent};
use crate::retry::TerminalFailureHandler;

/// Terminal handler: nothing to clean up beyond a log line.
struct ClearTokensExhausted;

impl TerminalFailureHandler for ClearTokensExhausted {
    fn on_terminal_failure(&self, event: &JobEvent) {
        if let JobEvent::ClearDeviceTokens { user_id } = event {
            warn!(
                user_id,
                "Maximum retries exceeded clearing device tokens"
            );
        }
    }
}

/// Execute one `clear_device_tokens` event.
pub async fn clear_device_tokens(
    deps: &HandlerDeps,
    envelope: &Envelope,
    user_id: i64,
) -> Result<()> {
    info!(user_id, "Clearing push device tokens");

    match deps.push.clear_device_tokens(user_id).await {
        Ok(()) => Ok(()),
        Err(PushError::Unavailable { reason }) => {
            info!(user_id, %reason, "Push gateway unavailable, will retry");
            deps.retry.resubmit(envelope, &ClearTokensExhausted).await?;
            Ok(())
        }
        Err(e) => Err(Error::Push(e)),
    }
}
