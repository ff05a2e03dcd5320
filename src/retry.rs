//! Retry coordination for jobs that hit a flaky external dependency.
//!
//! The attempt counter lives in the delivery envelope; the coordinator
//! bumps it and republishes until the bound is reached, then hands the
//! event to a terminal-failure handler exactly once. Terminal handlers are
//! infallible by signature — there is no further retry path for them to
//! throw into.

use std::sync::Arc;

use tracing::warn;

use crate::error::QueueError;
use crate::event::{Envelope, JobEvent};
use crate::queue::JobQueue;

/// Best-effort cleanup invoked when a job runs out of attempts.
pub trait TerminalFailureHandler: Send + Sync {
    fn on_terminal_failure(&self, event: &JobEvent);
}

/// Default terminal handler: log and move on.
pub struct LogTerminalFailure;

impl TerminalFailureHandler for LogTerminalFailure {
    fn on_terminal_failure(&self, event: &JobEvent) {
        warn!(job = event.kind(), "Maximum retries exceeded, dropping event");
    }
}

/// Resubmits transiently-failed jobs up to a configured bound.
pub struct RetryCoordinator {
    queue: Arc<dyn JobQueue>,
    max_attempts: u32,
}

impl RetryCoordinator {
    pub fn new(queue: Arc<dyn JobQueue>, max_attempts: u32) -> Self {
        Self {
            queue,
            max_attempts,
        }
    }

    /// Resubmit `envelope` for a later attempt, or invoke `on_terminal`
    /// if the attempt bound has been reached.
    ///
    /// Called after a delivery failed transiently, so the delivery that
    /// just ran counts as attempt `envelope.attempts + 1`.
    pub async fn resubmit(
        &self,
        envelope: &Envelope,
        on_terminal: &dyn TerminalFailureHandler,
    ) -> Result<(), QueueError> {
        let attempts = envelope.attempts + 1;
        if attempts >= self.max_attempts {
            on_terminal.on_terminal_failure(&envelope.event);
            return Ok(());
        }

        warn!(
            job_id = %envelope.job_id,
            job = envelope.event.kind(),
            attempts,
            max_attempts = self.max_attempts,
            "Transient failure, requeueing for retry"
        );
        self.queue
            .publish(Envelope {
                job_id: envelope.job_id,
                attempts,
                event: envelope.event.clone(),
            })
            .await
    }
}
