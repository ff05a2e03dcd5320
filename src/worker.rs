//! Worker loop — the surrounding framework that feeds the dispatcher.
//!
//! Pulls envelopes off the queue one at a time and processes each to
//! completion. A handler error is logged here and the loop moves on; with
//! a durable transport, acknowledgement and redelivery decisions belong
//! to that transport, not to the handlers.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::dispatch::Dispatcher;
use crate::queue::MemoryQueue;

/// Run the consume loop until the task is dropped.
pub async fn run(queue: Arc<MemoryQueue>, dispatcher: Arc<Dispatcher>) {
    info!("Worker loop started");
    loop {
        let envelope = queue.recv().await;
        if let Err(e) = dispatcher.dispatch(&envelope).await {
            error!(
                job_id = %envelope.job_id,
                job = envelope.event.kind(),
                error = %e,
                "Job handler failed"
            );
        }
    }
}

/// Spawn the consume loop as a background task.
pub fn spawn(queue: Arc<MemoryQueue>, dispatcher: Arc<Dispatcher>) -> JoinHandle<()> {
    tokio::spawn(run(queue, dispatcher))
}

/// Process queued envelopes until the queue is empty, including any
/// continuations published along the way. Returns the number of
/// envelopes processed. Used by tests and one-shot maintenance runs.
pub async fn drain(queue: &MemoryQueue, dispatcher: &Dispatcher) -> usize {
    let mut processed = 0;
    while let Some(envelope) = queue.pop().await {
        processed += 1;
        if let Err(e) = dispatcher.dispatch(&envelope).await {
            error!(
                job_id = %envelope.job_id,
                job = envelope.event.kind(),
                error = %e,
                "Job handler failed"
            );
        }
    }
    processed
}
