//! Job queue — publish side of the durable transport, plus the in-process
//! queue used by the binary and tests.
//!
//! The real transport (persistence, at-least-once delivery) is an external
//! collaborator; handlers only ever see the `publish` capability. The
//! worker assumes redelivery can happen and is written to tolerate it.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};
use tracing::debug;

use crate::error::QueueError;
use crate::event::Envelope;

/// Publish capability handed to job handlers for self-requeue.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Enqueue an envelope for a later, independent delivery.
    async fn publish(&self, envelope: Envelope) -> Result<(), QueueError>;
}

/// In-process FIFO queue backed by a `VecDeque`.
///
/// Stands in for the external transport when running locally. Does not
/// persist and does not redeliver on handler failure — those remain the
/// transport's responsibilities in a real deployment.
pub struct MemoryQueue {
    items: Mutex<VecDeque<Envelope>>,
    notify: Notify,
}

impl MemoryQueue {
    /// Create a new empty queue.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            items: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
        })
    }

    /// Pop the next envelope without waiting.
    pub async fn pop(&self) -> Option<Envelope> {
        self.items.lock().await.pop_front()
    }

    /// Wait for the next envelope.
    pub async fn recv(&self) -> Envelope {
        loop {
            // Register for a wakeup before checking, so a publish between
            // the check and the await is not missed.
            let notified = self.notify.notified();
            if let Some(envelope) = self.items.lock().await.pop_front() {
                return envelope;
            }
            notified.await;
        }
    }

    /// Number of queued envelopes.
    pub async fn len(&self) -> usize {
        self.items.lock().await.len()
    }

    /// Check if the queue is empty.
    pub async fn is_empty(&self) -> bool {
        self.items.lock().await.is_empty()
    }
}

#[async_trait]
impl JobQueue for MemoryQueue {
    async fn publish(&self, envelope: Envelope) -> Result<(), QueueError> {
        debug!(job_id = %envelope.job_id, job = envelope.event.kind(), "Event published");
        self.items.lock().await.push_back(envelope);
        self.notify.notify_one();
        Ok(())
    }
}
