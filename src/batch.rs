//! Batch cursor engine — time-boxed bulk mutation with checkpointed resume.
//!
//! A bulk mutation over a large record set must not hold one transaction or
//! one worker slot for its whole duration. The runner applies the mutation
//! in fixed-size batches (each its own transaction, owned by the
//! [`BatchMutation`] implementation), advances a monotonic cursor, and
//! stops with a resume position once the wall-clock budget is spent. The
//! caller turns that position into a continuation event.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::debug;

use crate::error::DatabaseError;

/// Result of applying one batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchPage {
    /// How many records the batch selected.
    pub selected: usize,
    /// Largest cursor key in the batch, if any records were selected.
    pub last_id: Option<i64>,
}

/// One bounded, atomic step of a bulk mutation.
#[async_trait]
pub trait BatchMutation: Send + Sync {
    /// Select up to `limit` records with key strictly greater than `after`,
    /// ordered by key ascending, and apply the mutation to them as a single
    /// transaction. The mutation must be idempotent: re-applying it to an
    /// already-mutated record is a no-op.
    async fn apply_batch(&self, after: i64, limit: usize) -> Result<BatchPage, DatabaseError>;
}

/// Outcome of one runner invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchOutcome {
    /// The full record set has been processed.
    Complete { total: usize },
    /// The time budget ran out; resume later from `cursor`.
    Resume { cursor: i64, total: usize },
}

/// Drives a [`BatchMutation`] to completion or to a resume point.
pub struct BatchRunner {
    batch_size: usize,
    time_budget: Duration,
}

impl BatchRunner {
    pub fn new(batch_size: usize, time_budget: Duration) -> Self {
        Self {
            batch_size,
            time_budget,
        }
    }

    /// Apply batches starting strictly after `cursor` until the set is
    /// exhausted or the budget is spent.
    ///
    /// A short batch means the set is exhausted. The cursor only advances
    /// past a committed batch, so an error leaves it pointing at the last
    /// good position and the same batch is retried on the next delivery.
    pub async fn run(
        &self,
        mutation: &dyn BatchMutation,
        cursor: i64,
    ) -> Result<BatchOutcome, DatabaseError> {
        let started = Instant::now();
        let mut cursor = cursor;
        let mut total = 0;

        loop {
            let page = mutation.apply_batch(cursor, self.batch_size).await?;
            total += page.selected;

            if page.selected < self.batch_size {
                return Ok(BatchOutcome::Complete { total });
            }

            // Full batch: last_id is present by construction.
            cursor = page.last_id.unwrap_or(cursor);
            debug!(cursor, total, "Batch committed");

            if started.elapsed() > self.time_budget {
                return Ok(BatchOutcome::Resume { cursor, total });
            }
        }
    }
}
