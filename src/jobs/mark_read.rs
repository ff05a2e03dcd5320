//! Read-flag jobs — bulk "mark as read" mutations over message flags.
//!
//! The per-user variant is small enough to run in one shot. The
//! channel-wide variant can touch millions of flag rows and goes through
//! the batch cursor engine: bounded transactions, checkpointed cursor,
//! self-requeued continuation when the time budget runs out.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::batch::{BatchMutation, BatchOutcome, BatchPage, BatchRunner};
use crate::dispatch::HandlerDeps;
use crate::error::{DatabaseError, Error};
use crate::event::{Envelope, JobEvent};
use crate::store::Database;

/// Mark the given channels as read for one user.
pub async fn mark_channel_read(
    deps: &HandlerDeps,
    user_id: i64,
    channel_ids: &[i64],
) -> Result<(), Error> {
    info!(user_id, ?channel_ids, "Marking messages as read for user");

    for &channel_id in channel_ids {
        let count = deps
            .store
            .mark_channel_read_for_user(user_id, channel_id)
            .await?;
        info!(user_id, channel_id, count, "Marked messages as read");
    }
    Ok(())
}

/// Batch step over one channel's read flags.
struct ChannelReadBackfill {
    store: Arc<dyn Database>,
    channel_id: i64,
}

#[async_trait]
impl BatchMutation for ChannelReadBackfill {
    async fn apply_batch(&self, after: i64, limit: usize) -> Result<BatchPage, DatabaseError> {
        self.store
            .mark_channel_read_batch(self.channel_id, after, limit)
            .await
    }
}

/// Mark an entire channel as read for every user.
///
/// Generated by the channel archive path, so the channel is quiescent and
/// the message set is fixed. Extremely low priority: when the time budget
/// runs out, the remainder is requeued behind whatever other deferred work
/// is waiting.
pub async fn mark_channel_read_for_all(
    deps: &HandlerDeps,
    envelope: &Envelope,
    channel_id: i64,
    min_id: Option<i64>,
) -> Result<(), Error> {
    info!(channel_id, min_id, "Marking messages as read for all users");

    let runner = BatchRunner::new(deps.config.batch_size, deps.config.batch_time_budget);
    let backfill = ChannelReadBackfill {
        store: deps.store.clone(),
        channel_id,
    };

    match runner.run(&backfill, min_id.unwrap_or(0)).await? {
        BatchOutcome::Complete { total } => {
            info!(
                channel_id,
                total, "Marked messages as read for all users"
            );
        }
        BatchOutcome::Resume { cursor, total } => {
            info!(
                channel_id,
                total, cursor, "Time budget spent, requeueing continuation"
            );
            deps.queue
                .publish(envelope.continuation(JobEvent::MarkChannelReadForAll {
                    channel_id,
                    min_id: Some(cursor),
                }))
                .await?;
        }
    }
    Ok(())
}
