//! Job events — the typed work items the worker consumes.
//!
//! Every event carries a `type` discriminator on the wire; the closed enum
//! makes dispatch exhaustive at compile time. The `Envelope` adds delivery
//! metadata (correlation id, attempt counter) around the event itself.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One unit of dispatchable work.
///
/// The discriminator fully determines the payload shape; no field name is
/// reused with different semantics across variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobEvent {
    /// Mark everything in the given channels as read for one user.
    MarkChannelRead { user_id: i64, channel_ids: Vec<i64> },
    /// Mark an entire channel as read for every user, in batches.
    ///
    /// `min_id` is the resume cursor: only messages with id strictly
    /// greater are selected, so redelivering a completed range is a no-op.
    MarkChannelReadForAll {
        channel_id: i64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min_id: Option<i64>,
    },
    /// Clear registered push device tokens for a user via the gateway.
    ClearDeviceTokens { user_id: i64 },
    /// Run a tenant data export tracked by a persisted status record.
    DataExport { export_id: i64, user_id: i64 },
    /// Reactivate a user that was put into the dormant state.
    ReactivateDormantUser { user_id: i64 },
    /// Push this server's tenant metadata to the push gateway.
    SyncServerMetadata { tenant_id: i64 },
}

impl JobEvent {
    /// Wire name of the event type, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MarkChannelRead { .. } => "mark_channel_read",
            Self::MarkChannelReadForAll { .. } => "mark_channel_read_for_all",
            Self::ClearDeviceTokens { .. } => "clear_device_tokens",
            Self::DataExport { .. } => "data_export",
            Self::ReactivateDormantUser { .. } => "reactivate_dormant_user",
            Self::SyncServerMetadata { .. } => "sync_server_metadata",
        }
    }
}

/// Delivery wrapper around a [`JobEvent`].
///
/// `job_id` stays constant across retries and continuations of the same
/// logical job so its log lines correlate. `attempts` is the retry
/// envelope — it counts resubmissions by the retry coordinator, not
/// continuations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(default = "Uuid::new_v4")]
    pub job_id: Uuid,
    #[serde(default)]
    pub attempts: u32,
    #[serde(flatten)]
    pub event: JobEvent,
}

impl Envelope {
    /// Wrap a freshly enqueued event.
    pub fn new(event: JobEvent) -> Self {
        Self {
            job_id: Uuid::new_v4(),
            attempts: 0,
            event,
        }
    }

    /// Build a continuation of this job from a new event payload.
    ///
    /// Keeps the correlation id. Resets the attempt counter — a
    /// continuation is fresh work, not a retry.
    pub fn continuation(&self, event: JobEvent) -> Self {
        Self {
            job_id: self.job_id,
            attempts: 0,
            event,
        }
    }
}
