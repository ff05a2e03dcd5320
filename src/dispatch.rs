//! Dispatcher — routes one job event to its handler.
//!
//! One exhaustive match over the event enum: adding a job type without a
//! handler is a compile error, not a runtime surprise. Dispatch has no
//! execution ceiling — these jobs have no SLO and may legitimately run
//! for minutes. Handler errors propagate to the worker loop; only the
//! components that explicitly convert failure into a terminal state
//! (retry coordination, the export state machine) swallow anything.

use std::sync::Arc;
use std::time::Instant;

use tracing::info;

use crate::config::WorkerConfig;
use crate::error::Result;
use crate::event::{Envelope, JobEvent};
use crate::exporter::Exporter;
use crate::jobs;
use crate::notify::NotificationSink;
use crate::push::PushGateway;
use crate::queue::JobQueue;
use crate::retry::RetryCoordinator;
use crate::store::Database;

/// Shared dependencies for job handlers.
#[derive(Clone)]
pub struct HandlerDeps {
    pub store: Arc<dyn Database>,
    pub queue: Arc<dyn JobQueue>,
    pub retry: Arc<RetryCoordinator>,
    pub notifier: Arc<dyn NotificationSink>,
    pub exporter: Arc<dyn Exporter>,
    pub push: Arc<dyn PushGateway>,
    pub config: WorkerConfig,
}

/// Routes envelopes to job handlers and logs completion timing.
pub struct Dispatcher {
    deps: HandlerDeps,
}

impl Dispatcher {
    pub fn new(deps: HandlerDeps) -> Self {
        Self { deps }
    }

    /// Process one delivered envelope to completion.
    pub async fn dispatch(&self, envelope: &Envelope) -> Result<()> {
        let started = Instant::now();
        let kind = envelope.event.kind();

        match &envelope.event {
            JobEvent::MarkChannelRead {
                user_id,
                channel_ids,
            } => {
                jobs::mark_read::mark_channel_read(&self.deps, *user_id, channel_ids).await?;
            }
            JobEvent::MarkChannelReadForAll { channel_id, min_id } => {
                jobs::mark_read::mark_channel_read_for_all(
                    &self.deps,
                    envelope,
                    *channel_id,
                    *min_id,
                )
                .await?;
            }
            JobEvent::ClearDeviceTokens { user_id } => {
                jobs::device_tokens::clear_device_tokens(&self.deps, envelope, *user_id).await?;
            }
            JobEvent::DataExport { export_id, user_id } => {
                jobs::export::run_data_export(&self.deps, *export_id, *user_id).await?;
            }
            JobEvent::ReactivateDormantUser { user_id } => {
                jobs::maintenance::reactivate_dormant_user(&self.deps, *user_id).await?;
            }
            JobEvent::SyncServerMetadata { tenant_id } => {
                jobs::maintenance::sync_server_metadata(&self.deps, *tenant_id).await?;
            }
        }

        info!(
            job_id = %envelope.job_id,
            job = kind,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Job processed"
        );
        Ok(())
    }
}
