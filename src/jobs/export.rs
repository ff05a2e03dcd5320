//! Data export job — stateful, guarded by the export status record.
//!
//! The queue delivers at least once, and an export is far too expensive to
//! run twice. The status record is the arbiter: only `Requested` proceeds.
//! Anything else means a prior attempt already left the starting line —
//! typically a crash mid-export (an OOM kill is the classic case) — and
//! since unknown partial work may exist, the only safe outcome is FAILED.

use std::time::Instant;

use chrono::Utc;
use tracing::{error, info};

use crate::dispatch::HandlerDeps;
use crate::error::{JobError, Result};
use crate::status::ExportStatus;

/// Execute one `data_export` event.
pub async fn run_data_export(deps: &HandlerDeps, export_id: i64, user_id: i64) -> Result<()> {
    let started = Instant::now();

    let record = deps
        .store
        .get_export(export_id)
        .await?
        .ok_or(JobError::ExportNotFound { id: export_id })?;

    if record.status != ExportStatus::Requested {
        // Redelivery after partial execution. Do not re-run the export;
        // settle the record and tell the observers.
        error!(
            export_id,
            tenant_id = record.tenant_id,
            status = %record.status,
            "Marking export as failed due to redelivery -- possible OOM during prior attempt?"
        );
        deps.store.mark_export_failed(export_id, Utc::now()).await?;
        deps.notifier.notify_observers(record.tenant_id).await;
        return Ok(());
    }

    info!(
        export_id,
        tenant_id = record.tenant_id,
        user_id,
        "Starting data export"
    );

    match deps.exporter.run_export(&record).await {
        Ok(output) => {
            // The exporter already recorded Completed as part of making
            // the artifact durable.
            deps.notifier
                .notify_user(
                    record.requested_by,
                    &format!(
                        "Your data export is complete and available at {}.",
                        output.path.display()
                    ),
                )
                .await;
            deps.notifier.notify_observers(record.tenant_id).await;
            info!(
                export_id,
                tenant_id = record.tenant_id,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Completed data export"
            );
        }
        Err(e) => {
            error!(
                export_id,
                tenant_id = record.tenant_id,
                error = %e,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Data export failed"
            );
            deps.store.mark_export_failed(export_id, Utc::now()).await?;
            deps.notifier
                .notify_user(
                    record.requested_by,
                    "Your data export failed. Please contact an administrator.",
                )
                .await;
            deps.notifier.notify_observers(record.tenant_id).await;
            // Permanently failed; nothing left to retry.
        }
    }

    Ok(())
}
