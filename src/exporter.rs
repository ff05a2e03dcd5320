//! Data exporter — the expensive operation behind `data_export` jobs.
//!
//! The exporter owns the completed-state transition: it marks the status
//! record `Completed` only after the artifact is durable, so a crash
//! before that point leaves the record in `Requested` and the redelivery
//! check in the job handler does the right thing.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::info;

use crate::error::ExportError;
use crate::status::ExportRecord;
use crate::store::Database;

/// Result of a finished export.
#[derive(Debug, Clone)]
pub struct ExportOutput {
    /// Where the artifact was written.
    pub path: PathBuf,
    pub bytes_written: u64,
}

/// Runs one export to durable output.
#[async_trait]
pub trait Exporter: Send + Sync {
    async fn run_export(&self, record: &ExportRecord) -> Result<ExportOutput, ExportError>;
}

/// Exporter that writes a JSON tenant snapshot to the local filesystem.
pub struct FileExporter {
    store: Arc<dyn Database>,
    output_dir: PathBuf,
}

impl FileExporter {
    pub fn new(store: Arc<dyn Database>, output_dir: PathBuf) -> Self {
        Self { store, output_dir }
    }
}

#[async_trait]
impl Exporter for FileExporter {
    async fn run_export(&self, record: &ExportRecord) -> Result<ExportOutput, ExportError> {
        let dir = self.output_dir.join(format!("export-{}", record.id));
        tokio::fs::create_dir_all(&dir).await?;

        let snapshot = self.store.tenant_snapshot(record.tenant_id).await?;
        let bytes = serde_json::to_vec_pretty(&snapshot)?;
        let path = dir.join("snapshot.json");
        tokio::fs::write(&path, &bytes).await?;

        // The artifact is durable; record completion before anyone is told
        // about it. The guarded update catches a record that left
        // `Requested` behind our back.
        let extra = serde_json::json!({ "path": path.to_string_lossy() });
        let transitioned = self
            .store
            .mark_export_completed(record.id, Utc::now(), &extra)
            .await?;
        if !transitioned {
            return Err(ExportError::AlreadyTerminal { id: record.id });
        }

        info!(
            export_id = record.id,
            tenant_id = record.tenant_id,
            path = %path.display(),
            bytes = bytes.len(),
            "Export artifact written"
        );
        Ok(ExportOutput {
            path,
            bytes_written: bytes.len() as u64,
        })
    }
}
