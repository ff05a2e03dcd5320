//! Export status records — the persisted state machine for stateful jobs.
//!
//! The queue delivers at least once, so an expensive side-effecting job
//! must not re-run just because its event came back. The status record is
//! inspected before any externally-visible work: only `Requested` may
//! proceed, and the terminal states absorb every later transition attempt.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// State of a tracked data export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportStatus {
    /// Created at enqueue time; the only state that permits execution.
    Requested,
    /// The export failed or was redelivered after partial execution.
    Failed,
    /// The export finished and its artifact is durable.
    Completed,
}

impl ExportStatus {
    /// Check if this state allows transitioning to another state.
    pub fn can_transition_to(&self, target: ExportStatus) -> bool {
        use ExportStatus::*;

        matches!((self, target), (Requested, Failed) | (Requested, Completed))
    }

    /// Check if this is a terminal (absorbing) state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Failed | Self::Completed)
    }
}

impl std::fmt::Display for ExportStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Requested => "requested",
            Self::Failed => "failed",
            Self::Completed => "completed",
        };
        write!(f, "{s}")
    }
}

/// Persisted status record for one logical export job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportRecord {
    pub id: i64,
    /// Tenant whose data is exported.
    pub tenant_id: i64,
    /// User that requested the export and receives the completion notice.
    pub requested_by: i64,
    pub status: ExportStatus,
    pub requested_at: DateTime<Utc>,
    pub failed_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Free-form data; holds the artifact path once completed.
    pub extra: serde_json::Value,
}
