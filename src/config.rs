//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

/// Worker configuration.
///
/// Batch size and time budget are deliberately explicit constants rather
/// than something inferred at runtime — tuning them is a deployment
/// decision.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Records mutated per batch transaction.
    pub batch_size: usize,
    /// Wall-clock budget for one batched invocation; exceeding it requeues
    /// a continuation instead of holding the worker slot.
    pub batch_time_budget: Duration,
    /// Maximum delivery attempts for jobs hitting a flaky push gateway.
    pub max_push_attempts: u32,
    /// Directory that data exports are written into.
    pub export_dir: PathBuf,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            batch_size: 50,
            batch_time_budget: Duration::from_secs(30),
            max_push_attempts: 3,
            export_dir: PathBuf::from("./data/exports"),
        }
    }
}
