//! Error types for the offload worker.

/// Top-level error type for the worker.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("Push gateway error: {0}")]
    Push(#[from] PushError),

    #[error("Export error: {0}")]
    Export(#[from] ExportError),

    #[error("Job error: {0}")]
    Job(#[from] JobError),
}

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: i64 },

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Queue transport errors.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("Failed to publish event: {0}")]
    Publish(String),
}

/// Push gateway errors.
///
/// `Unavailable` is the designated transient kind — it routes through the
/// retry coordinator. Everything else propagates to the worker loop.
#[derive(Debug, thiserror::Error)]
pub enum PushError {
    #[error("Push gateway unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Push gateway request failed with status {status}: {reason}")]
    Request { status: u16, reason: String },
}

/// Data export errors.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Store error: {0}")]
    Store(#[from] DatabaseError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Export {id} already left the requested state")]
    AlreadyTerminal { id: i64 },
}

/// Job-level errors.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("Export record {id} not found")]
    ExportNotFound { id: i64 },
}

/// Result type alias for the worker.
pub type Result<T> = std::result::Result<T, Error>;
