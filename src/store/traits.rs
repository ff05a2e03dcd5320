//! Unified `Database` trait — single async interface for all persistence.
//!
//! Covers the domain records the jobs mutate (messages, read flags, users)
//! and the export status records of the stateful-job state machine. Every
//! mutation is scoped to the smallest unit needing atomicity: one batch or
//! one status transition, never a whole logical job.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::batch::BatchPage;
use crate::error::DatabaseError;
use crate::status::ExportRecord;

/// Backend-agnostic database trait for the worker.
#[async_trait]
pub trait Database: Send + Sync {
    // ── Messages & read flags ───────────────────────────────────────

    /// Insert a message. Returns the generated id (the batch cursor key).
    async fn insert_message(
        &self,
        tenant_id: i64,
        channel_id: i64,
        body: &str,
    ) -> Result<i64, DatabaseError>;

    /// Create an unread flag row tying a user to a message.
    async fn add_message_flag(&self, user_id: i64, message_id: i64) -> Result<(), DatabaseError>;

    /// Mark every unread message in a channel as read for one user.
    /// Returns the number of flags flipped.
    async fn mark_channel_read_for_user(
        &self,
        user_id: i64,
        channel_id: i64,
    ) -> Result<u64, DatabaseError>;

    /// One batch step of marking a channel read for every user: select up
    /// to `limit` message ids strictly greater than `after_id`, ascending,
    /// and flip their unread flags in a single transaction.
    async fn mark_channel_read_batch(
        &self,
        channel_id: i64,
        after_id: i64,
        limit: usize,
    ) -> Result<BatchPage, DatabaseError>;

    /// Count unread flags across all users of a channel.
    async fn unread_count_for_channel(&self, channel_id: i64) -> Result<u64, DatabaseError>;

    /// Count unread flags for one user in a channel.
    async fn unread_count_for_user(
        &self,
        user_id: i64,
        channel_id: i64,
    ) -> Result<u64, DatabaseError>;

    // ── Users ───────────────────────────────────────────────────────

    /// Insert a user. Returns the generated id.
    async fn insert_user(
        &self,
        tenant_id: i64,
        email: &str,
        dormant: bool,
    ) -> Result<i64, DatabaseError>;

    /// Clear a user's dormant flag. Returns `true` if the user was
    /// dormant, `false` if there was nothing to do.
    async fn reactivate_dormant_user(&self, user_id: i64) -> Result<bool, DatabaseError>;

    // ── Export status records ───────────────────────────────────────

    /// Create a status record in the `Requested` state.
    async fn create_export(
        &self,
        tenant_id: i64,
        requested_by: i64,
        requested_at: DateTime<Utc>,
    ) -> Result<ExportRecord, DatabaseError>;

    /// Get an export record by id.
    async fn get_export(&self, id: i64) -> Result<Option<ExportRecord>, DatabaseError>;

    /// Transition an export to `Failed`. The update is guarded so only a
    /// `Requested` record transitions; returns whether a row changed.
    async fn mark_export_failed(
        &self,
        id: i64,
        failed_at: DateTime<Utc>,
    ) -> Result<bool, DatabaseError>;

    /// Transition an export to `Completed`, storing `extra` (artifact
    /// metadata) alongside. Guarded like [`mark_export_failed`].
    ///
    /// [`mark_export_failed`]: Database::mark_export_failed
    async fn mark_export_completed(
        &self,
        id: i64,
        completed_at: DateTime<Utc>,
        extra: &serde_json::Value,
    ) -> Result<bool, DatabaseError>;

    // ── Export content ──────────────────────────────────────────────

    /// Snapshot of a tenant's data for the export artifact.
    async fn tenant_snapshot(&self, tenant_id: i64) -> Result<serde_json::Value, DatabaseError>;
}
