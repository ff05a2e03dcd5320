//! libSQL backend — async `Database` trait implementation.
//!
//! Supports local file and in-memory databases. The batch read-flag update
//! runs inside an explicit transaction so one batch commits or rolls back
//! as a whole, and no lock outlives its batch.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::info;

use crate::batch::BatchPage;
use crate::error::DatabaseError;
use crate::status::{ExportRecord, ExportStatus};
use crate::store::migrations;
use crate::store::traits::Database;

/// libSQL database backend.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.init_schema().await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.init_schema().await?;
        Ok(backend)
    }

    async fn init_schema(&self) -> Result<(), DatabaseError> {
        migrations::run_migrations(&self.conn).await
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return ndt.and_utc();
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

fn parse_optional_datetime(s: &Option<String>) -> Option<DateTime<Utc>> {
    s.as_ref().map(|s| parse_datetime(s))
}

/// Convert an ExportStatus to its DB string.
fn status_to_str(status: ExportStatus) -> &'static str {
    match status {
        ExportStatus::Requested => "requested",
        ExportStatus::Failed => "failed",
        ExportStatus::Completed => "completed",
    }
}

/// Parse a status string from the DB.
fn str_to_status(s: &str) -> ExportStatus {
    match s {
        "failed" => ExportStatus::Failed,
        "completed" => ExportStatus::Completed,
        _ => ExportStatus::Requested,
    }
}

/// Map a libsql row to an ExportRecord.
///
/// Column order: 0:id, 1:tenant_id, 2:requested_by, 3:status,
/// 4:requested_at, 5:failed_at, 6:completed_at, 7:extra
fn row_to_export(row: &libsql::Row) -> Result<ExportRecord, libsql::Error> {
    let id: i64 = row.get(0)?;
    let tenant_id: i64 = row.get(1)?;
    let requested_by: i64 = row.get(2)?;
    let status_str: String = row.get(3)?;
    let requested_str: String = row.get(4)?;
    let failed_str: Option<String> = row.get(5).ok();
    let completed_str: Option<String> = row.get(6).ok();
    let extra_str: Option<String> = row.get(7).ok();

    Ok(ExportRecord {
        id,
        tenant_id,
        requested_by,
        status: str_to_status(&status_str),
        requested_at: parse_datetime(&requested_str),
        failed_at: parse_optional_datetime(&failed_str),
        completed_at: parse_optional_datetime(&completed_str),
        extra: extra_str
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or(serde_json::Value::Null),
    })
}

const EXPORT_COLUMNS: &str =
    "id, tenant_id, requested_by, status, requested_at, failed_at, completed_at, extra";

#[async_trait]
impl Database for LibSqlBackend {
    // ── Messages & read flags ───────────────────────────────────────

    async fn insert_message(
        &self,
        tenant_id: i64,
        channel_id: i64,
        body: &str,
    ) -> Result<i64, DatabaseError> {
        self.conn()
            .execute(
                "INSERT INTO messages (tenant_id, channel_id, body) VALUES (?1, ?2, ?3)",
                params![tenant_id, channel_id, body],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("Failed to insert message: {e}")))?;
        Ok(self.conn().last_insert_rowid())
    }

    async fn add_message_flag(&self, user_id: i64, message_id: i64) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                "INSERT OR IGNORE INTO message_flags (user_id, message_id, is_read)
                 VALUES (?1, ?2, 0)",
                params![user_id, message_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("Failed to insert message flag: {e}")))?;
        Ok(())
    }

    async fn mark_channel_read_for_user(
        &self,
        user_id: i64,
        channel_id: i64,
    ) -> Result<u64, DatabaseError> {
        let changed = self
            .conn()
            .execute(
                "UPDATE message_flags SET is_read = 1
                 WHERE is_read = 0 AND user_id = ?1
                   AND message_id IN (SELECT id FROM messages WHERE channel_id = ?2)",
                params![user_id, channel_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("Failed to mark channel read: {e}")))?;
        Ok(changed)
    }

    async fn mark_channel_read_batch(
        &self,
        channel_id: i64,
        after_id: i64,
        limit: usize,
    ) -> Result<BatchPage, DatabaseError> {
        let tx = self
            .conn()
            .transaction()
            .await
            .map_err(|e| DatabaseError::Query(format!("Failed to begin transaction: {e}")))?;

        let mut rows = tx
            .query(
                "SELECT id FROM messages
                 WHERE channel_id = ?1 AND id > ?2
                 ORDER BY id ASC LIMIT ?3",
                params![channel_id, after_id, limit as i64],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("Failed to select batch: {e}")))?;

        let mut ids = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("Failed to read batch row: {e}")))?
        {
            let id: i64 = row
                .get(0)
                .map_err(|e| DatabaseError::Query(format!("Failed to parse batch id: {e}")))?;
            ids.push(id);
        }

        let (first, last) = match (ids.first(), ids.last()) {
            (Some(first), Some(last)) => (*first, *last),
            _ => {
                // Empty batch: nothing to mutate, nothing to commit.
                return Ok(BatchPage {
                    selected: 0,
                    last_id: None,
                });
            }
        };

        tx.execute(
            "UPDATE message_flags SET is_read = 1
             WHERE is_read = 0 AND message_id BETWEEN ?1 AND ?2
               AND message_id IN (SELECT id FROM messages WHERE channel_id = ?3)",
            params![first, last, channel_id],
        )
        .await
        .map_err(|e| DatabaseError::Query(format!("Failed to update batch flags: {e}")))?;

        tx.commit()
            .await
            .map_err(|e| DatabaseError::Query(format!("Failed to commit batch: {e}")))?;

        Ok(BatchPage {
            selected: ids.len(),
            last_id: Some(last),
        })
    }

    async fn unread_count_for_channel(&self, channel_id: i64) -> Result<u64, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT COUNT(*) FROM message_flags f
                 JOIN messages m ON m.id = f.message_id
                 WHERE f.is_read = 0 AND m.channel_id = ?1",
                params![channel_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("Failed to count unread: {e}")))?;
        let row = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("Failed to read unread count: {e}")))?
            .ok_or_else(|| DatabaseError::Query("Missing unread count row".into()))?;
        let count: i64 = row
            .get(0)
            .map_err(|e| DatabaseError::Query(format!("Failed to parse unread count: {e}")))?;
        Ok(count as u64)
    }

    async fn unread_count_for_user(
        &self,
        user_id: i64,
        channel_id: i64,
    ) -> Result<u64, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT COUNT(*) FROM message_flags f
                 JOIN messages m ON m.id = f.message_id
                 WHERE f.is_read = 0 AND f.user_id = ?1 AND m.channel_id = ?2",
                params![user_id, channel_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("Failed to count unread: {e}")))?;
        let row = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("Failed to read unread count: {e}")))?
            .ok_or_else(|| DatabaseError::Query("Missing unread count row".into()))?;
        let count: i64 = row
            .get(0)
            .map_err(|e| DatabaseError::Query(format!("Failed to parse unread count: {e}")))?;
        Ok(count as u64)
    }

    // ── Users ───────────────────────────────────────────────────────

    async fn insert_user(
        &self,
        tenant_id: i64,
        email: &str,
        dormant: bool,
    ) -> Result<i64, DatabaseError> {
        self.conn()
            .execute(
                "INSERT INTO users (tenant_id, email, dormant) VALUES (?1, ?2, ?3)",
                params![tenant_id, email, dormant as i64],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("Failed to insert user: {e}")))?;
        Ok(self.conn().last_insert_rowid())
    }

    async fn reactivate_dormant_user(&self, user_id: i64) -> Result<bool, DatabaseError> {
        let changed = self
            .conn()
            .execute(
                "UPDATE users SET dormant = 0 WHERE id = ?1 AND dormant = 1",
                params![user_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("Failed to reactivate user: {e}")))?;
        Ok(changed > 0)
    }

    // ── Export status records ───────────────────────────────────────

    async fn create_export(
        &self,
        tenant_id: i64,
        requested_by: i64,
        requested_at: DateTime<Utc>,
    ) -> Result<ExportRecord, DatabaseError> {
        self.conn()
            .execute(
                "INSERT INTO exports (tenant_id, requested_by, status, requested_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    tenant_id,
                    requested_by,
                    status_to_str(ExportStatus::Requested),
                    requested_at.to_rfc3339()
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("Failed to create export: {e}")))?;
        let id = self.conn().last_insert_rowid();

        self.get_export(id).await?.ok_or(DatabaseError::NotFound {
            entity: "export".into(),
            id,
        })
    }

    async fn get_export(&self, id: i64) -> Result<Option<ExportRecord>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {EXPORT_COLUMNS} FROM exports WHERE id = ?1"),
                params![id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("Failed to get export: {e}")))?;

        let row = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("Failed to read export row: {e}")))?;

        match row {
            Some(row) => {
                let record = row_to_export(&row).map_err(|e| {
                    DatabaseError::Serialization(format!("Failed to map export row: {e}"))
                })?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    async fn mark_export_failed(
        &self,
        id: i64,
        failed_at: DateTime<Utc>,
    ) -> Result<bool, DatabaseError> {
        let changed = self
            .conn()
            .execute(
                "UPDATE exports SET status = 'failed', failed_at = ?2
                 WHERE id = ?1 AND status = 'requested'",
                params![id, failed_at.to_rfc3339()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("Failed to mark export failed: {e}")))?;
        Ok(changed > 0)
    }

    async fn mark_export_completed(
        &self,
        id: i64,
        completed_at: DateTime<Utc>,
        extra: &serde_json::Value,
    ) -> Result<bool, DatabaseError> {
        let extra_str = serde_json::to_string(extra)
            .map_err(|e| DatabaseError::Serialization(format!("Failed to encode extra: {e}")))?;
        let changed = self
            .conn()
            .execute(
                "UPDATE exports SET status = 'completed', completed_at = ?2, extra = ?3
                 WHERE id = ?1 AND status = 'requested'",
                params![id, completed_at.to_rfc3339(), extra_str],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("Failed to mark export completed: {e}")))?;
        Ok(changed > 0)
    }

    // ── Export content ──────────────────────────────────────────────

    async fn tenant_snapshot(&self, tenant_id: i64) -> Result<serde_json::Value, DatabaseError> {
        let mut channels = Vec::new();
        let mut rows = self
            .conn()
            .query(
                "SELECT channel_id, COUNT(*) FROM messages
                 WHERE tenant_id = ?1 GROUP BY channel_id ORDER BY channel_id",
                params![tenant_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("Failed to snapshot channels: {e}")))?;
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("Failed to read snapshot row: {e}")))?
        {
            let channel_id: i64 = row
                .get(0)
                .map_err(|e| DatabaseError::Query(format!("Failed to parse channel id: {e}")))?;
            let messages: i64 = row
                .get(1)
                .map_err(|e| DatabaseError::Query(format!("Failed to parse message count: {e}")))?;
            channels.push(serde_json::json!({
                "channel_id": channel_id,
                "messages": messages,
            }));
        }

        let mut rows = self
            .conn()
            .query(
                "SELECT COUNT(*) FROM users WHERE tenant_id = ?1",
                params![tenant_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("Failed to snapshot users: {e}")))?;
        let row = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("Failed to read user count: {e}")))?
            .ok_or_else(|| DatabaseError::Query("Missing user count row".into()))?;
        let users: i64 = row
            .get(0)
            .map_err(|e| DatabaseError::Query(format!("Failed to parse user count: {e}")))?;

        Ok(serde_json::json!({
            "tenant_id": tenant_id,
            "users": users,
            "channels": channels,
            "generated_at": Utc::now().to_rfc3339(),
        }))
    }
}
