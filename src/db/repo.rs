//! Repository layer for snapshot rows.
//!
//! Each method is one statement or one explicit transaction against the pool;
//! readiness gating and error classification live in [`super::store`].

use crate::domain::{capture_timestamp, NewSnapshot, Snapshot, SnapshotId};
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::Row;
use tracing::debug;

/// Repository for snapshot rows.
#[derive(Debug, Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Repository { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Insert one snapshot in its own write transaction and return the generated id.
    ///
    /// A missing or blank timestamp is stamped with the current time.
    ///
    /// # Errors
    /// Returns an error if the insert or the commit fails; nothing is persisted then.
    pub async fn insert_snapshot(&self, page: &NewSnapshot) -> Result<SnapshotId, sqlx::Error> {
        let timestamp = page
            .timestamp
            .clone()
            .filter(|ts| !ts.trim().is_empty())
            .unwrap_or_else(capture_timestamp);

        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            INSERT INTO clipped_pages (
                title, url, timestamp, content, favicon, word_count, reading_time
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(page.title.as_str())
        .bind(page.url.as_str())
        .bind(timestamp.as_str())
        .bind(page.content.as_str())
        .bind(page.favicon.as_deref())
        .bind(page.word_count)
        .bind(page.reading_time)
        .execute(&mut *tx)
        .await?;

        let id = SnapshotId::new(result.last_insert_rowid());
        tx.commit().await?;

        debug!(id = %id, url = %page.url, "Snapshot inserted");
        Ok(id)
    }

    /// Fetch every snapshot in key order.
    ///
    /// A single `SELECT` runs as one implicit read transaction, so the result
    /// never mixes committed and uncommitted state.
    pub async fn list_snapshots(&self) -> Result<Vec<Snapshot>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT id, title, url, timestamp, content, favicon, word_count, reading_time
            FROM clipped_pages
            ORDER BY id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(snapshot_from_row).collect()
    }

    /// Delete one snapshot. Returns whether a row was removed.
    pub async fn delete_snapshot(&self, id: SnapshotId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM clipped_pages WHERE id = ?")
            .bind(id.as_i64())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete every snapshot. Returns the number of rows removed.
    ///
    /// The AUTOINCREMENT counter is left alone, so ids are never reused.
    pub async fn clear_snapshots(&self) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM clipped_pages")
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

fn snapshot_from_row(row: &SqliteRow) -> Result<Snapshot, sqlx::Error> {
    Ok(Snapshot {
        id: SnapshotId::new(row.try_get("id")?),
        title: row.try_get("title")?,
        url: row.try_get("url")?,
        timestamp: row.try_get("timestamp")?,
        content: row.try_get("content")?,
        favicon: row.try_get("favicon")?,
        word_count: row.try_get("word_count")?,
        reading_time: row.try_get("reading_time")?,
    })
}
