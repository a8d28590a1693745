//! Bookmark store for Marksync.
//!
//! Implements `RecordStore`: list, insert and delete against the bookmark
//! collection, always scoped to one owner, backed by SQLite via `rusqlite`.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::database::Database;
use crate::managers::change_notifier::ChangeBus;
use crate::types::bookmark::Bookmark;
use crate::types::errors::StoreError;
use crate::types::identity::Identity;
use crate::types::notification::{ChangeKind, ChangeRecord};

/// Trait defining the operations the reconciler needs from the record collection.
///
/// Implementations must enforce ownership themselves: a caller never sees or
/// mutates another identity's rows, whatever it passes in.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Bookmarks owned by `owner`, newest first.
    async fn list_for(&self, owner: &Identity) -> Result<Vec<Bookmark>, StoreError>;
    /// Stores a new bookmark; the store assigns id and timestamp.
    async fn insert(&self, owner: &Identity, url: &str, title: &str) -> Result<Bookmark, StoreError>;
    /// Ensures `id` is absent from `owner`'s bookmarks. Absent ids are not an error.
    async fn delete(&self, owner: &Identity, id: &str) -> Result<(), StoreError>;
}

/// Record store backed by a SQLite database.
pub struct SqliteRecordStore {
    db: Arc<Database>,
    bus: Option<ChangeBus>,
    schema: String,
    table: String,
}

impl SqliteRecordStore {
    /// Creates a store that does not publish change records.
    pub fn new(db: Arc<Database>) -> Self {
        Self {
            db,
            bus: None,
            schema: "public".to_string(),
            table: "bookmarks".to_string(),
        }
    }

    /// Publishes a `ChangeRecord` on `bus` after every mutation that took effect.
    pub fn with_change_bus(mut self, bus: ChangeBus, schema: &str, table: &str) -> Self {
        self.bus = Some(bus);
        self.schema = schema.to_string();
        self.table = table.to_string();
        self
    }

    /// Returns the current UNIX timestamp in milliseconds.
    fn now() -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as i64
    }

    fn publish(&self, kind: ChangeKind) {
        if let Some(bus) = &self.bus {
            bus.publish(ChangeRecord {
                schema: self.schema.clone(),
                table: self.table.clone(),
                kind,
            });
        }
    }

    /// Reads a single `Bookmark` row into a struct.
    fn row_to_bookmark(row: &rusqlite::Row) -> rusqlite::Result<Bookmark> {
        Ok(Bookmark {
            id: row.get(0)?,
            url: row.get(1)?,
            title: row.get(2)?,
            owner_id: row.get(3)?,
            created_at: row.get(4)?,
        })
    }

    fn select_owned(conn: &Connection, owner_id: &str) -> Result<Vec<Bookmark>, StoreError> {
        // rowid breaks ties between rows created within the same millisecond
        let mut stmt = conn
            .prepare(
                "SELECT id, url, title, user_id, created_at FROM bookmarks \
                 WHERE user_id = ?1 ORDER BY created_at DESC, rowid DESC",
            )
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        let rows = stmt
            .query_map(params![owner_id], Self::row_to_bookmark)
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row.map_err(|e| StoreError::Unavailable(e.to_string()))?);
        }
        Ok(results)
    }

    fn insert_row(conn: &Connection, bookmark: &Bookmark) -> Result<(), StoreError> {
        conn.execute(
            "INSERT INTO bookmarks (id, user_id, url, title, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                bookmark.id,
                bookmark.owner_id,
                bookmark.url,
                bookmark.title,
                bookmark.created_at
            ],
        )
        .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Ok(())
    }

    fn delete_owned(conn: &Connection, owner_id: &str, id: &str) -> Result<usize, StoreError> {
        conn.execute(
            "DELETE FROM bookmarks WHERE id = ?1 AND user_id = ?2",
            params![id, owner_id],
        )
        .map_err(|e| StoreError::Unavailable(e.to_string()))
    }

    /// Runs blocking SQLite work off the async executor.
    async fn blocking<T, F>(&self, work: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || {
            let conn = db.connection();
            work(&conn)
        })
        .await
        .map_err(|e| StoreError::Unavailable(format!("store task failed: {}", e)))?
    }
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn list_for(&self, owner: &Identity) -> Result<Vec<Bookmark>, StoreError> {
        let owner_id = owner.id.clone();
        let bookmarks = self
            .blocking(move |conn| Self::select_owned(conn, &owner_id))
            .await?;
        tracing::debug!(owner = %owner.id, count = bookmarks.len(), "listed bookmarks");
        Ok(bookmarks)
    }

    async fn insert(&self, owner: &Identity, url: &str, title: &str) -> Result<Bookmark, StoreError> {
        let url = url.trim();
        if url.is_empty() {
            return Err(StoreError::Validation("url must not be empty".to_string()));
        }

        let bookmark = Bookmark {
            id: Uuid::new_v4().to_string(),
            url: url.to_string(),
            title: title.trim().to_string(),
            owner_id: owner.id.clone(),
            created_at: Self::now(),
        };

        let row = bookmark.clone();
        self.blocking(move |conn| Self::insert_row(conn, &row)).await?;
        tracing::info!(owner = %owner.id, bookmark = %bookmark.id, "bookmark inserted");

        self.publish(ChangeKind::Insert);
        Ok(bookmark)
    }

    async fn delete(&self, owner: &Identity, id: &str) -> Result<(), StoreError> {
        let owner_id = owner.id.clone();
        let bookmark_id = id.to_string();
        let affected = self
            .blocking(move |conn| Self::delete_owned(conn, &owner_id, &bookmark_id))
            .await?;

        if affected == 0 {
            tracing::debug!(owner = %owner.id, bookmark = %id, "delete of absent bookmark");
            return Ok(());
        }

        tracing::info!(owner = %owner.id, bookmark = %id, "bookmark deleted");
        self.publish(ChangeKind::Delete);
        Ok(())
    }
}
