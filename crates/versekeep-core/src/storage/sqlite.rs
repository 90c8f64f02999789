//! Persistent key-value backend on SQLite
//!
//! One table per collection (see `schema`). Each call runs in its own
//! implicit transaction and the connection sits behind a mutex, so
//! operations are serialized the same way a browser object store
//! serializes them per collection.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::debug;

use super::schema::{init_schema, needs_init};
use super::{
    Collection, Index, KeyRange, KeyValueStore, Record, StorageError, StorageResult,
};

/// SQLite-backed key-value store
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create the database at `path`, upgrading the schema if needed
    pub fn open(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| StorageError::CreateDirectory {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let conn = Connection::open(path).map_err(StorageError::unavailable)?;
        Self::from_connection(conn)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory().map_err(StorageError::unavailable)?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> StorageResult<Self> {
        if needs_init(&conn) {
            debug!("Initializing key-value schema");
            init_schema(&conn).map_err(StorageError::unavailable)?;
        }
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StorageError::unavailable("sqlite connection lock poisoned"))
    }
}

// ==================== Row helpers ====================

struct RecordRow {
    id: String,
    timestamp: i64,
    data: String,
}

impl RecordRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            timestamp: row.get(1)?,
            data: row.get(2)?,
        })
    }

    fn hydrate(self, collection: Collection) -> StorageResult<Record> {
        let data = serde_json::from_str(&self.data).map_err(|source| {
            StorageError::InvalidRecord {
                collection,
                id: self.id.clone(),
                source,
            }
        })?;
        let timestamp =
            chrono::DateTime::from_timestamp_millis(self.timestamp).unwrap_or_default();
        Ok(Record {
            id: self.id,
            timestamp,
            data,
        })
    }
}

fn hydrate_all(
    rows: impl Iterator<Item = rusqlite::Result<RecordRow>>,
    collection: Collection,
) -> StorageResult<Vec<Record>> {
    let mut records = Vec::new();
    for row in rows {
        records.push(row?.hydrate(collection)?);
    }
    Ok(records)
}

impl KeyValueStore for SqliteStore {
    fn get(&self, collection: Collection, id: &str) -> StorageResult<Option<Record>> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                &format!(
                    "SELECT id, timestamp, data FROM {} WHERE id = ?",
                    collection.name()
                ),
                params![id],
                RecordRow::from_row,
            )
            .optional()?;

        row.map(|r| r.hydrate(collection)).transpose()
    }

    fn get_all(
        &self,
        collection: Collection,
        range: Option<&KeyRange>,
    ) -> StorageResult<Vec<Record>> {
        let conn = self.lock()?;
        match range {
            Some(range) => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT id, timestamp, data FROM {} WHERE id >= ? AND id < ? ORDER BY id",
                    collection.name()
                ))?;
                let rows = stmt.query_map(params![range.lower, range.upper], RecordRow::from_row)?;
                hydrate_all(rows, collection)
            }
            None => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT id, timestamp, data FROM {} ORDER BY id",
                    collection.name()
                ))?;
                let rows = stmt.query_map([], RecordRow::from_row)?;
                hydrate_all(rows, collection)
            }
        }
    }

    fn put(&self, collection: Collection, record: &Record) -> StorageResult<()> {
        let data =
            serde_json::to_string(&record.data).map_err(|source| StorageError::InvalidRecord {
                collection,
                id: record.id.clone(),
                source,
            })?;

        let conn = self.lock()?;
        conn.execute(
            &format!(
                "INSERT OR REPLACE INTO {} (id, timestamp, data) VALUES (?, ?, ?)",
                collection.name()
            ),
            params![record.id, record.timestamp.timestamp_millis(), data],
        )?;
        Ok(())
    }

    fn put_if_absent(&self, collection: Collection, record: &Record) -> StorageResult<bool> {
        let data =
            serde_json::to_string(&record.data).map_err(|source| StorageError::InvalidRecord {
                collection,
                id: record.id.clone(),
                source,
            })?;

        let conn = self.lock()?;
        let inserted = conn.execute(
            &format!(
                "INSERT OR IGNORE INTO {} (id, timestamp, data) VALUES (?, ?, ?)",
                collection.name()
            ),
            params![record.id, record.timestamp.timestamp_millis(), data],
        )?;
        Ok(inserted > 0)
    }

    fn delete(&self, collection: Collection, id: &str) -> StorageResult<()> {
        let conn = self.lock()?;
        conn.execute(
            &format!("DELETE FROM {} WHERE id = ?", collection.name()),
            params![id],
        )?;
        Ok(())
    }

    fn clear(&self, collection: Collection) -> StorageResult<()> {
        let conn = self.lock()?;
        conn.execute(&format!("DELETE FROM {}", collection.name()), [])?;
        Ok(())
    }

    fn count(&self, collection: Collection) -> StorageResult<u64> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", collection.name()),
            [],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn get_oldest_by_index(
        &self,
        collection: Collection,
        index: Index,
        n: usize,
    ) -> StorageResult<Vec<String>> {
        collection.require_index(index)?;
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT id FROM {} ORDER BY timestamp ASC, id ASC LIMIT ?",
            collection.name()
        ))?;
        let ids = stmt
            .query_map(params![n as i64], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(ids)
    }

    fn get_newest_by_index(
        &self,
        collection: Collection,
        index: Index,
        limit: usize,
        offset: usize,
    ) -> StorageResult<Vec<Record>> {
        collection.require_index(index)?;
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT id, timestamp, data FROM {} ORDER BY timestamp DESC, id DESC LIMIT ? OFFSET ?",
            collection.name()
        ))?;
        let rows = stmt.query_map(params![limit as i64, offset as i64], RecordRow::from_row)?;
        hydrate_all(rows, collection)
    }
}
