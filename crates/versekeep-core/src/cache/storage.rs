//! Cache bucket storage
//!
//! A bucket is a named map from absolute URL to a stored response.
//! Buckets exist independently of their contents: opening a bucket
//! creates it empty.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Mutex;

use rusqlite::{params, Connection, OptionalExtension};

use super::error::{CacheError, CacheResult};
use super::fetch::CachedResponse;

/// Storage for named response buckets
pub trait CacheStorage: Send + Sync {
    /// Names of every existing bucket, sorted
    fn buckets(&self) -> CacheResult<Vec<String>>;

    /// Create the bucket if it doesn't exist
    fn open_bucket(&self, bucket: &str) -> CacheResult<()>;

    /// Delete a bucket and everything in it; returns whether it existed
    fn delete_bucket(&self, bucket: &str) -> CacheResult<bool>;

    /// Exact-URL lookup
    fn lookup(&self, bucket: &str, url: &str) -> CacheResult<Option<CachedResponse>>;

    /// Store a response, creating the bucket if needed
    fn store(&self, bucket: &str, url: &str, response: &CachedResponse) -> CacheResult<()>;

    /// URLs stored in a bucket, sorted
    fn keys(&self, bucket: &str) -> CacheResult<Vec<String>>;
}

// ==================== In-memory ====================

/// In-process bucket storage for tests and ephemeral sessions
#[derive(Default)]
pub struct MemoryCacheStorage {
    buckets: Mutex<BTreeMap<String, BTreeMap<String, CachedResponse>>>,
}

impl MemoryCacheStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_buckets<T>(
        &self,
        f: impl FnOnce(&mut BTreeMap<String, BTreeMap<String, CachedResponse>>) -> T,
    ) -> CacheResult<T> {
        let mut buckets = self
            .buckets
            .lock()
            .map_err(|_| CacheError::Unavailable("bucket lock poisoned".to_string()))?;
        Ok(f(&mut buckets))
    }
}

impl CacheStorage for MemoryCacheStorage {
    fn buckets(&self) -> CacheResult<Vec<String>> {
        self.with_buckets(|b| b.keys().cloned().collect())
    }

    fn open_bucket(&self, bucket: &str) -> CacheResult<()> {
        self.with_buckets(|b| {
            b.entry(bucket.to_string()).or_default();
        })
    }

    fn delete_bucket(&self, bucket: &str) -> CacheResult<bool> {
        self.with_buckets(|b| b.remove(bucket).is_some())
    }

    fn lookup(&self, bucket: &str, url: &str) -> CacheResult<Option<CachedResponse>> {
        self.with_buckets(|b| b.get(bucket).and_then(|entries| entries.get(url)).cloned())
    }

    fn store(&self, bucket: &str, url: &str, response: &CachedResponse) -> CacheResult<()> {
        self.with_buckets(|b| {
            b.entry(bucket.to_string())
                .or_default()
                .insert(url.to_string(), response.clone());
        })
    }

    fn keys(&self, bucket: &str) -> CacheResult<Vec<String>> {
        self.with_buckets(|b| {
            b.get(bucket)
                .map(|entries| entries.keys().cloned().collect())
                .unwrap_or_default()
        })
    }
}

// ==================== SQLite ====================

/// Bucket storage in a SQLite file, surviving restarts
pub struct SqliteCacheStorage {
    conn: Mutex<Connection>,
}

impl SqliteCacheStorage {
    /// Open (or create) the cache database at `path`
    pub fn open(path: &Path) -> CacheResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| CacheError::CreateDirectory {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        Self::from_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> CacheResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> CacheResult<Self> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS cache_buckets (
                name TEXT PRIMARY KEY
            );

            CREATE TABLE IF NOT EXISTS cache_entries (
                bucket TEXT NOT NULL REFERENCES cache_buckets(name) ON DELETE CASCADE,
                url TEXT NOT NULL,
                status INTEGER NOT NULL,
                headers TEXT NOT NULL,
                body BLOB NOT NULL,
                PRIMARY KEY (bucket, url)
            );

            PRAGMA foreign_keys = ON;
            "#,
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> CacheResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| CacheError::Unavailable("connection lock poisoned".to_string()))
    }
}

impl CacheStorage for SqliteCacheStorage {
    fn buckets(&self) -> CacheResult<Vec<String>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT name FROM cache_buckets ORDER BY name")?;
        let names = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(names)
    }

    fn open_bucket(&self, bucket: &str) -> CacheResult<()> {
        self.conn()?.execute(
            "INSERT OR IGNORE INTO cache_buckets (name) VALUES (?1)",
            params![bucket],
        )?;
        Ok(())
    }

    fn delete_bucket(&self, bucket: &str) -> CacheResult<bool> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM cache_entries WHERE bucket = ?1", params![bucket])?;
        let removed = tx.execute("DELETE FROM cache_buckets WHERE name = ?1", params![bucket])?;
        tx.commit()?;
        Ok(removed > 0)
    }

    fn lookup(&self, bucket: &str, url: &str) -> CacheResult<Option<CachedResponse>> {
        let conn = self.conn()?;
        let row: Option<(u16, String, Vec<u8>)> = conn
            .query_row(
                "SELECT status, headers, body FROM cache_entries WHERE bucket = ?1 AND url = ?2",
                params![bucket, url],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;

        row.map(|(status, headers, body)| {
            let headers = serde_json::from_str(&headers).map_err(|source| CacheError::Headers {
                url: url.to_string(),
                source,
            })?;
            Ok(CachedResponse {
                status,
                headers,
                body,
            })
        })
        .transpose()
    }

    fn store(&self, bucket: &str, url: &str, response: &CachedResponse) -> CacheResult<()> {
        let headers =
            serde_json::to_string(&response.headers).map_err(|source| CacheError::Headers {
                url: url.to_string(),
                source,
            })?;

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT OR IGNORE INTO cache_buckets (name) VALUES (?1)",
            params![bucket],
        )?;
        tx.execute(
            "INSERT OR REPLACE INTO cache_entries (bucket, url, status, headers, body)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![bucket, url, response.status, headers, response.body],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn keys(&self, bucket: &str) -> CacheResult<Vec<String>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT url FROM cache_entries WHERE bucket = ?1 ORDER BY url")?;
        let urls = stmt
            .query_map(params![bucket], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(urls)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn response(body: &str) -> CachedResponse {
        CachedResponse::ok("text/plain", body.as_bytes().to_vec())
    }

    fn exercise(storage: &dyn CacheStorage) {
        storage.open_bucket("bible-app-v1").unwrap();
        storage.open_bucket("cache").unwrap();
        assert_eq!(storage.buckets().unwrap(), vec!["bible-app-v1", "cache"]);
        assert!(storage.keys("bible-app-v1").unwrap().is_empty());

        let url = "http://localhost:8080/index.html";
        storage.store("bible-app-v1", url, &response("<html>")).unwrap();
        assert_eq!(
            storage.lookup("bible-app-v1", url).unwrap(),
            Some(response("<html>"))
        );
        assert!(storage.lookup("cache", url).unwrap().is_none());

        // Storing into a missing bucket creates it
        storage.store("bible-app-v2", url, &response("new")).unwrap();
        assert_eq!(storage.buckets().unwrap().len(), 3);

        assert!(storage.delete_bucket("bible-app-v1").unwrap());
        assert!(!storage.delete_bucket("bible-app-v1").unwrap());
        assert!(storage.lookup("bible-app-v1", url).unwrap().is_none());
        assert_eq!(storage.buckets().unwrap(), vec!["bible-app-v2", "cache"]);
    }

    #[test]
    fn test_memory_storage() {
        exercise(&MemoryCacheStorage::new());
    }

    #[test]
    fn test_sqlite_storage() {
        exercise(&SqliteCacheStorage::open_in_memory().unwrap());
    }

    #[test]
    fn test_sqlite_storage_persists() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("cache.db");
        let url = "http://localhost:8080/assets/index-abc123.js";

        {
            let storage = SqliteCacheStorage::open(&path).unwrap();
            let mut stored = response("console.log(1)");
            stored
                .headers
                .push(("etag".to_string(), "\"abc\"".to_string()));
            storage.store("bible-app-v1", url, &stored).unwrap();
        }

        let storage = SqliteCacheStorage::open(&path).unwrap();
        let found = storage.lookup("bible-app-v1", url).unwrap().unwrap();
        assert_eq!(found.header("ETag"), Some("\"abc\""));
        assert_eq!(storage.keys("bible-app-v1").unwrap(), vec![url]);
    }
}
