//! SQLite schema for the persistent key-value backend
//!
//! Each collection is one table keyed by `id`. Record payloads are stored
//! as JSON text; `timestamp` is a millisecond column that the history
//! table indexes for pruning and paged listing.

use rusqlite::{Connection, Result};

use super::Collection;

/// Current schema version for migrations
///
/// - 1: collection tables
/// - 2: ascending `timestamp` index on `history`
pub const SCHEMA_VERSION: i32 = 2;

/// Initialize or upgrade the database schema
///
/// Every statement is idempotent, so running this against an older
/// schema creates whatever is missing and bumps the stored version.
pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Schema version tracking
        CREATE TABLE IF NOT EXISTS schema_info (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );
        "#,
    )?;

    for collection in Collection::ALL {
        conn.execute_batch(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {table} (
                id TEXT PRIMARY KEY,
                timestamp INTEGER NOT NULL,
                data TEXT NOT NULL
            );
            "#,
            table = collection.name()
        ))?;
    }

    conn.execute_batch(
        r#"
        -- Pruning and newest-first paging over visited locations
        CREATE INDEX IF NOT EXISTS idx_history_timestamp ON history(timestamp, id);
        "#,
    )?;

    conn.execute(
        "INSERT OR REPLACE INTO schema_info (key, value) VALUES ('version', ?)",
        [SCHEMA_VERSION.to_string()],
    )?;

    Ok(())
}

/// Get the current schema version from the database
pub fn get_schema_version(conn: &Connection) -> Result<Option<i32>> {
    let mut stmt = conn.prepare("SELECT value FROM schema_info WHERE key = 'version'")?;
    let result: Result<String> = stmt.query_row([], |row| row.get(0));

    match result {
        Ok(version_str) => Ok(version_str.parse().ok()),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Check if schema needs initialization or migration
pub fn needs_init(conn: &Connection) -> bool {
    let table_exists: bool = conn
        .prepare("SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_info'")
        .and_then(|mut stmt| stmt.exists([]))
        .unwrap_or(false);

    if !table_exists {
        return true;
    }

    match get_schema_version(conn) {
        Ok(Some(v)) => v < SCHEMA_VERSION,
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(conn: &Connection, kind: &str) -> Vec<String> {
        conn.prepare("SELECT name FROM sqlite_master WHERE type = ? ORDER BY name")
            .unwrap()
            .query_map([kind], |row| row.get(0))
            .unwrap()
            .filter_map(|r| r.ok())
            .collect()
    }

    #[test]
    fn test_init_schema() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();

        let tables = names(&conn, "table");
        for collection in Collection::ALL {
            assert!(tables.contains(&collection.name().to_string()));
        }
        assert!(names(&conn, "index").contains(&"idx_history_timestamp".to_string()));
    }

    #[test]
    fn test_schema_version() {
        let conn = Connection::open_in_memory().unwrap();
        assert!(needs_init(&conn));

        init_schema(&conn).unwrap();

        assert_eq!(get_schema_version(&conn).unwrap(), Some(SCHEMA_VERSION));
        assert!(!needs_init(&conn));
    }

    #[test]
    fn test_upgrade_from_version_one_adds_index() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            r#"
            CREATE TABLE schema_info (key TEXT PRIMARY KEY, value TEXT NOT NULL);
            INSERT INTO schema_info (key, value) VALUES ('version', '1');
            CREATE TABLE history (id TEXT PRIMARY KEY, timestamp INTEGER NOT NULL, data TEXT NOT NULL);
            INSERT INTO history (id, timestamp, data) VALUES ('1/1', 5, '{}');
            "#,
        )
        .unwrap();

        assert!(needs_init(&conn));
        init_schema(&conn).unwrap();

        assert!(!needs_init(&conn));
        assert!(names(&conn, "index").contains(&"idx_history_timestamp".to_string()));

        let kept: i64 = conn
            .query_row("SELECT COUNT(*) FROM history", [], |row| row.get(0))
            .unwrap();
        assert_eq!(kept, 1);
    }
}
