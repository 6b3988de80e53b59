mod schema;

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::info;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Connection, OptionalExtension};

use crate::error::SubtrackError;
use schema::{CREATE_SCHEMA_SQL, SCHEMA_VERSION};

pub type DbConnection = PooledConnection<SqliteConnectionManager>;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Handle to the SQLite store. Cloning is cheap: all clones share one
/// connection pool, which lives as long as the last clone.
#[derive(Clone)]
pub struct Database {
    pool: Pool<SqliteConnectionManager>,
    path: PathBuf,
}

impl Database {
    pub fn open(path: &Path, pool_size: u32) -> Result<Self, SubtrackError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let manager = SqliteConnectionManager::file(path).with_init(|conn| {
            conn.busy_timeout(BUSY_TIMEOUT)?;
            conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA foreign_keys = ON;")
        });

        let pool = Pool::builder().max_size(pool_size).build(manager)?;

        let db = Database {
            pool,
            path: path.to_owned(),
        };

        {
            let conn = db.get_connection()?;
            Self::ensure_schema(&conn)?;
        }

        info!("Database opened at: {}", path.display());

        Ok(db)
    }

    pub fn get_connection(&self) -> Result<DbConnection, SubtrackError> {
        Ok(self.pool.get()?)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get_schema_version(&self) -> Result<String, SubtrackError> {
        let conn = self.get_connection()?;
        let version: String = conn.query_row(
            "SELECT value FROM meta WHERE key = 'schema_version'",
            [],
            |row| row.get(0),
        )?;

        Ok(version)
    }

    fn ensure_schema(conn: &Connection) -> Result<(), SubtrackError> {
        let table_exists: bool = conn
            .query_row(
                "SELECT count(*) FROM sqlite_master WHERE type='table' AND name='meta'",
                [],
                |row| row.get::<_, i32>(0),
            )
            .map(|count| count > 0)
            .unwrap_or(false);

        if !table_exists {
            info!("Creating database schema version {}", SCHEMA_VERSION);
            conn.execute_batch(CREATE_SCHEMA_SQL)?;
            return Ok(());
        }

        let stored_version: Option<String> = conn
            .query_row(
                "SELECT value FROM meta WHERE key = 'schema_version'",
                [],
                |row| row.get(0),
            )
            .optional()?;

        match stored_version.as_deref() {
            Some(SCHEMA_VERSION) => Ok(()),
            Some(other) => Err(SubtrackError::Error(format!(
                "Schema version mismatch: database has '{}', expected '{}'",
                other, SCHEMA_VERSION
            ))),
            None => Err(SubtrackError::Error("Schema version missing".to_string())),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::temp_db;
    use super::*;

    #[test]
    fn test_open_creates_tables() {
        let (_dir, db) = temp_db();
        let conn = db.get_connection().unwrap();

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();

        assert!(tables.contains(&"meta".to_string()));
        assert!(tables.contains(&"transactions".to_string()));
        assert!(tables.contains(&"subscriptions".to_string()));
        assert_eq!(db.get_schema_version().unwrap(), "1");
    }

    #[test]
    fn test_reopen_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("ledger.db");

        let db = Database::open(&path, 1).unwrap();
        drop(db);

        let db = Database::open(&path, 1).unwrap();
        assert_eq!(db.path(), path.as_path());
        assert_eq!(db.get_schema_version().unwrap(), "1");
    }

    #[test]
    fn test_schema_version_mismatch_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.db");

        {
            let db = Database::open(&path, 1).unwrap();
            let conn = db.get_connection().unwrap();
            conn.execute(
                "UPDATE meta SET value = '99' WHERE key = 'schema_version'",
                [],
            )
            .unwrap();
        }

        let result = Database::open(&path, 1);
        assert!(matches!(result, Err(SubtrackError::Error(msg)) if msg.contains("mismatch")));
    }
}
