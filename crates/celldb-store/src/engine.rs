use std::path::Path;
use std::time::Duration;

use celldb_core::{CLOSE, OPEN};
use parking_lot::Mutex;
use rusqlite::{Connection, OpenFlags};
use tracing::{debug, info};

use crate::config::StoreConfig;
use crate::error::StoreError;

/// Location string that opens a private in-memory database.
pub const MEMORY: &str = ":memory:";

/// A raw cell as returned by the engine.
pub type Cell = rusqlite::types::Value;

/// The narrow surface the store needs from a relational engine.
///
/// Every call blocks until the statement finishes. Implementations serialize
/// statements internally; callers never lock.
pub trait Engine: Send + Sync {
    fn location(&self) -> &str;

    /// Run a statement and collect every row it yields.
    fn execute(&self, sql: &str) -> Result<Vec<Vec<Cell>>, StoreError>;

    /// Run a mutating statement and persist it. Returns affected rows.
    fn commit(&self, sql: &str) -> Result<usize, StoreError>;

    fn list_relations(&self) -> Result<Vec<String>, StoreError>;

    /// `(column name, declared type text)` pairs in declaration order.
    fn describe_relation(&self, name: &str) -> Result<Vec<(String, String)>, StoreError>;

    fn close(&self) -> Result<(), StoreError>;

    fn is_open(&self) -> bool;
}

/// SQLite engine over a single connection.
/// Uses parking_lot::Mutex so one statement runs at a time.
pub struct SqliteEngine {
    conn: Mutex<Option<Connection>>,
    location: String,
}

impl SqliteEngine {
    /// Open `location`, or an in-memory database for [`MEMORY`].
    pub fn open(location: &str, config: &StoreConfig) -> Result<Self, StoreError> {
        let conn = if location == MEMORY {
            Connection::open_in_memory()?
        } else {
            let path = Path::new(location);
            let mut flags = OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_URI
                | OpenFlags::SQLITE_OPEN_NO_MUTEX;
            if config.create_if_missing {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent)
                        .map_err(|e| StoreError::Io(format!("create dir: {e}")))?;
                }
                flags |= OpenFlags::SQLITE_OPEN_CREATE;
            }
            Connection::open_with_flags(path, flags)?
        };

        conn.busy_timeout(Duration::from_millis(u64::from(config.busy_timeout_ms)))?;

        info!(location, "database opened");

        Ok(Self {
            conn: Mutex::new(Some(conn)),
            location: location.to_string(),
        })
    }

    pub fn in_memory() -> Result<Self, StoreError> {
        Self::open(MEMORY, &StoreConfig::default())
    }

    fn with_conn<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Connection) -> Result<T, StoreError>,
    {
        let guard = self.conn.lock();
        let conn = guard
            .as_ref()
            .ok_or_else(|| StoreError::Closed(self.location.clone()))?;
        f(conn)
    }
}

impl Engine for SqliteEngine {
    fn location(&self) -> &str {
        &self.location
    }

    fn execute(&self, sql: &str) -> Result<Vec<Vec<Cell>>, StoreError> {
        self.with_conn(|conn| {
            debug!(sql = %printable(sql), "execute");
            let mut stmt = conn.prepare(sql)?;
            let width = stmt.column_count();
            let rows = stmt
                .query_map([], |row| {
                    (0..width)
                        .map(|i| row.get::<_, Cell>(i))
                        .collect::<Result<Vec<_>, _>>()
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    fn commit(&self, sql: &str) -> Result<usize, StoreError> {
        self.with_conn(|conn| {
            debug!(sql = %printable(sql), "commit");
            // Autocommit: each statement is its own transaction.
            Ok(conn.execute(sql, [])?)
        })
    }

    fn list_relations(&self) -> Result<Vec<String>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT name FROM sqlite_master
                 WHERE type = 'table' AND name NOT LIKE 'sqlite_%'
                 ORDER BY name",
            )?;
            let names = stmt
                .query_map([], |row| row.get(0))?
                .collect::<Result<Vec<String>, _>>()?;
            Ok(names)
        })
    }

    fn describe_relation(&self, name: &str) -> Result<Vec<(String, String)>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "PRAGMA table_info(\"{}\")",
                name.replace('"', "\"\"")
            ))?;
            let columns = stmt
                .query_map([], |row| Ok((row.get(1)?, row.get(2)?)))?
                .collect::<Result<Vec<(String, String)>, _>>()?;
            Ok(columns)
        })
    }

    fn close(&self) -> Result<(), StoreError> {
        if let Some(conn) = self.conn.lock().take() {
            conn.close().map_err(|(_, e)| StoreError::from(e))?;
            info!(location = %self.location, "database closed");
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.conn.lock().is_some()
    }
}

/// Statement text with the composite markers made visible for logs.
pub fn printable(sql: &str) -> String {
    sql.replace(OPEN, "[STX]").replace(CLOSE, "[ETX]")
}
