pub mod migrations;
pub mod models;
pub mod queries;
pub mod seed;

pub use queries::{MatchOutcome, RequestOutcome};

use anyhow::Result;
use rusqlite::Connection;
use std::path::Path;
use std::sync::Mutex;
use tracing::info;

/// Path value that selects a private in-memory database.
pub const IN_MEMORY: &str = ":memory:";

/// Repository over the users, products, notifications and messages stores.
///
/// A single connection sits behind the mutex, so every transition runs to
/// completion before the next one starts.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        if path.as_os_str() == IN_MEMORY {
            return Self::open_in_memory();
        }

        let conn = Connection::open(path)?;

        // WAL mode for concurrent reads
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |_| Ok(()))?;

        let db = Self::init(conn)?;
        info!("Database opened at {}", path.display());
        Ok(db)
    }

    /// Fresh database that lives as long as this value. Restart loses everything.
    pub fn open_in_memory() -> Result<Self> {
        let db = Self::init(Connection::open_in_memory()?)?;
        info!("In-memory database opened");
        Ok(db)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        migrations::run(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| anyhow::anyhow!("DB lock poisoned: {}", e))?;
        f(&conn)
    }

    /// Like [`Database::with_conn`] but hands out `&mut` so callers can open a
    /// transaction.
    pub fn with_conn_mut<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T>,
    {
        let mut conn = self
            .conn
            .lock()
            .map_err(|e| anyhow::anyhow!("DB lock poisoned: {}", e))?;
        f(&mut conn)
    }
}
