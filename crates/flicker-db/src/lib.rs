pub mod error;
pub mod keys;
pub mod migrations;
pub mod models;
pub mod queries;
pub mod reconcile;
pub mod sanitize;
pub mod stories;
pub mod users;

use chrono::Duration;
use rusqlite::Connection;
use std::path::Path;
use std::sync::Mutex;
use tracing::info;

pub use error::{Result, StoreError};
pub use reconcile::{Located, LookupStrategy, Resolved};

/// Key-value record store backed by a single SQLite table.
///
/// Every story operation is a read followed by a version-checked write, so
/// the mutex only has to cover individual statements, not whole operations.
pub struct Database {
    conn: Mutex<Connection>,
    story_ttl: Duration,
}

impl Database {
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let conn = Connection::open(path)?;

        // WAL mode for concurrent reads
        conn.pragma_update(None, "journal_mode", "WAL")?;

        migrations::run(&conn)?;

        info!("Record store opened at {}", path.display());
        Ok(Self {
            conn: Mutex::new(conn),
            story_ttl: flicker_types::models::default_story_ttl(),
        })
    }

    pub fn open_in_memory() -> anyhow::Result<Self> {
        let conn = Connection::open_in_memory()?;
        migrations::run(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            story_ttl: flicker_types::models::default_story_ttl(),
        })
    }

    /// Override the lifetime stamped onto newly created stories.
    pub fn with_story_ttl(mut self, ttl: Duration) -> Self {
        self.story_ttl = ttl;
        self
    }

    pub fn story_ttl(&self) -> Duration {
        self.story_ttl
    }

    pub fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.conn.lock().map_err(|e| StoreError::Poisoned(e.to_string()))?;
        f(&conn)
    }

    pub fn with_conn_mut<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T>,
    {
        let mut conn = self.conn.lock().map_err(|e| StoreError::Poisoned(e.to_string()))?;
        f(&mut conn)
    }
}
