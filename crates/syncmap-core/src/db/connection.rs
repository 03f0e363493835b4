//! Database connection management

use std::path::Path;
use std::time::Duration;

use rusqlite::Connection;

use super::migrations;
use crate::error::Result;

/// Connection tuning shared by every driver that opens the mapping database
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    /// How long a writer waits on the `SQLite` write lock held by another driver
    pub busy_timeout: Duration,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            busy_timeout: Duration::from_millis(5000),
        }
    }
}

impl DatabaseConfig {
    /// Set the busy timeout
    #[must_use]
    pub const fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }
}

/// Database wrapper for a `SQLite` connection
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open a database at the given path, creating it if it doesn't exist
    ///
    /// Runs migrations automatically.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_config(path, &DatabaseConfig::default())
    }

    /// Open a database at the given path with explicit connection tuning
    pub fn open_with_config(path: impl AsRef<Path>, config: &DatabaseConfig) -> Result<Self> {
        let conn = Connection::open(path)?;

        let mut database = Self { conn };
        database.configure(config)?;
        database.migrate()?;
        Ok(database)
    }

    /// Open an in-memory database (useful for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;

        let mut database = Self { conn };
        database.configure(&DatabaseConfig::default())?;
        database.migrate()?;
        Ok(database)
    }

    /// Configure `SQLite` for concurrent drivers
    fn configure(&self, config: &DatabaseConfig) -> Result<()> {
        self.conn.busy_timeout(config.busy_timeout)?;
        // In-memory databases report "memory" instead of switching to WAL
        self.conn
            .query_row("PRAGMA journal_mode = WAL;", [], |row| {
                row.get::<_, String>(0)
            })?;
        self.conn.execute_batch(
            "PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys = ON;",
        )?;
        Ok(())
    }

    /// Run database migrations
    fn migrate(&mut self) -> Result<()> {
        migrations::run(&mut self.conn)
    }

    /// Get a reference to the underlying connection
    pub const fn connection(&self) -> &Connection {
        &self.conn
    }
}
