mod models;
mod queries;

pub use models::*;

use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::Connection;
use thiserror::Error;

/// Failures surfaced by the command store.
///
/// Kept distinct from `anyhow::Error` so the TUI can tell a rejected name
/// apart from a database that has gone away.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("a command named '{0}' already exists")]
    DuplicateName(String),
    #[error("{0}")]
    Validation(&'static str),
    #[error("no command with id {0}")]
    NotFound(i64),
    #[error("database error: {0}")]
    Io(#[from] rusqlite::Error),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

pub struct Store {
    pub conn: Connection,
}

impl Store {
    pub fn open(db_path: &Path) -> Result<Self> {
        let conn = Connection::open(db_path)
            .with_context(|| format!("failed to open database at {}", db_path.display()))?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA busy_timeout=5000;")?;
        Ok(Store { conn })
    }

    /// Fresh, already-migrated store that lives only as long as the value.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Store { conn };
        store.migrate()?;
        Ok(store)
    }

    pub fn migrate(&self) -> Result<()> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS commands (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                command_str TEXT NOT NULL,
                note TEXT NOT NULL,
                usage_count INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            );
            ",
        )?;
        Ok(())
    }
}
