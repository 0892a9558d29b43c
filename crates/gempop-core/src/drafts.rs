//! Per-mode draft persistence
//!
//! Controllers receive a `dyn DraftStore` at construction; the TUI uses the
//! SQLite store, tests use the in-memory one.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use rusqlite::{params, Connection, OptionalExtension};
use tracing::warn;

use crate::error::DraftError;

/// Durable key-value store for input drafts. Never fails outward: a read
/// miss or error yields an empty string, a write error is logged.
pub trait DraftStore: Send + Sync {
    fn get(&self, key: &str) -> String;
    fn set(&self, key: &str, text: &str);
}

pub struct SqliteDraftStore {
    conn: Mutex<Connection>,
}

impl SqliteDraftStore {
    pub fn open(path: &Path) -> Result<Self, DraftError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self, DraftError> {
        Self::init(Connection::open_in_memory()?)
    }

    /// `<data dir>/gempop/drafts.db`
    pub fn default_path() -> Result<PathBuf, DraftError> {
        let data_dir = dirs::data_dir().ok_or(DraftError::NoDataDir)?;
        Ok(data_dir.join("gempop").join("drafts.db"))
    }

    fn init(conn: Connection) -> Result<Self, DraftError> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS drafts (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
            [],
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn try_get(&self, key: &str) -> Result<Option<String>, DraftError> {
        let conn = self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let value = conn
            .query_row(
                "SELECT value FROM drafts WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn try_set(&self, key: &str, text: &str) -> Result<(), DraftError> {
        let conn = self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        conn.execute(
            "INSERT INTO drafts (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, text],
        )?;
        Ok(())
    }
}

impl DraftStore for SqliteDraftStore {
    fn get(&self, key: &str) -> String {
        match self.try_get(key) {
            Ok(value) => value.unwrap_or_default(),
            Err(e) => {
                warn!(key, error = %e, "Could not read draft");
                String::new()
            }
        }
    }

    fn set(&self, key: &str, text: &str) {
        if let Err(e) = self.try_set(key, text) {
            warn!(key, error = %e, "Could not save draft");
        }
    }
}

#[derive(Default)]
pub struct MemoryDraftStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryDraftStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DraftStore for MemoryDraftStore {
    fn get(&self, key: &str) -> String {
        self.values
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(key)
            .cloned()
            .unwrap_or_default()
    }

    fn set(&self, key: &str, text: &str) {
        self.values
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(key.to_string(), text.to_string());
    }
}
