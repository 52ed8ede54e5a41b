//! Durable local key-value store over `SQLite`.
//!
//! One table, one row per key. The engine only ever uses a single fixed
//! key holding the whole-store snapshot, but the store itself is a plain
//! kv surface so tests and future callers are not tied to that choice.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::{Connection, OptionalExtension, params};
use tracing::debug;

use banter_core::errors::{ChatError, Result};

use crate::snapshot::{SNAPSHOT_VERSION, STORAGE_KEY, StoreSnapshot};

/// Local durable store. All access serializes through one connection;
/// contention is negligible because writes are whole-snapshot blobs.
pub struct LocalStore {
    conn: Mutex<Connection>,
}

impl LocalStore {
    /// Open (and create if needed) the store at `path`. Parent
    /// directories are created.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ChatError::Persistence(format!("create {}: {e}", parent.display())))?;
        }
        let conn = Connection::open(path)
            .map_err(|e| ChatError::Persistence(format!("open {}: {e}", path.display())))?;
        Self::init(conn)
    }

    /// In-memory store for tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| ChatError::Persistence(format!("open in-memory: {e}")))?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS kv (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
        )
        .map_err(|e| ChatError::Persistence(format!("init schema: {e}")))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Write a value, replacing any previous one under the same key.
    pub fn put(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.lock()?;
        let _ = conn
            .execute(
                "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
                params![key, value],
            )
            .map_err(|e| ChatError::Persistence(format!("put {key}: {e}")))?;
        Ok(())
    }

    /// Read a value, `None` when the key has never been written.
    pub fn get(&self, key: &str) -> Result<Option<String>> {
        let conn = self.lock()?;
        conn.query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
            row.get(0)
        })
        .optional()
        .map_err(|e| ChatError::Persistence(format!("get {key}: {e}")))
    }

    /// Serialize and store the whole-store snapshot under the fixed key.
    pub fn save_snapshot(&self, snapshot: &StoreSnapshot) -> Result<()> {
        let json = serde_json::to_string(snapshot)
            .map_err(|e| ChatError::Persistence(format!("serialize snapshot: {e}")))?;
        self.put(STORAGE_KEY, &json)?;
        debug!(bytes = json.len(), "snapshot persisted");
        Ok(())
    }

    /// Load the snapshot, if one was ever written.
    ///
    /// A snapshot with an unknown schema version is refused rather than
    /// misread; the caller decides whether to start fresh.
    pub fn load_snapshot(&self) -> Result<Option<StoreSnapshot>> {
        let Some(json) = self.get(STORAGE_KEY)? else {
            return Ok(None);
        };
        let snapshot: StoreSnapshot = serde_json::from_str(&json)
            .map_err(|e| ChatError::Persistence(format!("decode snapshot: {e}")))?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(ChatError::Persistence(format!(
                "unsupported snapshot version {} (expected {SNAPSHOT_VERSION})",
                snapshot.version
            )));
        }
        Ok(Some(snapshot))
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| ChatError::Persistence("store lock poisoned".into()))
    }
}
