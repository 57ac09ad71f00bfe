// Durable document store using SQLite

use std::path::{Path, PathBuf};

use rusqlite::{params, Connection, OptionalExtension};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS documents (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

/// Well-known key for the data-construction script text.
pub const KEY_SCRIPT: &str = "script";
/// Well-known key for the template text.
pub const KEY_TEMPLATE: &str = "template";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("storage error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("storage error: {0}")]
    Io(#[from] std::io::Error),
}

/// A key-value store for editor documents.
///
/// Persistence is a downstream observer of editor state, never a gate on it:
/// `load_or` and `save` absorb every storage failure (logged, then ignored)
/// so a broken disk can degrade durability but never editing.
pub struct DocumentStore {
    conn: Connection,
}

impl DocumentStore {
    /// Open (or create) the store at `path`. Parent directories are created.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// Open a store that lives only for this process. Used as the fallback
    /// when the on-disk database cannot be opened, and by tests.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// Load the value for `key`, falling back to `default` when the key is
    /// absent or the read fails. An absent key is seeded with the default so
    /// the next cold start sees it.
    pub fn load_or(&self, key: &str, default: &str) -> String {
        match self.get(key) {
            Ok(Some(value)) => value,
            Ok(None) => {
                self.save(key, default);
                default.to_string()
            }
            Err(e) => {
                log::warn!("load '{}' failed, using default: {}", key, e);
                default.to_string()
            }
        }
    }

    /// Best-effort write. Failure is logged and otherwise ignored.
    pub fn save(&self, key: &str, value: &str) {
        if let Err(e) = self.put(key, value) {
            log::warn!("save '{}' failed: {}", key, e);
        }
    }

    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM documents WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn put(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO documents (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }
}

/// Default on-disk location: `<config dir>/ejslab/documents.sqlite`.
pub fn default_store_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ejslab")
        .join("documents.sqlite")
}
