// SQLite-backed key-value store

use crate::file_kv::{STORE_DIR, write_version};
use crate::kv::{KvStore, validate_key};
use eyre::{Context, Result};
use rusqlite::{Connection, OptionalExtension};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

const DB_FILE: &str = "tasklist.db";

/// Key-value store kept in a single `kv` table
pub struct SqliteKv {
    base_path: Option<PathBuf>,
    db: Connection,
}

impl SqliteKv {
    /// Open or create a database in `<path>/.tasklist/tasklist.db`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let base_path = path.as_ref().join(STORE_DIR);
        fs::create_dir_all(&base_path).context("Failed to create store directory")?;

        let db_path = base_path.join(DB_FILE);
        let db = Connection::open(&db_path).context("Failed to open SQLite database")?;

        let store = Self {
            base_path: Some(base_path.clone()),
            db,
        };

        store.create_schema()?;
        store.create_gitignore(&base_path)?;
        write_version(&base_path)?;

        debug!(path = ?db_path, "Opened SQLite store");
        Ok(store)
    }

    /// Private database that disappears with the connection
    pub fn in_memory() -> Result<Self> {
        let db = Connection::open_in_memory().context("Failed to open in-memory SQLite database")?;
        let store = Self { base_path: None, db };
        store.create_schema()?;
        Ok(store)
    }

    /// Directory holding the database, `None` for in-memory stores
    pub fn base_path(&self) -> Option<&Path> {
        self.base_path.as_deref()
    }

    fn create_schema(&self) -> Result<()> {
        debug!("Creating database schema");

        self.db.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            );
            "#,
        )?;

        Ok(())
    }

    fn create_gitignore(&self, base_path: &Path) -> Result<()> {
        let gitignore_path = base_path.join(".gitignore");
        if !gitignore_path.exists() {
            fs::write(gitignore_path, "tasklist.db\ntasklist.db-shm\ntasklist.db-wal\n")?;
        }
        Ok(())
    }
}

impl KvStore for SqliteKv {
    fn get(&self, key: &str) -> Result<Option<String>> {
        validate_key(key)?;

        let value: Option<String> = self
            .db
            .query_row("SELECT value FROM kv WHERE key = ?1", [key], |row| row.get(0))
            .optional()
            .with_context(|| format!("Failed to read key {}", key))?;

        Ok(value)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        validate_key(key)?;

        self.db
            .execute(
                "INSERT OR REPLACE INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)",
                rusqlite::params![key, value, chrono::Utc::now().timestamp_millis()],
            )
            .with_context(|| format!("Failed to write key {}", key))?;

        Ok(())
    }
}
