// Directory-backed key-value store: one file per key

use crate::kv::{KvStore, validate_key};
use eyre::{Context, Result};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

pub(crate) const STORE_DIR: &str = ".tasklist";
pub(crate) const CURRENT_VERSION: u32 = 1;

const LOCK_FILE: &str = ".lock";

/// Stores each key as a file inside `<path>/.tasklist/`
pub struct FileKv {
    base_path: PathBuf,
}

impl FileKv {
    /// Open or create a file store under the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let base_path = path.as_ref().join(STORE_DIR);
        fs::create_dir_all(&base_path).context("Failed to create store directory")?;

        let store = Self { base_path };
        write_version(&store.base_path)?;

        debug!(path = ?store.base_path, "Opened file store");
        Ok(store)
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn key_path(&self, key: &str) -> PathBuf {
        self.base_path.join(key)
    }
}

impl KvStore for FileKv {
    fn get(&self, key: &str) -> Result<Option<String>> {
        validate_key(key)?;

        match fs::read_to_string(self.key_path(key)) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("Failed to read key {}", key)),
        }
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        validate_key(key)?;

        let lock = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(self.base_path.join(LOCK_FILE))
            .context("Failed to open lock file")?;

        // Released when `lock` is dropped
        lock.lock_exclusive().context("Failed to acquire file lock")?;

        let tmp_path = self.base_path.join(format!("{}.tmp", key));
        let mut tmp = File::create(&tmp_path).context("Failed to create temporary file")?;
        tmp.write_all(value.as_bytes())?;
        tmp.sync_all()?;

        fs::rename(&tmp_path, self.key_path(key)).with_context(|| format!("Failed to write key {}", key))?;

        Ok(())
    }
}

/// Write the layout version on first use
pub(crate) fn write_version(base_path: &Path) -> Result<()> {
    let version_path = base_path.join(".version");
    if !version_path.exists() {
        fs::write(version_path, CURRENT_VERSION.to_string())?;
    }
    Ok(())
}
