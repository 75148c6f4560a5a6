// CLI configuration loaded from YAML

use crate::file_kv::FileKv;
use crate::filter::TaskFilter;
use crate::kv::KvStore;
use crate::snapshot::validate_namespace;
use crate::sqlite_kv::SqliteKv;
use eyre::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

const CONFIG_DIR: &str = "tasklist";
const CONFIG_FILE: &str = "config.yml";

/// Which key-value backend holds the task list
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Sqlite,
    Files,
}

impl Backend {
    /// Open this backend rooted at `path`
    pub fn open(self, path: &Path) -> Result<Box<dyn KvStore>> {
        let kv: Box<dyn KvStore> = match self {
            Backend::Sqlite => Box::new(
                SqliteKv::open(path).with_context(|| format!("Failed to open SQLite store at {}", path.display()))?,
            ),
            Backend::Files => Box::new(
                FileKv::open(path).with_context(|| format!("Failed to open file store at {}", path.display()))?,
            ),
        };
        Ok(kv)
    }
}

/// Settings for the `tasklist` binary; every field is optional in the file
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Directory holding the `.tasklist` store
    pub store_path: Option<PathBuf>,
    pub backend: Backend,
    /// Prefix applied to the persisted keys
    pub namespace: Option<String>,
    pub default_filter: TaskFilter,
    pub log_level: Option<String>,
}

impl Config {
    /// Load from an explicit file, or from the user config directory when `path` is `None`
    ///
    /// A missing default file yields the defaults; a missing explicit file is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => match default_config_path() {
                Some(path) if path.exists() => Self::from_file(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let contents =
            fs::read_to_string(path).with_context(|| format!("Failed to read config {}", path.display()))?;
        let config = Self::from_yaml(&contents).with_context(|| format!("Failed to parse config {}", path.display()))?;
        debug!(path = ?path, "Loaded config");
        Ok(config)
    }

    pub fn from_yaml(contents: &str) -> Result<Self> {
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if let Some(ns) = self.namespace.as_deref() {
            validate_namespace(ns)?;
        }
        Ok(())
    }

    /// Store directory: configured path, else the user data dir, else the current dir
    pub fn resolved_store_path(&self) -> PathBuf {
        self.store_path
            .clone()
            .or_else(|| dirs::data_dir().map(|d| d.join(CONFIG_DIR)))
            .unwrap_or_else(|| PathBuf::from("."))
    }

    pub fn log_level(&self) -> &str {
        self.log_level.as_deref().unwrap_or("warn")
    }
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(CONFIG_DIR).join(CONFIG_FILE))
}
