// tasklist - Local task-list manager with pluggable key-value persistence

pub mod config;
pub mod error;
pub mod file_kv;
pub mod filter;
pub mod kv;
pub mod models;
pub mod snapshot;
pub mod sqlite_kv;
pub mod store;

// Re-export main types for convenience
pub use config::{Backend, Config};
pub use error::ValidationError;
pub use file_kv::FileKv;
pub use filter::TaskFilter;
pub use kv::{KvStore, MemoryKv};
pub use models::{Stats, Task, now_iso};
pub use sqlite_kv::SqliteKv;
pub use store::TaskStore;
