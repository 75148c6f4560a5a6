// Key-value persistence boundary

use eyre::{Result, eyre};
use std::collections::HashMap;

/// Minimal string key-value store the task list persists into
pub trait KvStore {
    /// Value stored under `key`, or `None` if the key was never written
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key`, replacing any previous value
    fn set(&mut self, key: &str, value: &str) -> Result<()>;
}

impl<K: KvStore + ?Sized> KvStore for Box<K> {
    fn get(&self, key: &str) -> Result<Option<String>> {
        (**self).get(key)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        (**self).set(key, value)
    }
}

impl<K: KvStore + ?Sized> KvStore for &mut K {
    fn get(&self, key: &str) -> Result<Option<String>> {
        (**self).get(key)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        (**self).set(key, value)
    }
}

/// In-process store; contents are lost when dropped
#[derive(Debug, Clone, Default)]
pub struct MemoryKv {
    entries: HashMap<String, String>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl KvStore for MemoryKv {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Keys end up as file names and SQL values, so keep them boring
pub(crate) fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(eyre!("Key cannot be empty"));
    }
    if key.len() > 64 {
        return Err(eyre!("Key too long: {} (max 64 chars)", key));
    }
    if !key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
        return Err(eyre!("Invalid key: {} (must be alphanumeric with _/-)", key));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_kv_get_set() {
        let mut kv = MemoryKv::new();
        assert!(kv.is_empty());
        assert_eq!(kv.get("tasks").unwrap(), None);

        kv.set("tasks", "[]").unwrap();
        kv.set("tasks", "[1]").unwrap();
        assert_eq!(kv.get("tasks").unwrap().as_deref(), Some("[1]"));
        assert_eq!(kv.len(), 1);
    }

    #[test]
    fn test_boxed_kv_delegates() {
        let mut kv: Box<dyn KvStore> = Box::new(MemoryKv::new());
        kv.set("counter", "3").unwrap();
        assert_eq!(kv.get("counter").unwrap().as_deref(), Some("3"));
    }

    #[test]
    fn test_validate_key() {
        assert!(validate_key("tasks").is_ok());
        assert!(validate_key("todoApp_counter").is_ok());
        assert!(validate_key("my-list").is_ok());
        assert!(validate_key("").is_err());
        assert!(validate_key("../etc").is_err());
        assert!(validate_key("a b").is_err());
        assert!(validate_key(&"k".repeat(65)).is_err());
    }
}
