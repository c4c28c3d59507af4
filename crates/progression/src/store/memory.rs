use std::collections::BTreeMap;

use serde_json::Value;

use super::{Store, StoreError};

/// In-process store. Reads and writes can be made to fail so the degraded
/// storage path can be exercised.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    entries: BTreeMap<String, Value>,
    fail_reads: bool,
    fail_writes: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_reads(&mut self, fail: bool) {
        self.fail_reads = fail;
    }

    pub fn set_fail_writes(&mut self, fail: bool) {
        self.fail_writes = fail;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn check_write(&self, key: &str, operation: &'static str) -> Result<(), StoreError> {
        if self.fail_writes {
            return Err(StoreError::Unavailable {
                key: key.to_string(),
                operation,
            });
        }
        Ok(())
    }
}

impl Store for MemoryStore {
    fn load(&self, key: &str) -> Result<Option<Value>, StoreError> {
        if self.fail_reads {
            return Err(StoreError::Unavailable {
                key: key.to_string(),
                operation: "load",
            });
        }
        Ok(self.entries.get(key).cloned())
    }

    fn save(&mut self, key: &str, value: &Value) -> Result<(), StoreError> {
        self.check_write(key, "save")?;
        self.entries.insert(key.to_string(), value.clone());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        self.check_write(key, "remove")?;
        self.entries.remove(key);
        Ok(())
    }

    fn clear(&mut self) -> Result<(), StoreError> {
        self.check_write("*", "clear")?;
        self.entries.clear();
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StoreError> {
        if self.fail_reads {
            return Err(StoreError::Unavailable {
                key: "*".to_string(),
                operation: "keys",
            });
        }
        Ok(self.entries.keys().cloned().collect())
    }
}
