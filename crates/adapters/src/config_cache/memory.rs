use super::cache_error;
use polychat_ports::ConfigCachePort;
use polychat_shared::Result;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

/// Process-local store; nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryConfigCache {
    entries: Mutex<HashMap<Box<str>, String>>,
}

impl MemoryConfigCache {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    pub fn len(&self) -> Result<usize> {
        Ok(self.lock()?.len())
    }

    /// Returns true when nothing is stored.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.lock()?.is_empty())
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<Box<str>, String>>> {
        self.entries
            .lock()
            .map_err(|_| cache_error("memory cache lock poisoned"))
    }
}

impl ConfigCachePort for MemoryConfigCache {
    fn read(&self, key: &str) -> Result<Option<String>> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> Result<()> {
        self.lock()?.insert(key.into(), value.to_owned());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.lock()?.remove(key);
        Ok(())
    }
}
