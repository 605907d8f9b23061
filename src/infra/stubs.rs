use std::{
    collections::BTreeMap,
    sync::{Mutex, MutexGuard},
};

use anyhow::Result;

use crate::infra::contracts::KeyValueStore;

/// Process-local store; nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryKeyValueStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryKeyValueStore {
    fn entries(&self) -> MutexGuard<'_, BTreeMap<String, String>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl KeyValueStore for MemoryKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries().insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_round_trips_values() {
        let store = MemoryKeyValueStore::default();
        store.set("chat-token", "abc").expect("set");

        assert_eq!(store.get("chat-token").expect("get"), Some("abc".to_owned()));

        store.remove("chat-token").expect("remove");
        assert_eq!(store.get("chat-token").expect("get"), None);
    }
}
