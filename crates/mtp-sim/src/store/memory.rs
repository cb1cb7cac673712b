// crates/mtp-sim/src/store/memory.rs

use super::{OverrideEntry, OverrideStore};
use crate::error::StoreError;
use crate::identity::CanonicalKey;
use std::collections::HashMap;
use std::sync::RwLock;

/// A non-durable override store for tests and throwaway runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<CanonicalKey, OverrideEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Inserts a prepared entry, honouring last-write-wins against the stored one.
    pub fn insert_entry(&self, entry: OverrideEntry) -> Result<(), StoreError> {
        let mut entries = self.entries.write().map_err(|_| StoreError::Poisoned)?;
        match entries.get(&entry.key) {
            Some(existing) if !entry.supersedes(existing) => {}
            _ => {
                entries.insert(entry.key.clone(), entry);
            }
        }
        Ok(())
    }
}

impl OverrideStore for MemoryStore {
    fn upsert(&self, key: &CanonicalKey, value: &str) -> Result<(), StoreError> {
        self.insert_entry(OverrideEntry::new(key.clone(), value))
    }

    fn entry(&self, key: &CanonicalKey) -> Result<Option<OverrideEntry>, StoreError> {
        let entries = self.entries.read().map_err(|_| StoreError::Poisoned)?;
        Ok(entries.get(key).cloned())
    }
}
