//! Payload store.

use std::sync::Arc;

use crate::model::{EntryId, EntryValue};
use crate::storage::{InMemoryStoredMap, PayloadCache, StorageContext, StoredMap};

/// Stores entry payloads keyed by entry id, with a bounded cache in
/// front of the backing map.
#[derive(Debug)]
pub struct PayloadStore {
    payloads: InMemoryStoredMap<EntryId, Arc<EntryValue>>,
    cache: PayloadCache,
}

impl PayloadStore {
    pub fn new(context: &StorageContext, name: &str, cache_capacity: usize) -> Self {
        PayloadStore {
            payloads: context.create_map(&format!("{}_payloads", name)),
            cache: PayloadCache::new(cache_capacity),
        }
    }

    pub fn put(&self, id: EntryId, value: EntryValue) {
        let value = Arc::new(value);
        self.payloads.put(id, Arc::clone(&value));
        self.cache.insert(id, value);
    }

    pub fn get(&self, id: EntryId) -> Option<Arc<EntryValue>> {
        if let Some(cached) = self.cache.get(id) {
            return Some(cached);
        }
        let value = self.payloads.get(&id)?;
        self.cache.insert(id, Arc::clone(&value));
        Some(value)
    }

    /// Removes the payload and evicts any cached copy.
    pub fn remove(&self, id: EntryId) -> Option<Arc<EntryValue>> {
        self.cache.evict(id);
        self.payloads.remove(&id)
    }

    pub fn len(&self) -> usize {
        self.payloads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payloads.is_empty()
    }

    /// Drops every payload, used when the owning container is disposed.
    pub fn clear(&self) {
        self.cache.clear();
        self.payloads.clear();
    }
}
