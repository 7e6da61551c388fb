//! Bounded payload cache.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::Mutex;

use crate::model::{EntryId, EntryValue};

#[derive(Debug, Default)]
struct CacheState {
    values: HashMap<EntryId, Arc<EntryValue>>,
    order: VecDeque<EntryId>,
}

/// Bounded cache in front of the payload map.
///
/// Insertion-ordered eviction when full; entries are also evicted
/// explicitly when their payload is deleted, so the cache never serves
/// a payload for an entry that no longer exists.
#[derive(Debug)]
pub struct PayloadCache {
    capacity: usize,
    state: Mutex<CacheState>,
}

impl PayloadCache {
    pub fn new(capacity: usize) -> Self {
        PayloadCache {
            capacity,
            state: Mutex::new(CacheState::default()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CacheState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn get(&self, id: EntryId) -> Option<Arc<EntryValue>> {
        self.lock().values.get(&id).cloned()
    }

    pub fn insert(&self, id: EntryId, value: Arc<EntryValue>) {
        if self.capacity == 0 {
            return;
        }
        let mut state = self.lock();
        if state.values.insert(id, value).is_none() {
            state.order.push_back(id);
        }
        while state.values.len() > self.capacity {
            match state.order.pop_front() {
                Some(oldest) => {
                    state.values.remove(&oldest);
                }
                None => break,
            }
        }
    }

    /// Drops the cached payload for one entry.
    pub fn evict(&self, id: EntryId) {
        let mut state = self.lock();
        if state.values.remove(&id).is_some() {
            state.order.retain(|cached| *cached != id);
        }
    }

    pub fn clear(&self) {
        let mut state = self.lock();
        state.values.clear();
        state.order.clear();
    }

    pub fn len(&self) -> usize {
        self.lock().values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn value(n: u64) -> Arc<EntryValue> {
        Arc::new(EntryValue::new("T", json!({ "n": n })))
    }

    #[test]
    fn oldest_entry_is_evicted_when_full() {
        let cache = PayloadCache::new(2);
        cache.insert(EntryId::new(1), value(1));
        cache.insert(EntryId::new(2), value(2));
        cache.insert(EntryId::new(3), value(3));

        assert!(cache.get(EntryId::new(1)).is_none());
        assert!(cache.get(EntryId::new(2)).is_some());
        assert!(cache.get(EntryId::new(3)).is_some());
    }

    #[test]
    fn explicit_eviction_removes_the_entry() {
        let cache = PayloadCache::new(4);
        cache.insert(EntryId::new(1), value(1));
        cache.evict(EntryId::new(1));
        assert!(cache.get(EntryId::new(1)).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn zero_capacity_caches_nothing() {
        let cache = PayloadCache::new(0);
        cache.insert(EntryId::new(1), value(1));
        assert!(cache.get(EntryId::new(1)).is_none());
    }
}
