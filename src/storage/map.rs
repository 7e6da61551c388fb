//! Stored maps.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Mutex, RwLock};

/// A named key-value map owned by the storage layer.
///
/// Coordinators and containers keep all durable state behind this
/// interface so a persistent profile can be swapped in without
/// touching selection logic.
pub trait StoredMap<K, V>: Send + Sync
where
    K: Eq + Hash + Clone + Send + Sync,
    V: Clone + Send + Sync,
{
    fn get(&self, key: &K) -> Option<V>;

    fn put(&self, key: K, value: V);

    fn remove(&self, key: &K) -> Option<V>;

    fn contains_key(&self, key: &K) -> bool {
        self.get(key).is_some()
    }

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn keys(&self) -> Vec<K>;

    fn clear(&self);
}

/// In-memory stored map backed by a hash map.
#[derive(Debug)]
pub struct InMemoryStoredMap<K, V> {
    inner: RwLock<HashMap<K, V>>,
}

impl<K, V> InMemoryStoredMap<K, V>
where
    K: Eq + Hash + Clone + Send + Sync,
    V: Clone + Send + Sync,
{
    pub fn new() -> Self {
        InMemoryStoredMap {
            inner: RwLock::new(HashMap::new()),
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<K, V>> {
        match self.inner.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<K, V>> {
        match self.inner.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl<K, V> Default for InMemoryStoredMap<K, V>
where
    K: Eq + Hash + Clone + Send + Sync,
    V: Clone + Send + Sync,
{
    fn default() -> Self {
        InMemoryStoredMap::new()
    }
}

impl<K, V> StoredMap<K, V> for InMemoryStoredMap<K, V>
where
    K: Eq + Hash + Clone + Send + Sync,
    V: Clone + Send + Sync,
{
    fn get(&self, key: &K) -> Option<V> {
        self.read().get(key).cloned()
    }

    fn put(&self, key: K, value: V) {
        self.write().insert(key, value);
    }

    fn remove(&self, key: &K) -> Option<V> {
        self.write().remove(key)
    }

    fn contains_key(&self, key: &K) -> bool {
        self.read().contains_key(key)
    }

    fn len(&self) -> usize {
        self.read().len()
    }

    fn keys(&self) -> Vec<K> {
        self.read().keys().cloned().collect()
    }

    fn clear(&self) {
        self.write().clear();
    }
}

/// Hands out named maps and tracks which names are in use.
///
/// Map names must be unique so a later persistent profile can address
/// each map on disk.
#[derive(Debug, Default)]
pub struct StorageContext {
    names: Mutex<Vec<String>>,
}

impl StorageContext {
    pub fn new() -> Self {
        StorageContext::default()
    }

    /// Creates a fresh named map. Reusing a name is a caller bug and
    /// gets a fresh map anyway in the in-memory profile.
    pub fn create_map<K, V>(&self, name: &str) -> InMemoryStoredMap<K, V>
    where
        K: Eq + Hash + Clone + Send + Sync,
        V: Clone + Send + Sync,
    {
        let mut names = match self.names.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        names.push(name.to_string());
        InMemoryStoredMap::new()
    }

    /// Names of all maps created through this context.
    pub fn map_names(&self) -> Vec<String> {
        match self.names.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}
