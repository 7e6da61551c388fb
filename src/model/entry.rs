//! Entry handles and payload values.
//!
//! An entry's payload is stored once, in the owning container's payload
//! store. Everything else in the engine works with `EntryRef`, a cheap
//! shared handle that carries the identity, the owning container and
//! the payload type name.

use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::model::{ContainerId, EntryId};

/// Shared, cheaply clonable handle to a stored entry.
pub type EntryRef = Arc<EntryHandle>;

/// Handle to an entry in a container.
///
/// Equality and hashing use the entry id alone; the remaining fields
/// are denormalized lookups that are fixed for the entry's lifetime.
#[derive(Debug, Clone)]
pub struct EntryHandle {
    id: EntryId,
    container: ContainerId,
    type_name: String,
}

impl EntryHandle {
    pub fn new(id: EntryId, container: ContainerId, type_name: impl Into<String>) -> Self {
        EntryHandle {
            id,
            container,
            type_name: type_name.into(),
        }
    }

    #[inline]
    pub fn id(&self) -> EntryId {
        self.id
    }

    /// The container the entry was written into.
    #[inline]
    pub fn container(&self) -> ContainerId {
        self.container
    }

    /// The declared type of the payload, used by type-aware selection.
    #[inline]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }
}

impl PartialEq for EntryHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for EntryHandle {}

impl Hash for EntryHandle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// The payload of an entry: a declared type name plus structured fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryValue {
    type_name: String,
    fields: serde_json::Value,
}

impl EntryValue {
    pub fn new(type_name: impl Into<String>, fields: serde_json::Value) -> Self {
        EntryValue {
            type_name: type_name.into(),
            fields,
        }
    }

    #[inline]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    #[inline]
    pub fn fields(&self) -> &serde_json::Value {
        &self.fields
    }

    /// Looks up a field by dotted path, `None` when any segment is missing.
    pub fn field(&self, path: &str) -> Option<&serde_json::Value> {
        let mut current = &self.fields;
        for segment in path.split('.') {
            current = current.get(segment)?;
        }
        Some(current)
    }
}

/// Monotonic source of entry identities.
///
/// A single allocator is injected into every container so entry ids
/// stay unique across the whole space.
#[derive(Debug)]
pub struct EntryIdAllocator {
    next: AtomicU64,
}

impl EntryIdAllocator {
    pub fn new() -> Self {
        EntryIdAllocator {
            next: AtomicU64::new(1),
        }
    }

    pub fn allocate(&self) -> EntryId {
        EntryId::new(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for EntryIdAllocator {
    fn default() -> Self {
        EntryIdAllocator::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn handles_compare_by_id_only() {
        let a = EntryHandle::new(EntryId::new(1), ContainerId::new(1), "Order");
        let b = EntryHandle::new(EntryId::new(1), ContainerId::new(2), "Invoice");
        assert_eq!(a, b);
    }

    #[test]
    fn field_lookup_follows_dotted_paths() {
        let value = EntryValue::new("Order", json!({ "customer": { "name": "ada" } }));
        assert_eq!(value.field("customer.name"), Some(&json!("ada")));
        assert_eq!(value.field("customer.missing"), None);
    }

    #[test]
    fn allocator_never_repeats() {
        let allocator = EntryIdAllocator::new();
        let first = allocator.allocate();
        let second = allocator.allocate();
        assert_ne!(first, second);
    }
}
