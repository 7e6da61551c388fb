//! Engine Vocabulary Types
//!
//! This module provides:
//! - `EntryId` / `ContainerId` / `TransactionId` / `SubTransactionId` - identities
//! - `EntryIdAllocator` - injected monotonic entry identity source
//! - `EntryHandle` / `EntryRef` - cheap clonable entry handles
//! - `EntryValue` - typed entry payloads
//! - `Count` - selection count semantics
//! - `IsolationLevel` / `OperationType` - access qualifiers
//! - `RequestContext` - opaque per-request context

mod context;
mod count;
mod entry;
mod ids;

pub use context::RequestContext;
pub use count::Count;
pub use entry::{EntryHandle, EntryIdAllocator, EntryRef, EntryValue};
pub use ids::{ContainerId, EntryId, SubTransactionId, TransactionId};

use serde::{Deserialize, Serialize};

/// Pessimistic isolation levels supported by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IsolationLevel {
    /// Reads see only committed entries; read locks are not taken.
    ReadCommitted,
    /// Reads additionally take shared locks that block concurrent takes.
    RepeatableRead,
}

/// The kind of entry access an operation performs.
///
/// Availability of an entry depends on the operation that asks for it,
/// so the operation type travels with every visibility check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationType {
    Read,
    Write,
    Take,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn isolation_level_roundtrips_through_serde() {
        let json = serde_json::to_string(&IsolationLevel::RepeatableRead).unwrap();
        let level: IsolationLevel = serde_json::from_str(&json).unwrap();
        assert_eq!(level, IsolationLevel::RepeatableRead);
    }
}
