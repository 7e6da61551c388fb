//! Isolation errors.

use thiserror::Error;

use crate::model::{ContainerId, EntryId};

// ============================================================
// Isolation Errors
// ============================================================

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IsolationError {
    /// The entry has no lock word, so it was purged or never existed.
    #[error("entry {0} is not valid")]
    InvalidEntry(EntryId),

    /// The container has no lock word.
    #[error("container {0} is not valid")]
    InvalidContainer(ContainerId),

    /// A fresh lock word was requested for an object that already has one.
    #[error("a lock already exists for this object")]
    LockExists,
}
