//! Coordination and selection errors.

use thiserror::Error;

use crate::isolation::LockHolder;

// ============================================================
// Registration Errors
// ============================================================

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoordinationError {
    /// A key coordinator already holds a living entry under this key.
    #[error("key '{0}' is already bound")]
    DuplicateKey(String),

    /// Another sub-transaction is restructuring the coordinator.
    #[error("coordinator is locked by another sub-transaction")]
    CoordinatorLocked,

    /// The coordination parameter does not fit the coordinator.
    #[error("invalid coordination data: {0}")]
    InvalidCoordinationData(String),

    /// No coordinator with this name exists at the container.
    #[error("coordinator '{0}' is not registered at the container")]
    CoordinatorNotRegistered(String),

    /// An obligatory coordinator got no coordination data and cannot
    /// synthesize a default.
    #[error("obligatory coordinator '{0}' got no coordination data")]
    ObligatoryCoordinatorMissing(String),

    /// A vector index beyond the current length.
    #[error("index {index} is out of bounds, length is {len}")]
    IndexOutOfBounds { index: usize, len: usize },

    /// A query predicate that cannot be built, for example a bad
    /// regular expression.
    #[error("invalid query: {0}")]
    InvalidQuery(String),
}

// ============================================================
// Selection Errors
// ============================================================

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SelectionError {
    /// Fewer entries matched than the count demands; waiting may help.
    #[error("count not met: {actual} of {expected} entries matched")]
    CountNotMet { actual: usize, expected: usize },

    /// A needed entry is locked by another transaction.
    #[error("a selected entry is locked")]
    EntryLocked(Option<LockHolder>),

    /// A needed entry is not permitted for the requester.
    #[error("access to a selected entry is denied")]
    AccessDenied,

    /// The selector does not fit the coordinator it addresses.
    #[error("invalid selector: {0}")]
    InvalidSelector(String),

    /// The selector names a coordinator the container does not have.
    #[error("coordinator '{0}' is not registered at the container")]
    CoordinatorNotRegistered(String),
}
