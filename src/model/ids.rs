//! Identity newtypes.
//!
//! Identities are plain integers wrapped so they cannot be confused
//! with one another. A `SubTransactionId` is unique only together with
//! its parent transaction id.

use std::fmt;

/// Identity of an entry, unique across the whole space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntryId(u64);

impl EntryId {
    /// Creates an entry id from a raw value.
    #[inline]
    pub fn new(value: u64) -> Self {
        EntryId(value)
    }

    /// Returns the raw value.
    #[inline]
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "e{}", self.0)
    }
}

/// Identity of a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ContainerId(u64);

impl ContainerId {
    #[inline]
    pub fn new(value: u64) -> Self {
        ContainerId(value)
    }

    #[inline]
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "c{}", self.0)
    }
}

/// Identity of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TransactionId(u64);

impl TransactionId {
    #[inline]
    pub fn new(value: u64) -> Self {
        TransactionId(value)
    }

    #[inline]
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tx{}", self.0)
    }
}

/// Identity of a sub-transaction: the parent transaction plus a
/// per-transaction sequence number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubTransactionId {
    tx: TransactionId,
    seq: u64,
}

impl SubTransactionId {
    #[inline]
    pub fn new(tx: TransactionId, seq: u64) -> Self {
        SubTransactionId { tx, seq }
    }

    /// The parent transaction id.
    #[inline]
    pub fn transaction(&self) -> TransactionId {
        self.tx
    }

    /// The sequence number within the parent transaction.
    #[inline]
    pub fn sequence(&self) -> u64 {
        self.seq
    }
}

impl fmt::Display for SubTransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.tx, self.seq)
    }
}
