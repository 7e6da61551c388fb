//! Per-object lock words.

use crate::isolation::{Availability, LockHolder};
use crate::model::{SubTransactionId, TransactionId};

/// The lock modes an operation can take.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockKind {
    /// Taken when the object is created; only fresh lock words carry it.
    Insert,
    /// Shared lock blocking concurrent deletes.
    Read,
    /// Taken when the object is removed.
    Delete,
    /// Blocks everything, used for explicit container locks.
    Exclusive,
}

/// Result of trying to add a lock to a lock word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockAttempt {
    Added,
    /// An incompatible holder is in the way.
    Blocked(LockHolder),
}

/// The lock word of one entry or container.
///
/// Insert, delete and exclusive are single-holder; read is shared.
/// A cleared word (no holders) belongs to a committed object.
#[derive(Debug, Default, Clone)]
pub struct LockState {
    insert: Option<LockHolder>,
    delete: Option<LockHolder>,
    exclusive: Option<LockHolder>,
    read: Vec<LockHolder>,
}

impl LockState {
    /// Fresh lock word for a just-created object, insert-locked by its
    /// creator.
    pub fn fresh(tx: TransactionId, stx: SubTransactionId) -> Self {
        LockState {
            insert: Some(LockHolder::new(tx, stx)),
            ..LockState::default()
        }
    }

    #[inline]
    pub fn insert_holder(&self) -> Option<LockHolder> {
        self.insert
    }

    #[inline]
    pub fn delete_holder(&self) -> Option<LockHolder> {
        self.delete
    }

    #[inline]
    pub fn exclusive_holder(&self) -> Option<LockHolder> {
        self.exclusive
    }

    #[inline]
    pub fn read_holders(&self) -> &[LockHolder] {
        &self.read
    }

    fn blocking(holder: Option<LockHolder>, tx: TransactionId, stx: SubTransactionId) -> Option<LockHolder> {
        match holder {
            Some(h) if !h.passes(tx, stx) => Some(h),
            _ => None,
        }
    }

    /// First read holder the requester does not pass.
    pub fn blocking_reader(&self, tx: TransactionId, stx: SubTransactionId) -> Option<LockHolder> {
        self.read.iter().copied().find(|h| !h.passes(tx, stx))
    }

    /// Tries to add a lock of the given kind for the requester.
    ///
    /// Insert locks exist only on fresh lock words, so `add_lock`
    /// never grants one.
    pub fn add_lock(&mut self, kind: LockKind, tx: TransactionId, stx: SubTransactionId) -> LockAttempt {
        let holder = LockHolder::new(tx, stx);
        match kind {
            LockKind::Insert => {
                // Insert locks are created with LockState::fresh only.
                LockAttempt::Blocked(self.insert.unwrap_or(holder))
            }
            LockKind::Read => {
                for existing in [self.exclusive, self.delete, self.insert] {
                    if let Some(blocked) = Self::blocking(existing, tx, stx) {
                        return LockAttempt::Blocked(blocked);
                    }
                }
                if !self.read.contains(&holder) {
                    self.read.push(holder);
                }
                LockAttempt::Added
            }
            LockKind::Delete => {
                for existing in [self.exclusive, self.delete, self.insert] {
                    if let Some(blocked) = Self::blocking(existing, tx, stx) {
                        return LockAttempt::Blocked(blocked);
                    }
                }
                if let Some(blocked) = self.blocking_reader(tx, stx) {
                    return LockAttempt::Blocked(blocked);
                }
                self.delete = Some(holder);
                LockAttempt::Added
            }
            LockKind::Exclusive => {
                for existing in [self.exclusive, self.delete, self.insert] {
                    if let Some(blocked) = Self::blocking(existing, tx, stx) {
                        return LockAttempt::Blocked(blocked);
                    }
                }
                if let Some(blocked) = self.blocking_reader(tx, stx) {
                    return LockAttempt::Blocked(blocked);
                }
                self.exclusive = Some(holder);
                LockAttempt::Added
            }
        }
    }

    /// Surrenders a lock from its sub-transaction to the parent
    /// transaction. A holder that does not match is left alone.
    pub fn surrender(&mut self, kind: LockKind, stx: SubTransactionId) {
        let surrender_one = |holder: &mut Option<LockHolder>| {
            if let Some(h) = holder {
                if h.stx == Some(stx) {
                    h.stx = None;
                }
            }
        };
        match kind {
            LockKind::Insert => surrender_one(&mut self.insert),
            LockKind::Delete => surrender_one(&mut self.delete),
            LockKind::Exclusive => surrender_one(&mut self.exclusive),
            LockKind::Read => {
                for h in &mut self.read {
                    if h.stx == Some(stx) {
                        h.stx = None;
                    }
                }
            }
        }
    }

    /// Releases a lock held by `tx`. With `stx` given, only a lock
    /// still held by that sub-transaction is released; without it,
    /// only a lock already surrendered to the transaction. A mismatch
    /// is ignored, the lock has been released or purged before.
    pub fn release(&mut self, kind: LockKind, tx: TransactionId, stx: Option<SubTransactionId>) {
        let matches = |h: &LockHolder| match stx {
            Some(stx) => h.stx == Some(stx),
            None => h.tx == tx && h.stx.is_none(),
        };
        let release_one = |holder: &mut Option<LockHolder>| {
            if holder.as_ref().is_some_and(&matches) {
                *holder = None;
            }
        };
        match kind {
            LockKind::Insert => release_one(&mut self.insert),
            LockKind::Delete => release_one(&mut self.delete),
            LockKind::Exclusive => release_one(&mut self.exclusive),
            LockKind::Read => self.read.retain(|h| !matches(h)),
        }
    }

    /// Whether no holder is active.
    pub fn is_clear(&self) -> bool {
        self.insert.is_none() && self.delete.is_none() && self.exclusive.is_none() && self.read.is_empty()
    }

    /// Visibility of the guarded object for a reader.
    pub fn read_availability(
        &self,
        tx: TransactionId,
        stx: SubTransactionId,
        repeatable_read: bool,
    ) -> Availability {
        if let Some(delete) = self.delete {
            if delete.passes(tx, stx) {
                return Availability::NotVisible(Some(delete));
            }
            if !repeatable_read && delete.tx == tx {
                // Another sub-transaction of the same transaction is
                // deleting; until it commits the entry stays readable.
                return Availability::Available;
            }
            // A pending delete by another transaction blocks the read,
            // except when the entry was never visible in the first
            // place.
            if let Some(insert) = self.insert {
                if !insert.passes(tx, stx) {
                    return Availability::NotVisible(Some(insert));
                }
            }
            return Availability::NotAvailable(Some(delete));
        }
        if let Some(insert) = self.insert {
            if insert.passes(tx, stx) {
                return Availability::Available;
            }
            return Availability::NotVisible(Some(insert));
        }
        Availability::Available
    }

    /// Visibility of the guarded object for a taker.
    pub fn take_availability(&self, tx: TransactionId, stx: SubTransactionId) -> Availability {
        if let Some(insert) = self.insert {
            if !insert.passes(tx, stx) {
                return Availability::NotVisible(Some(insert));
            }
        }
        if let Some(delete) = self.delete {
            if delete.passes(tx, stx) {
                return Availability::NotVisible(Some(delete));
            }
            return Availability::NotAvailable(Some(delete));
        }
        if let Some(reader) = self.blocking_reader(tx, stx) {
            return Availability::NotAvailable(Some(reader));
        }
        Availability::Available
    }
}
