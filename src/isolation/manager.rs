//! Lock tables.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use crate::isolation::locks::LockAttempt;
use crate::isolation::{Availability, IsolationError, LockHolder, LockKind, LockState};
use crate::model::{ContainerId, EntryId, IsolationLevel, OperationType, SubTransactionId, TransactionId};

/// Result of trying to acquire a lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockOutcome {
    /// The lock was taken; the caller records a log item for it.
    Acquired,
    /// No lock was needed; nothing to log.
    Skipped,
    /// An incompatible holder is in the way.
    Conflict(Option<LockHolder>),
}

/// The container-level lock an operation takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerLockKind {
    Create,
    Destroy,
    Lock,
}

type LockTable<K> = RwLock<HashMap<K, Arc<Mutex<LockState>>>>;

/// Lock tables for entries and containers.
///
/// A lock word stays in the table as long as its object exists; a
/// committed object has a cleared word. A missing word means the
/// object was purged, so availability checks report it as not visible.
#[derive(Debug, Default)]
pub struct IsolationManager {
    entry_locks: LockTable<EntryId>,
    container_locks: LockTable<ContainerId>,
}

fn table_get<K: std::hash::Hash + Eq>(table: &LockTable<K>, key: &K) -> Option<Arc<Mutex<LockState>>> {
    let guard = match table.read() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    guard.get(key).cloned()
}

fn table_insert_fresh<K: std::hash::Hash + Eq + Copy>(
    table: &LockTable<K>,
    key: K,
    tx: TransactionId,
    stx: SubTransactionId,
) -> Result<(), IsolationError> {
    let mut guard = match table.write() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    if guard.contains_key(&key) {
        return Err(IsolationError::LockExists);
    }
    guard.insert(key, Arc::new(Mutex::new(LockState::fresh(tx, stx))));
    Ok(())
}

fn table_remove<K: std::hash::Hash + Eq>(table: &LockTable<K>, key: &K) {
    let mut guard = match table.write() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    guard.remove(key);
}

fn word(lock: &Arc<Mutex<LockState>>) -> MutexGuard<'_, LockState> {
    match lock.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl IsolationManager {
    pub fn new() -> Self {
        IsolationManager::default()
    }

    // ------------------------------------------------------------
    // Entry locks
    // ------------------------------------------------------------

    /// Takes the lock an operation needs on an entry.
    ///
    /// Writes get a fresh insert-locked word, takes add a delete lock,
    /// reads add a shared lock only under repeatable read.
    pub fn acquire_entry_lock(
        &self,
        op: OperationType,
        entry: EntryId,
        tx: TransactionId,
        stx: SubTransactionId,
        level: IsolationLevel,
    ) -> Result<LockOutcome, IsolationError> {
        match op {
            OperationType::Write => {
                table_insert_fresh(&self.entry_locks, entry, tx, stx)?;
                Ok(LockOutcome::Acquired)
            }
            OperationType::Take => {
                let lock = table_get(&self.entry_locks, &entry)
                    .ok_or(IsolationError::InvalidEntry(entry))?;
                let mut word = word(&lock);
                match word.add_lock(LockKind::Delete, tx, stx) {
                    LockAttempt::Added => Ok(LockOutcome::Acquired),
                    LockAttempt::Blocked(holder) => Ok(LockOutcome::Conflict(Some(holder))),
                }
            }
            OperationType::Read => {
                if level == IsolationLevel::ReadCommitted {
                    return Ok(LockOutcome::Skipped);
                }
                let lock = table_get(&self.entry_locks, &entry)
                    .ok_or(IsolationError::InvalidEntry(entry))?;
                let mut word = word(&lock);
                match word.add_lock(LockKind::Read, tx, stx) {
                    LockAttempt::Added => Ok(LockOutcome::Acquired),
                    LockAttempt::Blocked(holder) => Ok(LockOutcome::Conflict(Some(holder))),
                }
            }
        }
    }

    /// Visibility of an entry for the given operation and isolation
    /// level. An entry without a lock word was purged and is not
    /// visible.
    pub fn check_entry_availability(
        &self,
        entry: EntryId,
        tx: TransactionId,
        stx: SubTransactionId,
        op: OperationType,
        level: IsolationLevel,
    ) -> Availability {
        let Some(lock) = table_get(&self.entry_locks, &entry) else {
            return Availability::NotVisible(None);
        };
        let word = word(&lock);
        match op {
            OperationType::Take => word.take_availability(tx, stx),
            OperationType::Read | OperationType::Write => {
                word.read_availability(tx, stx, level == IsolationLevel::RepeatableRead)
            }
        }
    }

    pub fn release_entry_lock(
        &self,
        kind: LockKind,
        entry: EntryId,
        tx: TransactionId,
        stx: Option<SubTransactionId>,
    ) {
        if let Some(lock) = table_get(&self.entry_locks, &entry) {
            word(&lock).release(kind, tx, stx);
        }
    }

    pub fn surrender_entry_lock(&self, kind: LockKind, entry: EntryId, stx: SubTransactionId) {
        if let Some(lock) = table_get(&self.entry_locks, &entry) {
            word(&lock).surrender(kind, stx);
        }
    }

    /// Drops an entry's lock word entirely.
    pub fn purge_entry_lock(&self, entry: EntryId) {
        table_remove(&self.entry_locks, &entry);
    }

    /// Whether a delete-locked entry may be overwritten in place by a
    /// freshly written one: the same transaction holds both locks and
    /// the delete is surrendered or held by the writer's
    /// sub-transaction.
    pub fn check_valid_entry_overwrite(&self, base: EntryId, overwrite: EntryId) -> bool {
        let Some(base_lock) = table_get(&self.entry_locks, &base) else {
            return false;
        };
        let Some(over_lock) = table_get(&self.entry_locks, &overwrite) else {
            return false;
        };
        let base_delete = word(&base_lock).delete_holder();
        let over_insert = word(&over_lock).insert_holder();
        match (base_delete, over_insert) {
            (Some(delete), Some(insert)) => {
                delete.tx == insert.tx && (delete.stx.is_none() || delete.stx == insert.stx)
            }
            _ => false,
        }
    }

    // ------------------------------------------------------------
    // Container locks
    // ------------------------------------------------------------

    pub fn acquire_container_lock(
        &self,
        kind: ContainerLockKind,
        container: ContainerId,
        tx: TransactionId,
        stx: SubTransactionId,
    ) -> Result<LockOutcome, IsolationError> {
        match kind {
            ContainerLockKind::Create => {
                table_insert_fresh(&self.container_locks, container, tx, stx)?;
                Ok(LockOutcome::Acquired)
            }
            ContainerLockKind::Destroy | ContainerLockKind::Lock => {
                let lock = table_get(&self.container_locks, &container)
                    .ok_or(IsolationError::InvalidContainer(container))?;
                let lock_kind = match kind {
                    ContainerLockKind::Destroy => LockKind::Delete,
                    _ => LockKind::Exclusive,
                };
                let mut word = word(&lock);
                match word.add_lock(lock_kind, tx, stx) {
                    LockAttempt::Added => Ok(LockOutcome::Acquired),
                    LockAttempt::Blocked(holder) => Ok(LockOutcome::Conflict(Some(holder))),
                }
            }
        }
    }

    /// Visibility of a container for a requester.
    ///
    /// A pending destroy blocks everyone, a pending create is visible
    /// only inside the creating transaction, an exclusive lock blocks
    /// other transactions.
    pub fn check_container_availability(
        &self,
        container: ContainerId,
        tx: TransactionId,
        stx: SubTransactionId,
    ) -> Availability {
        let Some(lock) = table_get(&self.container_locks, &container) else {
            return Availability::NotVisible(None);
        };
        let word = word(&lock);
        if let Some(delete) = word.delete_holder() {
            return Availability::NotAvailable(Some(delete));
        }
        if let Some(insert) = word.insert_holder() {
            if insert.passes(tx, stx) {
                return Availability::Available;
            }
            return Availability::NotVisible(Some(insert));
        }
        if let Some(exclusive) = word.exclusive_holder() {
            if exclusive.passes(tx, stx) {
                return Availability::Available;
            }
            return Availability::NotAvailable(Some(exclusive));
        }
        Availability::Available
    }

    pub fn release_container_lock(
        &self,
        kind: LockKind,
        container: ContainerId,
        tx: TransactionId,
        stx: Option<SubTransactionId>,
    ) {
        if let Some(lock) = table_get(&self.container_locks, &container) {
            word(&lock).release(kind, tx, stx);
        }
    }

    pub fn surrender_container_lock(&self, kind: LockKind, container: ContainerId, stx: SubTransactionId) {
        if let Some(lock) = table_get(&self.container_locks, &container) {
            word(&lock).surrender(kind, stx);
        }
    }

    pub fn purge_container_lock(&self, container: ContainerId) {
        table_remove(&self.container_locks, &container);
    }
}
