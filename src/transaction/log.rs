//! Operation log items.
//!
//! Each lock-taking step records a log item with its sub-transaction.
//! The item knows how to carry its lock through the four phases:
//! sub-transaction commit surrenders the lock to the parent
//! transaction, transaction commit makes the effect permanent, and
//! the rollback phases undo it.

use std::sync::Arc;

use crate::container::{Container, ContainerManager};
use crate::isolation::{IsolationManager, LockKind};
use crate::model::{ContainerId, EntryId, EntryRef, SubTransactionId, TransactionId};

/// Replay class of a log item; classes are replayed in a fixed order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogClass {
    Insert,
    Read,
    Delete,
    Lock,
    Other,
}

#[derive(Clone)]
struct EntryLog {
    /// `None` marks a container access that locked nothing.
    entry: Option<EntryRef>,
    container: Arc<Container>,
    isolation: Arc<IsolationManager>,
    tx: TransactionId,
    stx: SubTransactionId,
}

#[derive(Clone)]
struct ContainerLog {
    container: ContainerId,
    manager: Arc<ContainerManager>,
    isolation: Arc<IsolationManager>,
    tx: TransactionId,
    stx: SubTransactionId,
}

/// One recorded operation step.
#[derive(Clone)]
pub enum LogItem {
    Write(EntryLogData),
    Read(EntryLogData),
    Take(EntryLogData),
    ContainerCreate(ContainerLogData),
    ContainerDestroy(ContainerLogData),
    ContainerLock(ContainerLogData),
}

#[derive(Clone)]
pub struct EntryLogData(EntryLog);

#[derive(Clone)]
pub struct ContainerLogData(ContainerLog);

impl LogItem {
    pub fn write(
        entry: Option<EntryRef>,
        container: Arc<Container>,
        isolation: Arc<IsolationManager>,
        tx: TransactionId,
        stx: SubTransactionId,
    ) -> Self {
        LogItem::Write(EntryLogData(EntryLog {
            entry,
            container,
            isolation,
            tx,
            stx,
        }))
    }

    pub fn read(
        entry: Option<EntryRef>,
        container: Arc<Container>,
        isolation: Arc<IsolationManager>,
        tx: TransactionId,
        stx: SubTransactionId,
    ) -> Self {
        LogItem::Read(EntryLogData(EntryLog {
            entry,
            container,
            isolation,
            tx,
            stx,
        }))
    }

    pub fn take(
        entry: Option<EntryRef>,
        container: Arc<Container>,
        isolation: Arc<IsolationManager>,
        tx: TransactionId,
        stx: SubTransactionId,
    ) -> Self {
        LogItem::Take(EntryLogData(EntryLog {
            entry,
            container,
            isolation,
            tx,
            stx,
        }))
    }

    pub fn container_create(
        container: ContainerId,
        manager: Arc<ContainerManager>,
        isolation: Arc<IsolationManager>,
        tx: TransactionId,
        stx: SubTransactionId,
    ) -> Self {
        LogItem::ContainerCreate(ContainerLogData(ContainerLog {
            container,
            manager,
            isolation,
            tx,
            stx,
        }))
    }

    pub fn container_destroy(
        container: ContainerId,
        manager: Arc<ContainerManager>,
        isolation: Arc<IsolationManager>,
        tx: TransactionId,
        stx: SubTransactionId,
    ) -> Self {
        LogItem::ContainerDestroy(ContainerLogData(ContainerLog {
            container,
            manager,
            isolation,
            tx,
            stx,
        }))
    }

    pub fn container_lock(
        container: ContainerId,
        manager: Arc<ContainerManager>,
        isolation: Arc<IsolationManager>,
        tx: TransactionId,
        stx: SubTransactionId,
    ) -> Self {
        LogItem::ContainerLock(ContainerLogData(ContainerLog {
            container,
            manager,
            isolation,
            tx,
            stx,
        }))
    }

    /// The class whose replay order this item follows. Container
    /// creation replays last so entry removals see the container,
    /// container destruction replays with the deletes for the same
    /// reason.
    pub fn class(&self) -> LogClass {
        match self {
            LogItem::Write(_) => LogClass::Insert,
            LogItem::Read(_) => LogClass::Read,
            LogItem::Take(_) | LogItem::ContainerDestroy(_) => LogClass::Delete,
            LogItem::ContainerLock(_) => LogClass::Lock,
            LogItem::ContainerCreate(_) => LogClass::Other,
        }
    }

    /// The entry this item guards, if any.
    pub fn entry_id(&self) -> Option<EntryId> {
        match self {
            LogItem::Write(data) | LogItem::Read(data) | LogItem::Take(data) => {
                data.0.entry.as_ref().map(|e| e.id())
            }
            _ => None,
        }
    }

    /// The container this item touched.
    pub fn container_id(&self) -> ContainerId {
        match self {
            LogItem::Write(data) | LogItem::Read(data) | LogItem::Take(data) => data.0.container.id(),
            LogItem::ContainerCreate(data) | LogItem::ContainerDestroy(data) | LogItem::ContainerLock(data) => {
                data.0.container
            }
        }
    }

    /// Sub-transaction commit: surrender locks to the parent transaction.
    pub fn commit_sub_transaction(&self) {
        match self {
            LogItem::Write(data) => data.surrender(LockKind::Insert),
            LogItem::Read(data) => data.surrender(LockKind::Read),
            LogItem::Take(data) => data.surrender(LockKind::Delete),
            LogItem::ContainerCreate(data) => data.surrender(LockKind::Insert),
            LogItem::ContainerDestroy(data) => data.surrender(LockKind::Delete),
            LogItem::ContainerLock(data) => data.surrender(LockKind::Exclusive),
        }
    }

    /// Transaction commit: make the effect permanent.
    pub fn commit_transaction(&self) {
        match self {
            LogItem::Write(data) => data.release(LockKind::Insert),
            LogItem::Read(data) => data.release(LockKind::Read),
            LogItem::Take(data) => data.purge(),
            LogItem::ContainerCreate(data) => data.release(LockKind::Insert),
            LogItem::ContainerDestroy(data) => data.purge(),
            LogItem::ContainerLock(data) => data.release(LockKind::Exclusive),
        }
    }

    /// Sub-transaction rollback: undo the step, locks included.
    pub fn rollback_sub_transaction(&self) {
        match self {
            LogItem::Write(data) => data.purge(),
            LogItem::Read(data) => data.release_in_sub_transaction(LockKind::Read),
            LogItem::Take(data) => data.release_in_sub_transaction(LockKind::Delete),
            LogItem::ContainerCreate(data) => data.purge(),
            LogItem::ContainerDestroy(data) => data.release_in_sub_transaction(LockKind::Delete),
            LogItem::ContainerLock(data) => data.release_in_sub_transaction(LockKind::Exclusive),
        }
    }

    /// Transaction rollback: undo a step whose sub-transaction already
    /// committed.
    pub fn rollback_transaction(&self) {
        match self {
            LogItem::Write(data) => data.purge(),
            LogItem::Read(data) => data.release(LockKind::Read),
            LogItem::Take(data) => data.release(LockKind::Delete),
            LogItem::ContainerCreate(data) => data.purge(),
            LogItem::ContainerDestroy(data) => data.release(LockKind::Delete),
            LogItem::ContainerLock(data) => data.release(LockKind::Exclusive),
        }
    }
}

impl EntryLogData {
    fn surrender(&self, kind: LockKind) {
        if let Some(entry) = &self.0.entry {
            self.0.isolation.surrender_entry_lock(kind, entry.id(), self.0.stx);
        }
    }

    /// Release surrendered to the transaction.
    fn release(&self, kind: LockKind) {
        if let Some(entry) = &self.0.entry {
            self.0.isolation.release_entry_lock(kind, entry.id(), self.0.tx, None);
        }
    }

    /// Release still held by the sub-transaction.
    fn release_in_sub_transaction(&self, kind: LockKind) {
        if let Some(entry) = &self.0.entry {
            self.0
                .isolation
                .release_entry_lock(kind, entry.id(), self.0.tx, Some(self.0.stx));
        }
    }

    /// Remove the entry and its lock word for good.
    fn purge(&self) {
        if let Some(entry) = &self.0.entry {
            self.0.container.purge_entry(entry);
            self.0.isolation.purge_entry_lock(entry.id());
        }
    }
}

impl ContainerLogData {
    fn surrender(&self, kind: LockKind) {
        self.0.isolation.surrender_container_lock(kind, self.0.container, self.0.stx);
    }

    fn release(&self, kind: LockKind) {
        self.0
            .isolation
            .release_container_lock(kind, self.0.container, self.0.tx, None);
    }

    fn release_in_sub_transaction(&self, kind: LockKind) {
        self.0
            .isolation
            .release_container_lock(kind, self.0.container, self.0.tx, Some(self.0.stx));
    }

    fn purge(&self) {
        self.0.manager.purge_container(self.0.container);
        self.0.isolation.purge_container_lock(self.0.container);
    }
}
