//! Sub-transactions.

use std::sync::{Arc, Mutex, Weak};

use crate::model::{ContainerId, EntryId, SubTransactionId, TransactionId};
use crate::transaction::tx::Transaction;
use crate::transaction::{LogClass, LogItem, TransactionError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubTransactionStatus {
    Running,
    Committed,
    Aborted,
}

struct StxState {
    status: SubTransactionStatus,
    insert_log: Vec<LogItem>,
    read_log: Vec<LogItem>,
    delete_log: Vec<LogItem>,
    lock_log: Vec<LogItem>,
    other_log: Vec<LogItem>,
}

/// The scope of one operation inside a transaction.
///
/// Collects the operation's log items and replays them when the
/// sub-transaction finishes. Commit surrenders locks to the parent
/// transaction, rollback undoes the operation immediately.
pub struct SubTransaction {
    id: SubTransactionId,
    parent: Weak<Transaction>,
    state: Mutex<StxState>,
}

impl SubTransaction {
    pub(crate) fn new(id: SubTransactionId, parent: Weak<Transaction>) -> Arc<Self> {
        Arc::new(SubTransaction {
            id,
            parent,
            state: Mutex::new(StxState {
                status: SubTransactionStatus::Running,
                insert_log: Vec::new(),
                read_log: Vec::new(),
                delete_log: Vec::new(),
                lock_log: Vec::new(),
                other_log: Vec::new(),
            }),
        })
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, StxState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    #[inline]
    pub fn id(&self) -> SubTransactionId {
        self.id
    }

    #[inline]
    pub fn transaction_id(&self) -> TransactionId {
        self.id.transaction()
    }

    /// The parent transaction, gone once the space drops it.
    pub fn transaction(&self) -> Option<Arc<Transaction>> {
        self.parent.upgrade()
    }

    pub fn status(&self) -> SubTransactionStatus {
        self.lock_state().status
    }

    /// Records a log item under its replay class.
    pub fn add_log(&self, item: LogItem) {
        let mut state = self.lock_state();
        match item.class() {
            LogClass::Insert => state.insert_log.push(item),
            LogClass::Read => state.read_log.push(item),
            LogClass::Delete => state.delete_log.push(item),
            LogClass::Lock => state.lock_log.push(item),
            LogClass::Other => state.other_log.push(item),
        }
    }

    /// Removes the log items recorded for one entry. Used when an
    /// operation fails after taking locks and undoes its own steps.
    pub fn retract_entry_logs(&self, entry: EntryId) {
        let mut state = self.lock_state();
        let state = &mut *state;
        for log in [
            &mut state.insert_log,
            &mut state.read_log,
            &mut state.delete_log,
        ] {
            log.retain(|item| item.entry_id() != Some(entry));
        }
    }

    /// Removes the container-level log items recorded for one
    /// container. Entry items are kept, they retract by entry.
    pub fn retract_container_logs(&self, container: ContainerId) {
        let mut state = self.lock_state();
        let state = &mut *state;
        for log in [
            &mut state.delete_log,
            &mut state.lock_log,
            &mut state.other_log,
        ] {
            log.retain(|item| {
                !matches!(
                    item,
                    LogItem::ContainerCreate(_) | LogItem::ContainerDestroy(_) | LogItem::ContainerLock(_)
                ) || item.container_id() != container
            });
        }
    }

    /// Log items of one replay class, for transaction-level replay.
    pub(crate) fn logs_for(&self, class: LogClass) -> Vec<LogItem> {
        let state = self.lock_state();
        match class {
            LogClass::Insert => state.insert_log.clone(),
            LogClass::Read => state.read_log.clone(),
            LogClass::Delete => state.delete_log.clone(),
            LogClass::Lock => state.lock_log.clone(),
            LogClass::Other => state.other_log.clone(),
        }
    }

    /// Containers this sub-transaction touched, including failed
    /// operations that logged a marker item.
    pub fn accessed_containers(&self) -> Vec<ContainerId> {
        let state = self.lock_state();
        let mut containers = Vec::new();
        for log in [
            &state.insert_log,
            &state.read_log,
            &state.delete_log,
            &state.lock_log,
            &state.other_log,
        ] {
            for item in log.iter() {
                let id = item.container_id();
                if !containers.contains(&id) {
                    containers.push(id);
                }
            }
        }
        containers
    }

    /// Commits the sub-transaction, surrendering its locks to the
    /// parent transaction.
    pub fn commit(&self) -> Result<(), TransactionError> {
        let logs = {
            let mut state = self.lock_state();
            if state.status != SubTransactionStatus::Running {
                return Err(TransactionError::InvalidSubTransaction);
            }
            state.status = SubTransactionStatus::Committed;
            [
                state.insert_log.clone(),
                state.read_log.clone(),
                state.delete_log.clone(),
                state.lock_log.clone(),
                state.other_log.clone(),
            ]
        };
        for log in &logs {
            for item in log {
                item.commit_sub_transaction();
            }
        }
        if let Some(parent) = self.parent.upgrade() {
            parent.sub_transaction_finished();
        }
        Ok(())
    }

    /// Rolls the sub-transaction back, undoing the operation. Deletes
    /// replay first so freed entries are consistent before inserts are
    /// purged.
    pub fn rollback(&self) -> Result<(), TransactionError> {
        let logs = {
            let mut state = self.lock_state();
            if state.status != SubTransactionStatus::Running {
                return Err(TransactionError::InvalidSubTransaction);
            }
            state.status = SubTransactionStatus::Aborted;
            [
                state.delete_log.clone(),
                state.read_log.clone(),
                state.insert_log.clone(),
                state.lock_log.clone(),
                state.other_log.clone(),
            ]
        };
        for log in &logs {
            for item in log {
                item.rollback_sub_transaction();
            }
        }
        if let Some(parent) = self.parent.upgrade() {
            parent.sub_transaction_finished();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn orphan(seq: u64) -> Arc<SubTransaction> {
        SubTransaction::new(
            SubTransactionId::new(TransactionId::new(1), seq),
            Weak::new(),
        )
    }

    #[test]
    fn commit_moves_to_committed_exactly_once() {
        let stx = orphan(1);
        assert_eq!(stx.status(), SubTransactionStatus::Running);
        stx.commit().unwrap();
        assert_eq!(stx.status(), SubTransactionStatus::Committed);
        assert_eq!(stx.commit(), Err(TransactionError::InvalidSubTransaction));
        assert_eq!(stx.rollback(), Err(TransactionError::InvalidSubTransaction));
    }

    #[test]
    fn rollback_moves_to_aborted() {
        let stx = orphan(1);
        stx.rollback().unwrap();
        assert_eq!(stx.status(), SubTransactionStatus::Aborted);
    }
}
