//! Transactions.

use std::sync::{Arc, Condvar, Mutex};

use crate::model::{ContainerId, SubTransactionId, TransactionId};
use crate::transaction::sub::{SubTransaction, SubTransactionStatus};
use crate::transaction::{LogClass, TransactionError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionStatus {
    Running,
    Committing,
    Committed,
    RollingBack,
    RolledBack,
}

struct TxState {
    status: TransactionStatus,
    active: bool,
    locked: bool,
    stx_seq: u64,
    unfinished: usize,
    sub_transactions: Vec<Arc<SubTransaction>>,
}

/// The outer unit of atomicity.
///
/// A transaction hands out sub-transactions, one per operation, and
/// on commit or rollback replays their surrendered log items in a
/// fixed class order: deletes first, so entries disappear before the
/// containers and lock words they reference.
pub struct Transaction {
    id: TransactionId,
    inner: Mutex<TxState>,
    stx_done: Condvar,
}

impl Transaction {
    pub fn new(id: TransactionId) -> Arc<Self> {
        Arc::new(Transaction {
            id,
            inner: Mutex::new(TxState {
                status: TransactionStatus::Running,
                active: true,
                locked: false,
                stx_seq: 0,
                unfinished: 0,
                sub_transactions: Vec::new(),
            }),
            stx_done: Condvar::new(),
        })
    }

    fn lock_inner(&self) -> std::sync::MutexGuard<'_, TxState> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    #[inline]
    pub fn id(&self) -> TransactionId {
        self.id
    }

    pub fn status(&self) -> TransactionStatus {
        self.lock_inner().status
    }

    pub fn is_active(&self) -> bool {
        self.lock_inner().active
    }

    /// Starts a new sub-transaction. Refused once the transaction is
    /// finishing or locked for new work.
    pub fn new_sub_transaction(self: &Arc<Self>) -> Result<Arc<SubTransaction>, TransactionError> {
        let mut inner = self.lock_inner();
        if !inner.active || inner.locked {
            return Err(TransactionError::InvalidTransaction);
        }
        inner.stx_seq += 1;
        let stx = SubTransaction::new(
            SubTransactionId::new(self.id, inner.stx_seq),
            Arc::downgrade(self),
        );
        inner.unfinished += 1;
        inner.sub_transactions.push(Arc::clone(&stx));
        Ok(stx)
    }

    pub(crate) fn sub_transaction_finished(&self) {
        let mut inner = self.lock_inner();
        inner.unfinished = inner.unfinished.saturating_sub(1);
        if inner.unfinished == 0 {
            self.stx_done.notify_all();
        }
    }

    /// Refuses new sub-transactions and blocks until the running ones
    /// have finished.
    pub fn lock_and_wait_for_sub_transactions(&self) {
        let mut inner = self.lock_inner();
        inner.locked = true;
        while inner.unfinished > 0 {
            inner = match self.stx_done.wait(inner) {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
        }
    }

    /// Containers the transaction touched through any of its
    /// sub-transactions, failed operations included.
    pub fn accessed_containers(&self) -> Vec<ContainerId> {
        let inner = self.lock_inner();
        let mut containers = Vec::new();
        for stx in &inner.sub_transactions {
            for id in stx.accessed_containers() {
                if !containers.contains(&id) {
                    containers.push(id);
                }
            }
        }
        containers
    }

    /// Marks the transaction as finishing and collects the
    /// sub-transactions whose log items still need transaction-level
    /// replay. Rolled-back sub-transactions already undid their work.
    fn finish(&self, status: TransactionStatus) -> Result<Vec<Arc<SubTransaction>>, TransactionError> {
        let mut inner = self.lock_inner();
        if !inner.active {
            return Err(TransactionError::InvalidTransaction);
        }
        // Refusing before deactivation keeps the transaction usable:
        // the caller can finish the running sub-transactions and try
        // again.
        if inner.unfinished > 0 {
            return Err(TransactionError::SubTransactionsActive);
        }
        inner.active = false;
        inner.status = status;
        Ok(inner
            .sub_transactions
            .iter()
            .filter(|stx| stx.status() == SubTransactionStatus::Committed)
            .cloned()
            .collect())
    }

    pub fn commit(&self) -> Result<(), TransactionError> {
        let committed = self.finish(TransactionStatus::Committing)?;
        for class in [
            LogClass::Delete,
            LogClass::Insert,
            LogClass::Read,
            LogClass::Lock,
            LogClass::Other,
        ] {
            for stx in &committed {
                for item in stx.logs_for(class) {
                    item.commit_transaction();
                }
            }
        }
        self.lock_inner().status = TransactionStatus::Committed;
        Ok(())
    }

    pub fn rollback(&self) -> Result<(), TransactionError> {
        let committed = self.finish(TransactionStatus::RollingBack)?;
        for class in [
            LogClass::Delete,
            LogClass::Read,
            LogClass::Insert,
            LogClass::Lock,
            LogClass::Other,
        ] {
            for stx in &committed {
                for item in stx.logs_for(class) {
                    item.rollback_transaction();
                }
            }
        }
        self.lock_inner().status = TransactionStatus::RolledBack;
        Ok(())
    }
}
