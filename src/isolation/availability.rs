//! Visibility verdicts.

use crate::model::{SubTransactionId, TransactionId};

/// Who holds a lock: the transaction, and the sub-transaction while
/// that sub-transaction is still running. A holder with `stx == None`
/// has been surrendered to the transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockHolder {
    pub tx: TransactionId,
    pub stx: Option<SubTransactionId>,
}

impl LockHolder {
    pub fn new(tx: TransactionId, stx: SubTransactionId) -> Self {
        LockHolder { tx, stx: Some(stx) }
    }

    /// Whether the requester passes this lock: same transaction, and
    /// the lock is either surrendered or held by the same
    /// sub-transaction.
    #[inline]
    pub fn passes(&self, tx: TransactionId, stx: SubTransactionId) -> bool {
        self.tx == tx && (self.stx.is_none() || self.stx == Some(stx))
    }
}

/// How an entry or container presents itself to a requester.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    /// Accessible to the requester.
    Available,
    /// Exists but is locked; the requester may block and retry.
    NotAvailable(Option<LockHolder>),
    /// Does not exist from the requester's point of view and is
    /// skipped silently.
    NotVisible(Option<LockHolder>),
}

impl Availability {
    #[inline]
    pub fn is_available(&self) -> bool {
        matches!(self, Availability::Available)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stx(tx: u64, seq: u64) -> SubTransactionId {
        SubTransactionId::new(TransactionId::new(tx), seq)
    }

    #[test]
    fn running_holder_passes_only_its_own_sub_transaction() {
        let holder = LockHolder::new(TransactionId::new(1), stx(1, 1));
        assert!(holder.passes(TransactionId::new(1), stx(1, 1)));
        assert!(!holder.passes(TransactionId::new(1), stx(1, 2)));
        assert!(!holder.passes(TransactionId::new(2), stx(2, 1)));
    }

    #[test]
    fn surrendered_holder_passes_any_sub_transaction_of_its_transaction() {
        let holder = LockHolder {
            tx: TransactionId::new(1),
            stx: None,
        };
        assert!(holder.passes(TransactionId::new(1), stx(1, 9)));
        assert!(!holder.passes(TransactionId::new(2), stx(2, 1)));
    }
}
