//! Transaction errors.

use thiserror::Error;

// ============================================================
// Transaction Errors
// ============================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TransactionError {
    /// The transaction has already finished or is locked for new work.
    #[error("transaction is not active")]
    InvalidTransaction,

    /// The sub-transaction has already finished.
    #[error("sub-transaction is not running")]
    InvalidSubTransaction,

    /// The transaction cannot finish while sub-transactions run.
    #[error("sub-transactions are still running")]
    SubTransactionsActive,
}
