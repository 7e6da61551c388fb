//! Transactions and sub-transactions.
//!
//! This module provides:
//! - `Transaction` - the outer unit of atomicity
//! - `SubTransaction` - one operation's scope inside a transaction
//! - `LogItem` - the redo/undo record every lock-taking step leaves
//!
//! Every operation runs inside a sub-transaction. Committing the
//! sub-transaction surrenders its locks to the parent transaction;
//! only the transaction commit releases them for good. Log items are
//! replayed in a fixed per-class order so removals always happen
//! before the structures they reference go away.

mod errors;
mod log;
mod sub;
mod tx;

pub use errors::TransactionError;
pub use log::{LogClass, LogItem};
pub use sub::{SubTransaction, SubTransactionStatus};
pub use tx::{Transaction, TransactionStatus};
