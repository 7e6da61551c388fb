//! Coordinators.
//!
//! This module provides:
//! - `Coordinator` - the strategy interface containers register
//!   entries with and select entries through
//! - `CoordinationData` / `CoordinationParam` - per-write parameters
//! - `Selector` / `SelectionCriterion` - per-read selection requests
//! - the selector chain evaluator
//! - the built-in strategies: any, queue, label/key, vector, linda
//!   and query
//!
//! A coordinator indexes the entries registered with it and produces
//! ordered candidate views for selection. Visibility is not its
//! concern; the chain evaluator asks the isolation layer per entry.

mod any;
mod data;
mod errors;
mod label;
mod linda;
mod query;
mod queue;
mod selector;
mod vector;

pub use any::AnyCoordinator;
pub use data::{CoordinationData, CoordinationParam, VectorIndex};
pub use errors::{CoordinationError, SelectionError};
pub use label::LabelCoordinator;
pub use linda::LindaCoordinator;
pub use query::{Matchmaker, QueryCoordinator};
pub use queue::{QueueCoordinator, QueueOrder};
pub use selector::{evaluate, EntryAccess, SelectionCriterion, SelectionStage, SelectionView, Selector};
pub use vector::VectorCoordinator;

use std::sync::{Arc, Mutex, OnceLock};

use crate::isolation::IsolationManager;
use crate::model::{ContainerId, EntryRef};
use crate::storage::PayloadStore;
use crate::transaction::{SubTransaction, SubTransactionStatus, TransactionStatus};

/// What a coordinator sees of its container.
#[derive(Clone)]
pub struct CoordinatorContext {
    pub container: ContainerId,
    pub isolation: Arc<IsolationManager>,
    pub payloads: Arc<PayloadStore>,
}

/// An entry indexing and selection strategy.
pub trait Coordinator: Send + Sync {
    fn name(&self) -> &str;

    /// Wires the coordinator to its container. Called once, before
    /// any entry is registered.
    fn attach(&self, ctx: CoordinatorContext);

    /// The parameter to synthesize when a write names no coordination
    /// data for this coordinator; `None` when the parameter is
    /// obligatory and cannot be made up.
    fn default_param(&self) -> Option<CoordinationParam> {
        Some(CoordinationParam::None)
    }

    /// Indexes a freshly written entry.
    fn register(
        &self,
        stx: &Arc<SubTransaction>,
        param: &CoordinationParam,
        entry: &EntryRef,
    ) -> Result<(), CoordinationError>;

    /// Removes an entry from the index. Returns whether it was
    /// registered.
    fn unregister(&self, entry: &EntryRef) -> bool;

    /// Called before a take removes a registered entry, so the
    /// coordinator can guard its structure.
    fn prepare_removal(
        &self,
        stx: &Arc<SubTransaction>,
        entry: &EntryRef,
    ) -> Result<(), CoordinationError> {
        let _ = (stx, entry);
        Ok(())
    }

    /// A snapshot view of the index for one selection.
    fn view(&self, criterion: &SelectionCriterion) -> Result<Box<dyn SelectionView>, SelectionError>;

    /// Drops the whole index, used when the container is disposed.
    fn clear(&self);
}

fn attached<'a>(
    ctx: &'a OnceLock<CoordinatorContext>,
    name: &str,
) -> Result<&'a CoordinatorContext, CoordinationError> {
    ctx.get()
        .ok_or_else(|| CoordinationError::CoordinatorNotRegistered(name.to_string()))
}

/// Structural lock for coordinators whose index cannot tolerate
/// interleaved restructuring, currently the vector.
///
/// The lock is owned by a sub-transaction and implicitly passes on
/// once that sub-transaction's whole transaction has finished, or to
/// later sub-transactions of the same transaction.
#[derive(Default)]
pub struct CoordinatorLock {
    holder: Mutex<Option<Arc<SubTransaction>>>,
}

impl CoordinatorLock {
    pub fn new() -> Self {
        CoordinatorLock::default()
    }

    pub fn acquire(&self, stx: &Arc<SubTransaction>) -> Result<(), CoordinationError> {
        let mut holder = match self.holder.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let take = match holder.as_ref() {
            None => true,
            Some(current) if current.id() == stx.id() => return Ok(()),
            Some(current) => match current.status() {
                SubTransactionStatus::Running => false,
                _ => {
                    // The holding sub-transaction finished; the lock
                    // belongs to its transaction until that finishes.
                    match current.transaction().map(|tx| tx.status()) {
                        None | Some(TransactionStatus::Committed) | Some(TransactionStatus::RolledBack) => true,
                        _ => current.transaction_id() == stx.transaction_id(),
                    }
                }
            },
        };
        if take {
            *holder = Some(Arc::clone(stx));
            Ok(())
        } else {
            Err(CoordinationError::CoordinatorLocked)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TransactionId;
    use crate::transaction::Transaction;

    #[test]
    fn coordinator_lock_follows_its_transaction() {
        let lock = CoordinatorLock::new();
        let tx1 = Transaction::new(TransactionId::new(1));
        let tx2 = Transaction::new(TransactionId::new(2));

        let stx1 = tx1.new_sub_transaction().unwrap();
        lock.acquire(&stx1).unwrap();

        // Foreign sub-transaction is blocked while stx1 runs.
        let stx2 = tx2.new_sub_transaction().unwrap();
        assert_eq!(lock.acquire(&stx2), Err(CoordinationError::CoordinatorLocked));

        // After stx1 commits, the lock still belongs to tx1.
        stx1.commit().unwrap();
        assert_eq!(lock.acquire(&stx2), Err(CoordinationError::CoordinatorLocked));
        let stx1b = tx1.new_sub_transaction().unwrap();
        lock.acquire(&stx1b).unwrap();
        stx1b.commit().unwrap();

        // Once tx1 finishes the lock can be stolen.
        tx1.commit().unwrap();
        lock.acquire(&stx2).unwrap();
    }
}
