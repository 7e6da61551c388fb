//! The vector coordinator: positional access with shifting inserts.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, OnceLock};

use crate::coordination::{
    attached, CoordinationError, CoordinationParam, Coordinator, CoordinatorContext,
    CoordinatorLock, SelectionCriterion, SelectionError, SelectionView, VectorIndex,
};
use crate::model::{Count, EntryId, EntryRef};
use crate::transaction::SubTransaction;

#[derive(Default)]
struct VectorState {
    /// One slot per position. A slot holds overwrite candidates; the
    /// requester sees whichever version isolation shows it.
    slots: Vec<Vec<EntryRef>>,
    registered: HashSet<EntryId>,
}

/// Keeps entries at explicit positions.
///
/// Inserting at an occupied position shifts later entries, so every
/// structural change runs under the coordinator lock to keep positions
/// stable within a transaction.
pub struct VectorCoordinator {
    name: String,
    ctx: OnceLock<CoordinatorContext>,
    state: Mutex<VectorState>,
    lock: CoordinatorLock,
}

impl VectorCoordinator {
    pub fn new(name: impl Into<String>) -> Self {
        VectorCoordinator {
            name: name.into(),
            ctx: OnceLock::new(),
            state: Mutex::new(VectorState::default()),
            lock: CoordinatorLock::new(),
        }
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, VectorState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Coordinator for VectorCoordinator {
    fn name(&self) -> &str {
        &self.name
    }

    fn attach(&self, ctx: CoordinatorContext) {
        let _ = self.ctx.set(ctx);
    }

    fn default_param(&self) -> Option<CoordinationParam> {
        Some(CoordinationParam::Index(VectorIndex::Append))
    }

    fn register(
        &self,
        stx: &Arc<SubTransaction>,
        param: &CoordinationParam,
        entry: &EntryRef,
    ) -> Result<(), CoordinationError> {
        let CoordinationParam::Index(index) = param else {
            return Err(CoordinationError::InvalidCoordinationData(format!(
                "coordinator '{}' needs an index",
                self.name
            )));
        };
        self.lock.acquire(stx)?;
        let mut state = self.lock_state();
        let len = state.slots.len();
        match *index {
            VectorIndex::Append => state.slots.push(vec![Arc::clone(entry)]),
            VectorIndex::At(i) if i == len => state.slots.push(vec![Arc::clone(entry)]),
            VectorIndex::At(i) if i > len => {
                return Err(CoordinationError::IndexOutOfBounds { index: i, len });
            }
            VectorIndex::At(i) => {
                // Writing over a position the same transaction is
                // taking keeps both versions in the slot; otherwise
                // later positions shift.
                let ctx = attached(&self.ctx, &self.name)?;
                let occupant = state.slots[i].last().map(|e| e.id());
                let overwrite = occupant
                    .is_some_and(|base| ctx.isolation.check_valid_entry_overwrite(base, entry.id()));
                if overwrite {
                    state.slots[i].push(Arc::clone(entry));
                } else {
                    state.slots.insert(i, vec![Arc::clone(entry)]);
                }
            }
        }
        state.registered.insert(entry.id());
        Ok(())
    }

    fn unregister(&self, entry: &EntryRef) -> bool {
        let mut state = self.lock_state();
        if !state.registered.remove(&entry.id()) {
            return false;
        }
        for i in 0..state.slots.len() {
            let before = state.slots[i].len();
            state.slots[i].retain(|e| e != entry);
            if state.slots[i].len() < before {
                if state.slots[i].is_empty() {
                    state.slots.remove(i);
                }
                break;
            }
        }
        true
    }

    /// A take shifts positions, so it needs the coordinator lock too.
    fn prepare_removal(
        &self,
        stx: &Arc<SubTransaction>,
        entry: &EntryRef,
    ) -> Result<(), CoordinationError> {
        if self.lock_state().registered.contains(&entry.id()) {
            self.lock.acquire(stx)?;
        }
        Ok(())
    }

    fn view(&self, criterion: &SelectionCriterion) -> Result<Box<dyn SelectionView>, SelectionError> {
        let start = match criterion {
            SelectionCriterion::Any => 0,
            SelectionCriterion::Index(start) => *start,
            _ => {
                return Err(SelectionError::InvalidSelector(format!(
                    "coordinator '{}' selects by index",
                    self.name
                )));
            }
        };
        let state = self.lock_state();
        Ok(Box::new(VectorView {
            slots: state.slots.iter().skip(start).cloned().collect(),
            registered: state.registered.clone(),
        }))
    }

    fn clear(&self) {
        let mut state = self.lock_state();
        state.slots.clear();
        state.registered.clear();
    }
}

struct VectorView {
    slots: Vec<Vec<EntryRef>>,
    registered: HashSet<EntryId>,
}

impl SelectionView for VectorView {
    fn registered_count(&self) -> usize {
        self.slots.len()
    }

    fn slots(&self) -> Vec<Vec<EntryRef>> {
        self.slots.clone()
    }

    fn contains(&self, entry: &EntryRef) -> bool {
        self.registered.contains(&entry.id())
    }

    fn mandatory_for(&self, count: Count) -> bool {
        !matches!(count, Count::Max)
    }

    /// Positions are contiguous; a gap ends the selection.
    fn halts_on_empty_slot(&self) -> bool {
        true
    }

    /// Keeps the contiguous run of positions present in the input,
    /// starting at the view's first slot.
    fn narrow(&self, input: &[EntryRef]) -> Vec<EntryRef> {
        let mut narrowed = Vec::new();
        for slot in &self.slots {
            match input.iter().find(|e| slot.contains(e)) {
                Some(entry) => narrowed.push(Arc::clone(entry)),
                None => break,
            }
        }
        narrowed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::isolation::IsolationManager;
    use crate::model::{ContainerId, EntryHandle, TransactionId};
    use crate::storage::{PayloadStore, StorageContext};
    use crate::transaction::Transaction;

    fn entry(id: u64) -> EntryRef {
        Arc::new(EntryHandle::new(EntryId::new(id), ContainerId::new(1), "T"))
    }

    fn coordinator() -> VectorCoordinator {
        let coordinator = VectorCoordinator::new("vector");
        coordinator.attach(CoordinatorContext {
            container: ContainerId::new(1),
            isolation: Arc::new(IsolationManager::new()),
            payloads: Arc::new(PayloadStore::new(&StorageContext::new(), "c1", 8)),
        });
        coordinator
    }

    fn stx(tx: u64) -> Arc<SubTransaction> {
        Transaction::new(TransactionId::new(tx)).new_sub_transaction().unwrap()
    }

    #[test]
    fn insert_at_shifts_later_positions() {
        let coordinator = coordinator();
        let stx = stx(1);
        coordinator
            .register(&stx, &CoordinationParam::Index(VectorIndex::Append), &entry(1))
            .unwrap();
        coordinator
            .register(&stx, &CoordinationParam::Index(VectorIndex::At(0)), &entry(2))
            .unwrap();

        let view = coordinator.view(&SelectionCriterion::Any).unwrap();
        let slots = view.slots();
        assert_eq!(slots[0][0].id(), EntryId::new(2));
        assert_eq!(slots[1][0].id(), EntryId::new(1));
    }

    #[test]
    fn index_past_the_end_is_refused() {
        let coordinator = coordinator();
        let err = coordinator
            .register(&stx(1), &CoordinationParam::Index(VectorIndex::At(1)), &entry(1))
            .unwrap_err();
        assert_eq!(err, CoordinationError::IndexOutOfBounds { index: 1, len: 0 });
    }

    #[test]
    fn foreign_sub_transaction_is_locked_out_while_restructuring() {
        let coordinator = coordinator();
        let first = stx(1);
        coordinator
            .register(&first, &CoordinationParam::Index(VectorIndex::Append), &entry(1))
            .unwrap();

        let err = coordinator
            .register(&stx(2), &CoordinationParam::Index(VectorIndex::Append), &entry(2))
            .unwrap_err();
        assert_eq!(err, CoordinationError::CoordinatorLocked);
    }

    #[test]
    fn narrow_keeps_only_a_contiguous_prefix() {
        let coordinator = coordinator();
        let stx = stx(1);
        for id in 1..=3 {
            coordinator
                .register(&stx, &CoordinationParam::Index(VectorIndex::Append), &entry(id))
                .unwrap();
        }
        let view = coordinator.view(&SelectionCriterion::Any).unwrap();
        // Position 1 is missing from the input, so position 2 is
        // unreachable.
        let narrowed = view.narrow(&[entry(1), entry(3)]);
        assert_eq!(narrowed.len(), 1);
        assert_eq!(narrowed[0].id(), EntryId::new(1));
    }
}
