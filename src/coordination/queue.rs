//! The queue coordinator: strict FIFO or LIFO order.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

use crate::coordination::{
    CoordinationError, CoordinationParam, Coordinator, CoordinatorContext, SelectionCriterion,
    SelectionError, SelectionView,
};
use crate::model::{Count, EntryId, EntryRef};
use crate::transaction::SubTransaction;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueOrder {
    Fifo,
    Lifo,
}

#[derive(Default)]
struct QueueState {
    queue: VecDeque<EntryRef>,
    positions: HashMap<EntryId, u64>,
}

/// Hands entries out in arrival order, or reversed for LIFO.
///
/// Selection stops at the first entry the requester cannot access;
/// the queue never hands out an entry past a blocked head.
pub struct QueueCoordinator {
    name: String,
    order: QueueOrder,
    ctx: OnceLock<CoordinatorContext>,
    state: Mutex<QueueState>,
    arrival: AtomicU64,
}

impl QueueCoordinator {
    pub fn new(name: impl Into<String>, order: QueueOrder) -> Self {
        QueueCoordinator {
            name: name.into(),
            order,
            ctx: OnceLock::new(),
            state: Mutex::new(QueueState::default()),
            arrival: AtomicU64::new(0),
        }
    }

    pub fn fifo(name: impl Into<String>) -> Self {
        QueueCoordinator::new(name, QueueOrder::Fifo)
    }

    pub fn lifo(name: impl Into<String>) -> Self {
        QueueCoordinator::new(name, QueueOrder::Lifo)
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, QueueState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Coordinator for QueueCoordinator {
    fn name(&self) -> &str {
        &self.name
    }

    fn attach(&self, ctx: CoordinatorContext) {
        let _ = self.ctx.set(ctx);
    }

    fn register(
        &self,
        _stx: &Arc<SubTransaction>,
        param: &CoordinationParam,
        entry: &EntryRef,
    ) -> Result<(), CoordinationError> {
        if !matches!(param, CoordinationParam::None) {
            return Err(CoordinationError::InvalidCoordinationData(
                "queue coordinator takes no parameter".to_string(),
            ));
        }
        let mut state = self.lock_state();
        state.queue.push_back(Arc::clone(entry));
        let position = self.arrival.fetch_add(1, Ordering::Relaxed);
        state.positions.insert(entry.id(), position);
        Ok(())
    }

    fn unregister(&self, entry: &EntryRef) -> bool {
        let mut state = self.lock_state();
        if state.positions.remove(&entry.id()).is_none() {
            return false;
        }
        state.queue.retain(|e| e != entry);
        true
    }

    fn view(&self, criterion: &SelectionCriterion) -> Result<Box<dyn SelectionView>, SelectionError> {
        if !matches!(criterion, SelectionCriterion::Any) {
            return Err(SelectionError::InvalidSelector(
                "queue coordinator selects without a criterion".to_string(),
            ));
        }
        let state = self.lock_state();
        let mut entries: Vec<EntryRef> = state.queue.iter().cloned().collect();
        if self.order == QueueOrder::Lifo {
            entries.reverse();
        }
        Ok(Box::new(QueueView {
            entries,
            positions: state.positions.clone(),
            order: self.order,
        }))
    }

    fn clear(&self) {
        let mut state = self.lock_state();
        state.queue.clear();
        state.positions.clear();
    }
}

struct QueueView {
    entries: Vec<EntryRef>,
    positions: HashMap<EntryId, u64>,
    order: QueueOrder,
}

impl SelectionView for QueueView {
    fn registered_count(&self) -> usize {
        self.entries.len()
    }

    fn slots(&self) -> Vec<Vec<EntryRef>> {
        self.entries.iter().cloned().map(|e| vec![e]).collect()
    }

    fn contains(&self, entry: &EntryRef) -> bool {
        self.positions.contains_key(&entry.id())
    }

    /// Blocking counts must surface the blocked head instead of
    /// skipping it.
    fn mandatory_for(&self, count: Count) -> bool {
        !matches!(count, Count::Max)
    }

    fn halts_on_inaccessible(&self) -> bool {
        true
    }

    /// Reimposes queue order on entries selected upstream.
    fn narrow(&self, input: &[EntryRef]) -> Vec<EntryRef> {
        let mut narrowed: Vec<EntryRef> = input.iter().filter(|e| self.contains(e)).cloned().collect();
        narrowed.sort_by_key(|e| self.positions.get(&e.id()).copied().unwrap_or(u64::MAX));
        if self.order == QueueOrder::Lifo {
            narrowed.reverse();
        }
        narrowed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ContainerId, EntryHandle, TransactionId};
    use crate::transaction::Transaction;

    fn entry(id: u64) -> EntryRef {
        Arc::new(EntryHandle::new(EntryId::new(id), ContainerId::new(1), "T"))
    }

    fn stx() -> Arc<SubTransaction> {
        Transaction::new(TransactionId::new(1)).new_sub_transaction().unwrap()
    }

    fn filled(order: QueueOrder) -> QueueCoordinator {
        let coordinator = QueueCoordinator::new("queue", order);
        for id in 1..=3 {
            coordinator
                .register(&stx(), &CoordinationParam::None, &entry(id))
                .unwrap();
        }
        coordinator
    }

    #[test]
    fn fifo_slots_run_oldest_first() {
        let view = filled(QueueOrder::Fifo).view(&SelectionCriterion::Any).unwrap();
        let slots = view.slots();
        assert_eq!(slots[0][0].id(), EntryId::new(1));
        assert_eq!(slots[2][0].id(), EntryId::new(3));
    }

    #[test]
    fn lifo_slots_run_newest_first() {
        let view = filled(QueueOrder::Lifo).view(&SelectionCriterion::Any).unwrap();
        let slots = view.slots();
        assert_eq!(slots[0][0].id(), EntryId::new(3));
    }

    #[test]
    fn narrow_restores_queue_order() {
        let view = filled(QueueOrder::Fifo).view(&SelectionCriterion::Any).unwrap();
        let shuffled = vec![entry(3), entry(1), entry(2)];
        let narrowed = view.narrow(&shuffled);
        assert_eq!(narrowed[0].id(), EntryId::new(1));
        assert_eq!(narrowed[2].id(), EntryId::new(3));
    }

    #[test]
    fn unregister_removes_from_order() {
        let coordinator = filled(QueueOrder::Fifo);
        assert!(coordinator.unregister(&entry(2)));
        let view = coordinator.view(&SelectionCriterion::Any).unwrap();
        assert_eq!(view.registered_count(), 2);
        assert!(!view.contains(&entry(2)));
    }
}
