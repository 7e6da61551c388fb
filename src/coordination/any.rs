//! The any coordinator: no order guarantees, no parameters.

use std::sync::{Arc, Mutex, OnceLock};

use crate::coordination::{
    CoordinationError, CoordinationParam, Coordinator, CoordinatorContext, SelectionCriterion,
    SelectionError, SelectionView,
};
use crate::model::EntryRef;
use crate::transaction::SubTransaction;

/// Keeps registered entries in insertion order and hands them out
/// without further guarantees. The usual implicit coordinator.
pub struct AnyCoordinator {
    name: String,
    ctx: OnceLock<CoordinatorContext>,
    entries: Mutex<Vec<EntryRef>>,
}

impl AnyCoordinator {
    pub fn new(name: impl Into<String>) -> Self {
        AnyCoordinator {
            name: name.into(),
            ctx: OnceLock::new(),
            entries: Mutex::new(Vec::new()),
        }
    }

    fn lock_entries(&self) -> std::sync::MutexGuard<'_, Vec<EntryRef>> {
        match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Coordinator for AnyCoordinator {
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
                "any coordinator takes no parameter".to_string(),
            ));
        }
        self.lock_entries().push(Arc::clone(entry));
        Ok(())
    }

    fn unregister(&self, entry: &EntryRef) -> bool {
        let mut entries = self.lock_entries();
        let before = entries.len();
        entries.retain(|e| e != entry);
        entries.len() < before
    }

    fn view(&self, criterion: &SelectionCriterion) -> Result<Box<dyn SelectionView>, SelectionError> {
        if !matches!(criterion, SelectionCriterion::Any) {
            return Err(SelectionError::InvalidSelector(
                "any coordinator selects without a criterion".to_string(),
            ));
        }
        Ok(Box::new(AnyView {
            entries: self.lock_entries().clone(),
        }))
    }

    fn clear(&self) {
        self.lock_entries().clear();
    }
}

struct AnyView {
    entries: Vec<EntryRef>,
}

impl SelectionView for AnyView {
    fn registered_count(&self) -> usize {
        self.entries.len()
    }

    fn slots(&self) -> Vec<Vec<EntryRef>> {
        self.entries.iter().cloned().map(|e| vec![e]).collect()
    }

    fn contains(&self, entry: &EntryRef) -> bool {
        self.entries.contains(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ContainerId, Count, EntryHandle, EntryId};

    fn entry(id: u64) -> EntryRef {
        Arc::new(EntryHandle::new(EntryId::new(id), ContainerId::new(1), "T"))
    }

    fn stx() -> Arc<SubTransaction> {
        use crate::model::TransactionId;
        crate::transaction::Transaction::new(TransactionId::new(1))
            .new_sub_transaction()
            .unwrap()
    }

    #[test]
    fn register_and_unregister() {
        let coordinator = AnyCoordinator::new("any");
        let e = entry(1);
        coordinator.register(&stx(), &CoordinationParam::None, &e).unwrap();
        assert!(coordinator.unregister(&e));
        assert!(!coordinator.unregister(&e));
    }

    #[test]
    fn parameters_are_refused() {
        let coordinator = AnyCoordinator::new("any");
        let err = coordinator
            .register(&stx(), &CoordinationParam::Label("x".to_string()), &entry(1))
            .unwrap_err();
        assert!(matches!(err, CoordinationError::InvalidCoordinationData(_)));
    }

    #[test]
    fn any_count_is_never_mandatory_below_all() {
        let coordinator = AnyCoordinator::new("any");
        let view = coordinator.view(&SelectionCriterion::Any).unwrap();
        assert!(!view.mandatory_for(Count::Exact(1)));
        assert!(!view.mandatory_for(Count::Max));
        assert!(view.mandatory_for(Count::All));
    }
}
