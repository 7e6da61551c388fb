//! The label coordinator, and its key variant with unique bindings.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};

use crate::coordination::{
    attached, CoordinationError, CoordinationParam, Coordinator, CoordinatorContext,
    SelectionCriterion, SelectionError, SelectionView,
};
use crate::model::{Count, EntryId, EntryRef};
use crate::transaction::SubTransaction;

#[derive(Default)]
struct LabelState {
    /// Bucket per label, in registration order. In key mode a bucket
    /// is an overwrite chain whose versions isolation keeps apart.
    buckets: HashMap<String, Vec<EntryRef>>,
    labels: HashMap<EntryId, String>,
}

/// Indexes entries under a caller-supplied label.
///
/// In key mode a label is a key: registering under an occupied key is
/// refused unless the occupant is being taken by the same transaction,
/// which makes the write an atomic overwrite.
pub struct LabelCoordinator {
    name: String,
    key_mode: bool,
    ctx: OnceLock<CoordinatorContext>,
    state: Mutex<LabelState>,
}

impl LabelCoordinator {
    pub fn new(name: impl Into<String>) -> Self {
        LabelCoordinator {
            name: name.into(),
            key_mode: false,
            ctx: OnceLock::new(),
            state: Mutex::new(LabelState::default()),
        }
    }

    /// Key variant: one living entry per label.
    pub fn keyed(name: impl Into<String>) -> Self {
        LabelCoordinator {
            name: name.into(),
            key_mode: true,
            ctx: OnceLock::new(),
            state: Mutex::new(LabelState::default()),
        }
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, LabelState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn label_of<'a>(&self, param: &'a CoordinationParam) -> Result<&'a str, CoordinationError> {
        match (self.key_mode, param) {
            (false, CoordinationParam::Label(label)) => Ok(label),
            (true, CoordinationParam::Key(key)) => Ok(key),
            _ => Err(CoordinationError::InvalidCoordinationData(format!(
                "coordinator '{}' needs a {}",
                self.name,
                if self.key_mode { "key" } else { "label" }
            ))),
        }
    }
}

impl Coordinator for LabelCoordinator {
    fn name(&self) -> &str {
        &self.name
    }

    fn attach(&self, ctx: CoordinatorContext) {
        let _ = self.ctx.set(ctx);
    }

    /// The label is obligatory, nothing sensible can be synthesized.
    fn default_param(&self) -> Option<CoordinationParam> {
        None
    }

    fn register(
        &self,
        _stx: &Arc<SubTransaction>,
        param: &CoordinationParam,
        entry: &EntryRef,
    ) -> Result<(), CoordinationError> {
        let label = self.label_of(param)?.to_string();
        let mut state = self.lock_state();
        let bucket = state.buckets.entry(label.clone()).or_default();
        if self.key_mode {
            if let Some(occupant) = bucket.last() {
                let ctx = attached(&self.ctx, &self.name)?;
                if !ctx.isolation.check_valid_entry_overwrite(occupant.id(), entry.id()) {
                    return Err(CoordinationError::DuplicateKey(label));
                }
            }
        }
        bucket.push(Arc::clone(entry));
        state.labels.insert(entry.id(), label);
        Ok(())
    }

    fn unregister(&self, entry: &EntryRef) -> bool {
        let mut state = self.lock_state();
        let Some(label) = state.labels.remove(&entry.id()) else {
            return false;
        };
        if let Some(bucket) = state.buckets.get_mut(&label) {
            bucket.retain(|e| e != entry);
            if bucket.is_empty() {
                state.buckets.remove(&label);
            }
        }
        true
    }

    fn view(&self, criterion: &SelectionCriterion) -> Result<Box<dyn SelectionView>, SelectionError> {
        let SelectionCriterion::Label(label) = criterion else {
            return Err(SelectionError::InvalidSelector(format!(
                "coordinator '{}' selects by {}",
                self.name,
                if self.key_mode { "key" } else { "label" }
            )));
        };
        let state = self.lock_state();
        Ok(Box::new(LabelView {
            entries: state.buckets.get(label).cloned().unwrap_or_default(),
            key_mode: self.key_mode,
        }))
    }

    fn clear(&self) {
        let mut state = self.lock_state();
        state.buckets.clear();
        state.labels.clear();
    }
}

struct LabelView {
    entries: Vec<EntryRef>,
    key_mode: bool,
}

impl SelectionView for LabelView {
    fn registered_count(&self) -> usize {
        self.entries.len()
    }

    fn slots(&self) -> Vec<Vec<EntryRef>> {
        self.entries.iter().cloned().map(|e| vec![e]).collect()
    }

    fn contains(&self, entry: &EntryRef) -> bool {
        self.entries.contains(entry)
    }

    /// A key lookup must report a locked binding instead of skipping
    /// it; label lookups skip like the any coordinator.
    fn mandatory_for(&self, count: Count) -> bool {
        if self.key_mode {
            !matches!(count, Count::Max)
        } else {
            matches!(count, Count::All)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::isolation::IsolationManager;
    use crate::model::{ContainerId, EntryHandle, IsolationLevel, OperationType, TransactionId};
    use crate::storage::{PayloadStore, StorageContext};
    use crate::transaction::Transaction;

    fn entry(id: u64) -> EntryRef {
        Arc::new(EntryHandle::new(EntryId::new(id), ContainerId::new(1), "T"))
    }

    fn attach(coordinator: &LabelCoordinator) -> Arc<IsolationManager> {
        let isolation = Arc::new(IsolationManager::new());
        coordinator.attach(CoordinatorContext {
            container: ContainerId::new(1),
            isolation: Arc::clone(&isolation),
            payloads: Arc::new(PayloadStore::new(&StorageContext::new(), "c1", 8)),
        });
        isolation
    }

    fn stx(tx: u64) -> Arc<SubTransaction> {
        Transaction::new(TransactionId::new(tx)).new_sub_transaction().unwrap()
    }

    #[test]
    fn labels_are_shared() {
        let coordinator = LabelCoordinator::new("label");
        attach(&coordinator);
        let param = CoordinationParam::Label("news".to_string());
        coordinator.register(&stx(1), &param, &entry(1)).unwrap();
        coordinator.register(&stx(2), &param, &entry(2)).unwrap();

        let view = coordinator
            .view(&SelectionCriterion::Label("news".to_string()))
            .unwrap();
        assert_eq!(view.registered_count(), 2);
    }

    #[test]
    fn occupied_key_is_refused() {
        let coordinator = LabelCoordinator::keyed("key");
        attach(&coordinator);
        let param = CoordinationParam::Key("k1".to_string());
        coordinator.register(&stx(1), &param, &entry(1)).unwrap();
        let err = coordinator.register(&stx(2), &param, &entry(2)).unwrap_err();
        assert_eq!(err, CoordinationError::DuplicateKey("k1".to_string()));
    }

    #[test]
    fn take_then_write_overwrites_a_key() {
        let coordinator = LabelCoordinator::keyed("key");
        let isolation = attach(&coordinator);
        let param = CoordinationParam::Key("k1".to_string());
        let stx = stx(1);
        let tx = stx.transaction_id();

        // Existing committed binding.
        isolation
            .acquire_entry_lock(OperationType::Write, EntryId::new(1), tx, stx.id(), IsolationLevel::ReadCommitted)
            .unwrap();
        isolation.surrender_entry_lock(crate::isolation::LockKind::Insert, EntryId::new(1), stx.id());
        isolation.release_entry_lock(crate::isolation::LockKind::Insert, EntryId::new(1), tx, None);
        coordinator.register(&stx, &param, &entry(1)).unwrap();

        // The same sub-transaction takes the occupant and rebinds.
        isolation
            .acquire_entry_lock(OperationType::Take, EntryId::new(1), tx, stx.id(), IsolationLevel::ReadCommitted)
            .unwrap();
        isolation
            .acquire_entry_lock(OperationType::Write, EntryId::new(2), tx, stx.id(), IsolationLevel::ReadCommitted)
            .unwrap();
        coordinator.register(&stx, &param, &entry(2)).unwrap();
    }

    #[test]
    fn missing_label_is_an_invalid_parameter() {
        let coordinator = LabelCoordinator::new("label");
        attach(&coordinator);
        let err = coordinator
            .register(&stx(1), &CoordinationParam::None, &entry(1))
            .unwrap_err();
        assert!(matches!(err, CoordinationError::InvalidCoordinationData(_)));
        assert!(coordinator.default_param().is_none());
    }
}
