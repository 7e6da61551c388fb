//! A coordinated entry collection.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::access::{AccessManager, AuthorizationResult, PermitAll};
use crate::container::ContainerError;
use crate::coordination::{
    evaluate, CoordinationData, CoordinationParam, Coordinator, CoordinatorContext, EntryAccess,
    SelectionError, SelectionStage, Selector,
};
use crate::error::SpaceError;
use crate::isolation::{Availability, IsolationManager, LockOutcome};
use crate::model::{
    ContainerId, EntryHandle, EntryId, EntryIdAllocator, EntryRef, EntryValue, IsolationLevel,
    OperationType, RequestContext,
};
use crate::storage::{PayloadStore, StorageContext};
use crate::transaction::{LogItem, SubTransaction, SubTransactionStatus};

#[derive(Debug, Default)]
struct ContainerStats {
    write_requests: AtomicU64,
    writes_ok: AtomicU64,
    read_requests: AtomicU64,
    reads_ok: AtomicU64,
    take_requests: AtomicU64,
    takes_ok: AtomicU64,
}

/// Point-in-time view of a container's operation counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerStatsSnapshot {
    pub write_requests: u64,
    pub writes_ok: u64,
    pub read_requests: u64,
    pub reads_ok: u64,
    pub take_requests: u64,
    pub takes_ok: u64,
}

/// A shared collection of entries, indexed by its coordinators.
///
/// Structural operations are serialized per container; the selection
/// itself then works on coordinator snapshots.
pub struct Container {
    id: ContainerId,
    name: Option<String>,
    capacity: usize,
    valid: AtomicBool,
    coordinators: Vec<Arc<dyn Coordinator>>,
    /// Coordinator index by name, obligatory flag included.
    registry: HashMap<String, (usize, bool)>,
    payloads: Arc<PayloadStore>,
    entries: Mutex<HashMap<EntryId, EntryRef>>,
    isolation: Arc<IsolationManager>,
    access: Arc<dyn AccessManager>,
    allocator: Arc<EntryIdAllocator>,
    op_lock: Mutex<()>,
    stats: ContainerStats,
}

impl Container {
    /// Builds a container and wires its coordinators. The write flow
    /// registers at every obligatory coordinator; optional ones index
    /// only writes that name them.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: ContainerId,
        name: Option<String>,
        capacity: Option<usize>,
        obligatory: Vec<Arc<dyn Coordinator>>,
        optional: Vec<Arc<dyn Coordinator>>,
        access: Option<Arc<dyn AccessManager>>,
        isolation: Arc<IsolationManager>,
        allocator: Arc<EntryIdAllocator>,
        storage: &StorageContext,
        payload_cache_capacity: usize,
    ) -> Result<Arc<Self>, ContainerError> {
        if let Some(name) = &name {
            if name.is_empty() {
                return Err(ContainerError::InvalidContainerName(name.clone()));
            }
        }
        if obligatory.is_empty() && optional.is_empty() {
            return Err(ContainerError::NoCoordinators);
        }

        let mut coordinators: Vec<Arc<dyn Coordinator>> = Vec::new();
        let mut registry = HashMap::new();
        let obligatory_len = obligatory.len();
        for (index, coordinator) in obligatory.into_iter().chain(optional).enumerate() {
            let coordinator_name = coordinator.name().to_string();
            if registry
                .insert(coordinator_name.clone(), (index, index < obligatory_len))
                .is_some()
            {
                return Err(ContainerError::DuplicateCoordinator(coordinator_name));
            }
            coordinators.push(coordinator);
        }

        let map_name = match &name {
            Some(name) => format!("container_{}_{}", id.value(), name),
            None => format!("container_{}", id.value()),
        };
        let payloads = Arc::new(PayloadStore::new(storage, &map_name, payload_cache_capacity));

        for coordinator in &coordinators {
            coordinator.attach(CoordinatorContext {
                container: id,
                isolation: Arc::clone(&isolation),
                payloads: Arc::clone(&payloads),
            });
        }

        Ok(Arc::new(Container {
            id,
            name,
            capacity: capacity.unwrap_or(usize::MAX),
            valid: AtomicBool::new(true),
            coordinators,
            registry,
            payloads,
            entries: Mutex::new(HashMap::new()),
            isolation,
            access: access.unwrap_or_else(|| Arc::new(PermitAll)),
            allocator,
            op_lock: Mutex::new(()),
            stats: ContainerStats::default(),
        }))
    }

    #[inline]
    pub fn id(&self) -> ContainerId {
        self.id
    }

    #[inline]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn is_valid(&self) -> bool {
        self.valid.load(Ordering::Acquire)
    }

    /// Entries currently stored, uncommitted ones included.
    pub fn entry_count(&self) -> usize {
        self.lock_entries().len()
    }

    pub fn stats(&self) -> ContainerStatsSnapshot {
        ContainerStatsSnapshot {
            write_requests: self.stats.write_requests.load(Ordering::Relaxed),
            writes_ok: self.stats.writes_ok.load(Ordering::Relaxed),
            read_requests: self.stats.read_requests.load(Ordering::Relaxed),
            reads_ok: self.stats.reads_ok.load(Ordering::Relaxed),
            take_requests: self.stats.take_requests.load(Ordering::Relaxed),
            takes_ok: self.stats.takes_ok.load(Ordering::Relaxed),
        }
    }

    fn lock_entries(&self) -> std::sync::MutexGuard<'_, HashMap<EntryId, EntryRef>> {
        match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn coordinator(&self, name: &str) -> Option<&Arc<dyn Coordinator>> {
        self.registry.get(name).map(|(index, _)| &self.coordinators[*index])
    }

    fn ensure_usable(&self, stx: &Arc<SubTransaction>) -> Result<(), SpaceError> {
        if !self.is_valid() {
            return Err(ContainerError::InvalidContainer(self.id).into());
        }
        if stx.status() != SubTransactionStatus::Running {
            return Err(crate::transaction::TransactionError::InvalidSubTransaction.into());
        }
        Ok(())
    }

    fn container_open(&self, stx: &Arc<SubTransaction>) -> Result<(), SpaceError> {
        match self
            .isolation
            .check_container_availability(self.id, stx.transaction_id(), stx.id())
        {
            Availability::Available => Ok(()),
            Availability::NotAvailable(_) => Err(ContainerError::ContainerLocked.into()),
            Availability::NotVisible(_) => Err(ContainerError::InvalidContainer(self.id).into()),
        }
    }

    fn auth_for(&self, op: OperationType, stx: &Arc<SubTransaction>, context: &RequestContext) -> AuthorizationResult {
        self.access
            .check_permissions(self.id, op, stx.transaction_id(), context)
    }

    // ------------------------------------------------------------
    // Write
    // ------------------------------------------------------------

    /// Writes one entry, registering it at its coordinators. The entry
    /// stays invisible to other transactions until commit.
    pub fn write(
        self: &Arc<Self>,
        stx: &Arc<SubTransaction>,
        value: EntryValue,
        coordination: &[CoordinationData],
        context: &RequestContext,
    ) -> Result<EntryId, SpaceError> {
        self.stats.write_requests.fetch_add(1, Ordering::Relaxed);
        self.ensure_usable(stx)?;
        let _guard = match self.op_lock.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let tx = stx.transaction_id();

        if let Err(e) = self.container_open(stx) {
            stx.add_log(self.dummy_log(OperationType::Write, stx));
            return Err(e);
        }

        let auth = self.auth_for(OperationType::Write, stx, context);
        if !auth.operation_permitted() {
            stx.add_log(self.dummy_log(OperationType::Write, stx));
            return Err(ContainerError::AccessDenied.into());
        }

        let plan = match self.registration_plan(coordination) {
            Ok(plan) => plan,
            Err(e) => {
                stx.add_log(self.dummy_log(OperationType::Write, stx));
                return Err(e);
            }
        };

        let id = self.allocator.allocate();
        let entry: EntryRef = Arc::new(EntryHandle::new(id, self.id, value.type_name()));
        self.isolation
            .acquire_entry_lock(OperationType::Write, id, tx, stx.id(), IsolationLevel::ReadCommitted)?;
        stx.add_log(LogItem::write(
            Some(Arc::clone(&entry)),
            Arc::clone(self),
            Arc::clone(&self.isolation),
            tx,
            stx.id(),
        ));

        if self.entry_count() >= self.capacity {
            self.undo_write(stx, &entry, &[]);
            return Err(ContainerError::ContainerFull.into());
        }

        let mut registered: Vec<Arc<dyn Coordinator>> = Vec::new();
        for (coordinator, param) in &plan {
            if let Err(e) = coordinator.register(stx, param, &entry) {
                self.undo_write(stx, &entry, &registered);
                return Err(e.into());
            }
            registered.push(Arc::clone(coordinator));
        }

        if !auth.entry_permitted(id) {
            self.undo_write(stx, &entry, &registered);
            return Err(ContainerError::AccessDenied.into());
        }

        self.payloads.put(id, value);
        self.lock_entries().insert(id, entry);
        self.stats.writes_ok.fetch_add(1, Ordering::Relaxed);
        Ok(id)
    }

    /// Resolves the coordination data of a write into one registration
    /// per coordinator, in the container's declaration order.
    fn registration_plan(
        &self,
        coordination: &[CoordinationData],
    ) -> Result<Vec<(Arc<dyn Coordinator>, CoordinationParam)>, SpaceError> {
        let mut by_name: HashMap<&str, &CoordinationParam> = HashMap::new();
        for data in coordination {
            if !self.registry.contains_key(data.coordinator()) {
                return Err(crate::coordination::CoordinationError::CoordinatorNotRegistered(
                    data.coordinator().to_string(),
                )
                .into());
            }
            if by_name.insert(data.coordinator(), data.param()).is_some() {
                return Err(crate::coordination::CoordinationError::InvalidCoordinationData(
                    format!("coordinator '{}' named twice", data.coordinator()),
                )
                .into());
            }
        }

        let mut plan = Vec::new();
        for coordinator in &self.coordinators {
            let (_, obligatory) = self.registry[coordinator.name()];
            match by_name.get(coordinator.name()) {
                Some(param) => plan.push((Arc::clone(coordinator), (*param).clone())),
                None if obligatory => match coordinator.default_param() {
                    Some(param) => plan.push((Arc::clone(coordinator), param)),
                    None => {
                        return Err(crate::coordination::CoordinationError::ObligatoryCoordinatorMissing(
                            coordinator.name().to_string(),
                        )
                        .into());
                    }
                },
                None => {}
            }
        }
        Ok(plan)
    }

    /// Unwinds a failed write: registrations, the fresh lock and the
    /// log item all disappear, a marker log keeps the access recorded.
    fn undo_write(self: &Arc<Self>, stx: &Arc<SubTransaction>, entry: &EntryRef, registered: &[Arc<dyn Coordinator>]) {
        for coordinator in registered {
            coordinator.unregister(entry);
        }
        self.isolation.purge_entry_lock(entry.id());
        stx.retract_entry_logs(entry.id());
        stx.add_log(self.dummy_log(OperationType::Write, stx));
    }

    // ------------------------------------------------------------
    // Read and take
    // ------------------------------------------------------------

    /// Selects entries through the selector chain without consuming
    /// them. Under repeatable read the selected entries are
    /// read-locked until the transaction finishes.
    pub fn read(
        self: &Arc<Self>,
        stx: &Arc<SubTransaction>,
        selectors: &[Selector],
        level: IsolationLevel,
        context: &RequestContext,
    ) -> Result<Vec<Arc<EntryValue>>, SpaceError> {
        self.stats.read_requests.fetch_add(1, Ordering::Relaxed);
        let payloads = self.select_and_lock(stx, selectors, OperationType::Read, level, context)?;
        self.stats.reads_ok.fetch_add(1, Ordering::Relaxed);
        Ok(payloads)
    }

    /// Selects entries and removes them. The removal becomes permanent
    /// at transaction commit; a rollback puts the entries back.
    pub fn take(
        self: &Arc<Self>,
        stx: &Arc<SubTransaction>,
        selectors: &[Selector],
        level: IsolationLevel,
        context: &RequestContext,
    ) -> Result<Vec<Arc<EntryValue>>, SpaceError> {
        self.stats.take_requests.fetch_add(1, Ordering::Relaxed);
        let payloads = self.select_and_lock(stx, selectors, OperationType::Take, level, context)?;
        self.stats.takes_ok.fetch_add(1, Ordering::Relaxed);
        Ok(payloads)
    }

    fn select_and_lock(
        self: &Arc<Self>,
        stx: &Arc<SubTransaction>,
        selectors: &[Selector],
        op: OperationType,
        level: IsolationLevel,
        context: &RequestContext,
    ) -> Result<Vec<Arc<EntryValue>>, SpaceError> {
        self.ensure_usable(stx)?;
        let _guard = match self.op_lock.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let tx = stx.transaction_id();

        if let Err(e) = self.container_open(stx) {
            stx.add_log(self.dummy_log(op, stx));
            return Err(e);
        }

        let auth = self.auth_for(op, stx, context);
        if !auth.operation_permitted() {
            stx.add_log(self.dummy_log(op, stx));
            return Err(ContainerError::AccessDenied.into());
        }
        let selected = match self.select(stx, selectors, op, level, &auth) {
            Ok(selected) => selected,
            Err(e) => {
                stx.add_log(self.dummy_log(op, stx));
                return Err(e);
            }
        };

        let mut locked: Vec<EntryRef> = Vec::new();
        for entry in &selected {
            let outcome = match self.isolation.acquire_entry_lock(op, entry.id(), tx, stx.id(), level) {
                Ok(outcome) => outcome,
                Err(e) => {
                    self.undo_selection_locks(stx, op, &locked);
                    stx.add_log(self.dummy_log(op, stx));
                    return Err(e.into());
                }
            };
            match outcome {
                LockOutcome::Acquired => {
                    let item = match op {
                        OperationType::Take => LogItem::take(
                            Some(Arc::clone(entry)),
                            Arc::clone(self),
                            Arc::clone(&self.isolation),
                            tx,
                            stx.id(),
                        ),
                        _ => LogItem::read(
                            Some(Arc::clone(entry)),
                            Arc::clone(self),
                            Arc::clone(&self.isolation),
                            tx,
                            stx.id(),
                        ),
                    };
                    stx.add_log(item);
                    locked.push(Arc::clone(entry));
                }
                LockOutcome::Skipped => {}
                LockOutcome::Conflict(holder) => {
                    self.undo_selection_locks(stx, op, &locked);
                    stx.add_log(self.dummy_log(op, stx));
                    return Err(SelectionError::EntryLocked(holder).into());
                }
            }
        }

        if op == OperationType::Take {
            for entry in &selected {
                for coordinator in &self.coordinators {
                    if let Err(e) = coordinator.prepare_removal(stx, entry) {
                        self.undo_selection_locks(stx, op, &locked);
                        stx.add_log(self.dummy_log(op, stx));
                        return Err(e.into());
                    }
                }
            }
        }

        let mut payloads = Vec::with_capacity(selected.len());
        for entry in &selected {
            match self.payloads.get(entry.id()) {
                Some(payload) => payloads.push(payload),
                None => {
                    self.undo_selection_locks(stx, op, &locked);
                    stx.add_log(self.dummy_log(op, stx));
                    return Err(ContainerError::EntryPayloadMissing(entry.id()).into());
                }
            }
        }
        Ok(payloads)
    }

    fn select(
        &self,
        stx: &Arc<SubTransaction>,
        selectors: &[Selector],
        op: OperationType,
        level: IsolationLevel,
        auth: &AuthorizationResult,
    ) -> Result<Vec<EntryRef>, SpaceError> {
        let tx = stx.transaction_id();
        let stx_id = stx.id();

        let mut stages = Vec::with_capacity(selectors.len());
        for selector in selectors {
            let coordinator = self
                .coordinator(selector.coordinator())
                .ok_or_else(|| SelectionError::CoordinatorNotRegistered(selector.coordinator().to_string()))?;
            stages.push(SelectionStage {
                view: coordinator.view(selector.criterion())?,
                count: selector.count(),
            });
        }

        let isolation = &self.isolation;
        let mut check = |entry: &EntryRef| match isolation.check_entry_availability(entry.id(), tx, stx_id, op, level)
        {
            Availability::Available if !auth.entry_permitted(entry.id()) => EntryAccess::Denied,
            Availability::Available => EntryAccess::Available,
            Availability::NotAvailable(holder) => EntryAccess::Locked(holder),
            Availability::NotVisible(_) => EntryAccess::Invisible,
        };
        Ok(evaluate(&stages, &mut check)?)
    }

    /// Unwinds the locks one failed selection call took so far.
    fn undo_selection_locks(&self, stx: &Arc<SubTransaction>, op: OperationType, locked: &[EntryRef]) {
        let kind = match op {
            OperationType::Take => crate::isolation::LockKind::Delete,
            _ => crate::isolation::LockKind::Read,
        };
        for entry in locked {
            self.isolation
                .release_entry_lock(kind, entry.id(), stx.transaction_id(), Some(stx.id()));
            stx.retract_entry_logs(entry.id());
        }
    }

    fn dummy_log(self: &Arc<Self>, op: OperationType, stx: &Arc<SubTransaction>) -> LogItem {
        let container = Arc::clone(self);
        let isolation = Arc::clone(&self.isolation);
        let tx = stx.transaction_id();
        match op {
            OperationType::Write => LogItem::write(None, container, isolation, tx, stx.id()),
            OperationType::Read => LogItem::read(None, container, isolation, tx, stx.id()),
            OperationType::Take => LogItem::take(None, container, isolation, tx, stx.id()),
        }
    }

    // ------------------------------------------------------------
    // Maintenance
    // ------------------------------------------------------------

    /// Removes an entry for good: payload, index registrations and the
    /// entries map. Called when a take commits or a write rolls back.
    pub fn purge_entry(&self, entry: &EntryRef) {
        self.lock_entries().remove(&entry.id());
        self.payloads.remove(entry.id());
        for coordinator in &self.coordinators {
            coordinator.unregister(entry);
        }
    }

    /// Invalidates the container and drops everything it holds,
    /// entry lock words included.
    pub fn dispose(&self) {
        self.valid.store(false, Ordering::Release);
        let entries: Vec<EntryRef> = self.lock_entries().drain().map(|(_, e)| e).collect();
        for entry in &entries {
            self.isolation.purge_entry_lock(entry.id());
        }
        for coordinator in &self.coordinators {
            coordinator.clear();
        }
        self.payloads.clear();
    }
}
