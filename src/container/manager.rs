//! The container registry.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use crate::access::AccessManager;
use crate::container::{Container, ContainerError};
use crate::coordination::Coordinator;
use crate::error::SpaceError;
use crate::isolation::{Availability, ContainerLockKind, IsolationManager, LockOutcome};
use crate::model::{ContainerId, EntryIdAllocator};
use crate::storage::StorageContext;
use crate::transaction::{LogItem, SubTransaction, SubTransactionStatus, TransactionError};

/// Creates, destroys and resolves containers.
///
/// Lifecycle operations follow the same isolation discipline as entry
/// operations: creation is invisible to other transactions until
/// commit, destruction keeps the container alive but unavailable until
/// commit.
pub struct ContainerManager {
    isolation: Arc<IsolationManager>,
    storage: StorageContext,
    allocator: Arc<EntryIdAllocator>,
    payload_cache_capacity: usize,
    containers: RwLock<HashMap<ContainerId, Arc<Container>>>,
    names: RwLock<HashMap<String, ContainerId>>,
    next_id: AtomicU64,
}

impl ContainerManager {
    pub fn new(
        isolation: Arc<IsolationManager>,
        allocator: Arc<EntryIdAllocator>,
        payload_cache_capacity: usize,
    ) -> Arc<Self> {
        Arc::new(ContainerManager {
            isolation,
            storage: StorageContext::new(),
            allocator,
            payload_cache_capacity,
            containers: RwLock::new(HashMap::new()),
            names: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        })
    }

    fn read_containers(&self) -> std::sync::RwLockReadGuard<'_, HashMap<ContainerId, Arc<Container>>> {
        match self.containers.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write_containers(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<ContainerId, Arc<Container>>> {
        match self.containers.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn read_names(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, ContainerId>> {
        match self.names.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write_names(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, ContainerId>> {
        match self.names.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn ensure_running(stx: &Arc<SubTransaction>) -> Result<(), SpaceError> {
        if stx.status() != SubTransactionStatus::Running {
            return Err(TransactionError::InvalidSubTransaction.into());
        }
        Ok(())
    }

    /// Creates a container. Other transactions see neither the
    /// container nor its name binding until the transaction commits.
    pub fn create_container(
        self: &Arc<Self>,
        stx: &Arc<SubTransaction>,
        name: Option<String>,
        obligatory: Vec<Arc<dyn Coordinator>>,
        optional: Vec<Arc<dyn Coordinator>>,
        capacity: Option<usize>,
        access: Option<Arc<dyn AccessManager>>,
    ) -> Result<ContainerId, SpaceError> {
        Self::ensure_running(stx)?;
        let tx = stx.transaction_id();
        let id = ContainerId::new(self.next_id.fetch_add(1, Ordering::Relaxed));

        let container = Container::new(
            id,
            name.clone(),
            capacity,
            obligatory,
            optional,
            access,
            Arc::clone(&self.isolation),
            Arc::clone(&self.allocator),
            &self.storage,
            self.payload_cache_capacity,
        )?;

        self.isolation
            .acquire_container_lock(ContainerLockKind::Create, id, tx, stx.id())?;
        stx.add_log(LogItem::container_create(
            id,
            Arc::clone(self),
            Arc::clone(&self.isolation),
            tx,
            stx.id(),
        ));

        if let Some(name) = &name {
            let mut names = self.write_names();
            if names.contains_key(name) {
                drop(names);
                self.isolation.purge_container_lock(id);
                stx.retract_container_logs(id);
                return Err(ContainerError::ContainerNameTaken(name.clone()).into());
            }
            names.insert(name.clone(), id);
        }
        self.write_containers().insert(id, container);
        Ok(id)
    }

    /// Destroys a container. Entries and the name binding disappear
    /// when the transaction commits; until then the container is
    /// merely unavailable.
    pub fn destroy_container(
        self: &Arc<Self>,
        stx: &Arc<SubTransaction>,
        id: ContainerId,
    ) -> Result<(), SpaceError> {
        Self::ensure_running(stx)?;
        let container = self
            .read_containers()
            .get(&id)
            .cloned()
            .ok_or(ContainerError::InvalidContainer(id))?;
        if !container.is_valid() {
            return Err(ContainerError::InvalidContainer(id).into());
        }

        match self
            .isolation
            .acquire_container_lock(ContainerLockKind::Destroy, id, stx.transaction_id(), stx.id())?
        {
            LockOutcome::Acquired | LockOutcome::Skipped => {}
            LockOutcome::Conflict(_) => return Err(ContainerError::ContainerLocked.into()),
        }
        stx.add_log(LogItem::container_destroy(
            id,
            Arc::clone(self),
            Arc::clone(&self.isolation),
            stx.transaction_id(),
            stx.id(),
        ));
        Ok(())
    }

    /// Resolves a name to a container id. A container another
    /// transaction is still creating does not exist here; one that is
    /// merely locked does.
    pub fn lookup_container(
        &self,
        stx: &Arc<SubTransaction>,
        name: &str,
    ) -> Result<ContainerId, SpaceError> {
        Self::ensure_running(stx)?;
        let id = self
            .read_names()
            .get(name)
            .copied()
            .ok_or_else(|| ContainerError::ContainerNotFound(name.to_string()))?;
        match self
            .isolation
            .check_container_availability(id, stx.transaction_id(), stx.id())
        {
            Availability::NotVisible(_) => Err(ContainerError::ContainerNotFound(name.to_string()).into()),
            _ => Ok(id),
        }
    }

    /// Locks a container exclusively for the calling transaction.
    pub fn lock_container(
        self: &Arc<Self>,
        stx: &Arc<SubTransaction>,
        id: ContainerId,
    ) -> Result<(), SpaceError> {
        Self::ensure_running(stx)?;
        match self
            .isolation
            .acquire_container_lock(ContainerLockKind::Lock, id, stx.transaction_id(), stx.id())?
        {
            LockOutcome::Acquired | LockOutcome::Skipped => {}
            LockOutcome::Conflict(_) => return Err(ContainerError::ContainerLocked.into()),
        }
        stx.add_log(LogItem::container_lock(
            id,
            Arc::clone(self),
            Arc::clone(&self.isolation),
            stx.transaction_id(),
            stx.id(),
        ));
        Ok(())
    }

    pub fn get_container(&self, id: ContainerId) -> Result<Arc<Container>, SpaceError> {
        self.read_containers()
            .get(&id)
            .cloned()
            .ok_or_else(|| ContainerError::InvalidContainer(id).into())
    }

    /// Removes the container from the registry and disposes it. Called
    /// when a destroy commits or a create rolls back.
    pub fn purge_container(&self, id: ContainerId) {
        let container = self.write_containers().remove(&id);
        if let Some(container) = container {
            if let Some(name) = container.name() {
                self.write_names().remove(name);
            }
            container.dispose();
        }
    }

    /// Ids of all registered containers.
    pub fn container_ids(&self) -> Vec<ContainerId> {
        self.read_containers().keys().copied().collect()
    }
}
