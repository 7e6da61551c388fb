//! The space facade.
//!
//! Ties the container registry, isolation and transactions together
//! behind one entry point. Every operation runs in its own
//! sub-transaction of the caller's transaction: the sub-transaction
//! commits when the operation succeeds and rolls back when it fails,
//! so a failed operation leaves no trace while the transaction lives
//! on.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::access::AccessManager;
use crate::config::SpaceConfig;
use crate::container::ContainerManager;
use crate::coordination::{CoordinationData, Coordinator, Selector};
use crate::error::SpaceError;
use crate::isolation::IsolationManager;
use crate::model::{
    ContainerId, EntryId, EntryIdAllocator, EntryValue, IsolationLevel, RequestContext,
    TransactionId,
};
use crate::observability::{Logger, SpaceMetrics, SpaceMetricsSnapshot};
use crate::transaction::{SubTransaction, Transaction};

/// One space instance.
pub struct Space {
    config: SpaceConfig,
    isolation: Arc<IsolationManager>,
    manager: Arc<ContainerManager>,
    next_tx: AtomicU64,
    metrics: SpaceMetrics,
}

impl Space {
    pub fn new(config: SpaceConfig) -> Self {
        let isolation = Arc::new(IsolationManager::new());
        let allocator = Arc::new(EntryIdAllocator::new());
        let manager = ContainerManager::new(
            Arc::clone(&isolation),
            allocator,
            config.payload_cache_capacity,
        );
        Space {
            config,
            isolation,
            manager,
            next_tx: AtomicU64::new(1),
            metrics: SpaceMetrics::new(),
        }
    }

    pub fn with_defaults() -> Self {
        Space::new(SpaceConfig::default())
    }

    pub fn metrics(&self) -> SpaceMetricsSnapshot {
        self.metrics.snapshot()
    }

    fn log(&self, event: &str, fields: &[(&str, &str)]) {
        if self.config.log_operations {
            Logger::info(event, fields);
        }
    }

    // ------------------------------------------------------------
    // Transactions
    // ------------------------------------------------------------

    pub fn create_transaction(&self) -> Arc<Transaction> {
        let id = TransactionId::new(self.next_tx.fetch_add(1, Ordering::Relaxed));
        self.log("TX_STARTED", &[("tx", &id.to_string())]);
        Transaction::new(id)
    }

    pub fn commit_transaction(&self, tx: &Arc<Transaction>) -> Result<(), SpaceError> {
        tx.lock_and_wait_for_sub_transactions();
        tx.commit()?;
        self.metrics.increment_transactions_committed();
        self.log(
            "TX_COMMITTED",
            &[
                ("containers", &tx.accessed_containers().len().to_string()),
                ("tx", &tx.id().to_string()),
            ],
        );
        Ok(())
    }

    pub fn rollback_transaction(&self, tx: &Arc<Transaction>) -> Result<(), SpaceError> {
        tx.lock_and_wait_for_sub_transactions();
        tx.rollback()?;
        self.metrics.increment_transactions_rolled_back();
        self.log(
            "TX_ROLLED_BACK",
            &[
                ("containers", &tx.accessed_containers().len().to_string()),
                ("tx", &tx.id().to_string()),
            ],
        );
        Ok(())
    }

    /// Runs one operation in a fresh sub-transaction, committing it on
    /// success and rolling it back on failure.
    fn in_sub_transaction<T>(
        &self,
        tx: &Arc<Transaction>,
        op: impl FnOnce(&Arc<SubTransaction>) -> Result<T, SpaceError>,
    ) -> Result<T, SpaceError> {
        let stx = tx.new_sub_transaction()?;
        match op(&stx) {
            Ok(value) => {
                stx.commit()?;
                Ok(value)
            }
            Err(e) => {
                stx.rollback()?;
                Err(e)
            }
        }
    }

    // ------------------------------------------------------------
    // Containers
    // ------------------------------------------------------------

    #[allow(clippy::too_many_arguments)]
    pub fn create_container(
        &self,
        tx: &Arc<Transaction>,
        name: Option<String>,
        obligatory: Vec<Arc<dyn Coordinator>>,
        optional: Vec<Arc<dyn Coordinator>>,
        capacity: Option<usize>,
        access: Option<Arc<dyn AccessManager>>,
    ) -> Result<ContainerId, SpaceError> {
        let capacity = capacity.or(self.config.default_container_capacity);
        let id = self.in_sub_transaction(tx, |stx| {
            self.manager
                .create_container(stx, name.clone(), obligatory, optional, capacity, access)
        })?;
        self.metrics.increment_containers_created();
        self.log(
            "CONTAINER_CREATED",
            &[
                ("container", &id.to_string()),
                ("name", name.as_deref().unwrap_or("")),
                ("tx", &tx.id().to_string()),
            ],
        );
        Ok(id)
    }

    pub fn destroy_container(&self, tx: &Arc<Transaction>, id: ContainerId) -> Result<(), SpaceError> {
        self.in_sub_transaction(tx, |stx| self.manager.destroy_container(stx, id))?;
        self.metrics.increment_containers_destroyed();
        self.log(
            "CONTAINER_DESTROYED",
            &[("container", &id.to_string()), ("tx", &tx.id().to_string())],
        );
        Ok(())
    }

    pub fn lookup_container(&self, tx: &Arc<Transaction>, name: &str) -> Result<ContainerId, SpaceError> {
        self.in_sub_transaction(tx, |stx| self.manager.lookup_container(stx, name))
    }

    pub fn lock_container(&self, tx: &Arc<Transaction>, id: ContainerId) -> Result<(), SpaceError> {
        self.in_sub_transaction(tx, |stx| self.manager.lock_container(stx, id))
    }

    // ------------------------------------------------------------
    // Entries
    // ------------------------------------------------------------

    pub fn write(
        &self,
        tx: &Arc<Transaction>,
        container: ContainerId,
        value: EntryValue,
        coordination: &[CoordinationData],
        context: &RequestContext,
    ) -> Result<EntryId, SpaceError> {
        let result = self.in_sub_transaction(tx, move |stx| {
            let container = self.manager.get_container(container)?;
            container.write(stx, value, coordination, context)
        });
        self.metrics.record_write(result.is_ok());
        match &result {
            Ok(id) => self.log(
                "ENTRY_WRITTEN",
                &[
                    ("container", &container.to_string()),
                    ("entry", &id.to_string()),
                    ("tx", &tx.id().to_string()),
                ],
            ),
            Err(e) => self.log_failure("WRITE_FAILED", container, tx, e),
        }
        result
    }

    pub fn read(
        &self,
        tx: &Arc<Transaction>,
        container: ContainerId,
        selectors: &[Selector],
        level: Option<IsolationLevel>,
        context: &RequestContext,
    ) -> Result<Vec<Arc<EntryValue>>, SpaceError> {
        let level = level.unwrap_or(self.config.default_isolation_level);
        let result = self.in_sub_transaction(tx, |stx| {
            let container = self.manager.get_container(container)?;
            container.read(stx, selectors, level, context)
        });
        self.metrics.record_read(result.is_ok());
        match &result {
            Ok(entries) => self.log(
                "ENTRIES_READ",
                &[
                    ("container", &container.to_string()),
                    ("count", &entries.len().to_string()),
                    ("tx", &tx.id().to_string()),
                ],
            ),
            Err(e) => self.log_failure("READ_FAILED", container, tx, e),
        }
        result
    }

    pub fn take(
        &self,
        tx: &Arc<Transaction>,
        container: ContainerId,
        selectors: &[Selector],
        level: Option<IsolationLevel>,
        context: &RequestContext,
    ) -> Result<Vec<Arc<EntryValue>>, SpaceError> {
        let level = level.unwrap_or(self.config.default_isolation_level);
        let result = self.in_sub_transaction(tx, |stx| {
            let container = self.manager.get_container(container)?;
            container.take(stx, selectors, level, context)
        });
        self.metrics.record_take(result.is_ok());
        match &result {
            Ok(entries) => self.log(
                "ENTRIES_TAKEN",
                &[
                    ("container", &container.to_string()),
                    ("count", &entries.len().to_string()),
                    ("tx", &tx.id().to_string()),
                ],
            ),
            Err(e) => self.log_failure("TAKE_FAILED", container, tx, e),
        }
        result
    }

    fn log_failure(&self, event: &str, container: ContainerId, tx: &Arc<Transaction>, error: &SpaceError) {
        if self.config.log_operations {
            Logger::warn(
                event,
                &[
                    ("container", &container.to_string()),
                    ("error", &error.to_string()),
                    ("status", &format!("{:?}", error.status())),
                    ("tx", &tx.id().to_string()),
                ],
            );
        }
    }

    /// The underlying isolation manager, for embedders that plug in
    /// their own blocking or retry layer.
    pub fn isolation(&self) -> &Arc<IsolationManager> {
        &self.isolation
    }

    /// The container registry.
    pub fn containers(&self) -> &Arc<ContainerManager> {
        &self.manager
    }
}

impl Default for Space {
    fn default() -> Self {
        Space::with_defaults()
    }
}
