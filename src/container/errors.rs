//! Container errors.

use thiserror::Error;

use crate::model::{ContainerId, EntryId};

// ============================================================
// Container Errors
// ============================================================

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContainerError {
    /// The container was destroyed or never existed.
    #[error("container {0} is not valid")]
    InvalidContainer(ContainerId),

    /// No container is bound to this name.
    #[error("no container named '{0}'")]
    ContainerNotFound(String),

    /// The name is already bound to a living container.
    #[error("container name '{0}' is taken")]
    ContainerNameTaken(String),

    /// An empty or otherwise unusable container name.
    #[error("invalid container name '{0}'")]
    InvalidContainerName(String),

    /// A container needs at least one coordinator.
    #[error("container has no coordinators")]
    NoCoordinators,

    /// Two coordinators with the same name at one container.
    #[error("duplicate coordinator name '{0}'")]
    DuplicateCoordinator(String),

    /// The bounded container holds its maximum number of entries.
    #[error("container is full")]
    ContainerFull,

    /// The container is locked by another transaction.
    #[error("container is locked")]
    ContainerLocked,

    /// A selected entry is locked by another transaction.
    #[error("entry is locked")]
    EntryLocked,

    /// The access policy forbids the operation.
    #[error("access denied")]
    AccessDenied,

    /// A selected entry has no stored payload, the container state is
    /// inconsistent.
    #[error("payload of entry {0} is missing")]
    EntryPayloadMissing(EntryId),
}
