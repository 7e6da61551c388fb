//! Crate-wide error type and operation status mapping.

use thiserror::Error;

use crate::container::ContainerError;
use crate::coordination::{CoordinationError, SelectionError};
use crate::isolation::IsolationError;
use crate::transaction::TransactionError;

/// How an operation ended, beyond plain success.
///
/// A caller decides from the status whether retrying can help:
/// `Locked` clears when the holding transaction finishes, `Delayable`
/// clears when the space content changes, `NotOk` never clears.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationStatus {
    Ok,
    NotOk,
    Locked,
    Delayable,
}

/// Any failure an operation can report.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SpaceError {
    #[error(transparent)]
    Container(#[from] ContainerError),

    #[error(transparent)]
    Coordination(#[from] CoordinationError),

    #[error(transparent)]
    Selection(#[from] SelectionError),

    #[error(transparent)]
    Isolation(#[from] IsolationError),

    #[error(transparent)]
    Transaction(#[from] TransactionError),
}

impl SpaceError {
    /// The status category this failure falls into.
    pub fn status(&self) -> OperationStatus {
        match self {
            SpaceError::Container(e) => match e {
                ContainerError::ContainerFull => OperationStatus::Delayable,
                ContainerError::ContainerLocked | ContainerError::EntryLocked => OperationStatus::Locked,
                _ => OperationStatus::NotOk,
            },
            SpaceError::Coordination(e) => match e {
                CoordinationError::DuplicateKey(_) => OperationStatus::Delayable,
                CoordinationError::CoordinatorLocked => OperationStatus::Locked,
                _ => OperationStatus::NotOk,
            },
            SpaceError::Selection(e) => match e {
                SelectionError::CountNotMet { .. } => OperationStatus::Delayable,
                SelectionError::EntryLocked(_) => OperationStatus::Locked,
                _ => OperationStatus::NotOk,
            },
            SpaceError::Isolation(e) => match e {
                // A selected entry vanished mid-operation; it was taken
                // by a concurrent transaction, so waiting makes sense.
                IsolationError::InvalidEntry(_) => OperationStatus::Locked,
                _ => OperationStatus::NotOk,
            },
            SpaceError::Transaction(_) => OperationStatus::NotOk,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_failures_are_not_notok() {
        assert_eq!(
            SpaceError::from(ContainerError::ContainerFull).status(),
            OperationStatus::Delayable
        );
        assert_eq!(
            SpaceError::from(CoordinationError::DuplicateKey("k".to_string())).status(),
            OperationStatus::Delayable
        );
        assert_eq!(
            SpaceError::from(SelectionError::CountNotMet { actual: 0, expected: 1 }).status(),
            OperationStatus::Delayable
        );
        assert_eq!(
            SpaceError::from(SelectionError::EntryLocked(None)).status(),
            OperationStatus::Locked
        );
        assert_eq!(
            SpaceError::from(ContainerError::AccessDenied).status(),
            OperationStatus::NotOk
        );
    }
}
