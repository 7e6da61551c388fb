//! Access control seam.
//!
//! This module provides:
//! - `AccessManager` - the pluggable authorization interface
//! - `AuthorizationResult` - a default verdict plus per-entry exceptions
//! - `PermitAll` - the open policy used when no manager is configured
//!
//! Authorization is checked once per operation and the result is then
//! consulted per entry during selection, so a policy change mid-select
//! cannot split one operation's view.

use std::collections::HashSet;

use crate::model::{ContainerId, EntryId, OperationType, RequestContext, TransactionId};

/// Outcome of an authorization check: a default verdict for the
/// operation and the set of entries that invert it.
#[derive(Debug, Clone)]
pub struct AuthorizationResult {
    permitted_default: bool,
    exceptions: HashSet<EntryId>,
}

impl AuthorizationResult {
    pub fn permit_all() -> Self {
        AuthorizationResult {
            permitted_default: true,
            exceptions: HashSet::new(),
        }
    }

    pub fn deny_all() -> Self {
        AuthorizationResult {
            permitted_default: false,
            exceptions: HashSet::new(),
        }
    }

    pub fn new(permitted_default: bool, exceptions: HashSet<EntryId>) -> Self {
        AuthorizationResult {
            permitted_default,
            exceptions,
        }
    }

    /// Whether the operation as a whole is permitted to proceed.
    /// True when the default permits or any exception could permit.
    pub fn operation_permitted(&self) -> bool {
        self.permitted_default || !self.exceptions.is_empty()
    }

    /// Verdict for one entry.
    pub fn entry_permitted(&self, entry: EntryId) -> bool {
        if self.exceptions.contains(&entry) {
            !self.permitted_default
        } else {
            self.permitted_default
        }
    }
}

/// Pluggable authorization policy.
pub trait AccessManager: Send + Sync {
    /// Decides whether `tx` may perform `op` on the container, with
    /// optional per-entry exceptions.
    fn check_permissions(
        &self,
        container: ContainerId,
        op: OperationType,
        tx: TransactionId,
        context: &RequestContext,
    ) -> AuthorizationResult;
}

/// The open policy: everything is allowed.
#[derive(Debug, Default)]
pub struct PermitAll;

impl AccessManager for PermitAll {
    fn check_permissions(
        &self,
        _container: ContainerId,
        _op: OperationType,
        _tx: TransactionId,
        _context: &RequestContext,
    ) -> AuthorizationResult {
        AuthorizationResult::permit_all()
    }
}
