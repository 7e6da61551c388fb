//! Pessimistic isolation.
//!
//! This module provides:
//! - `LockHolder` / `LockState` - per-object lock words
//! - `Availability` - the three-valued visibility verdict
//! - `IsolationManager` - lock tables for entries and containers
//!
//! Locks are held by a transaction together with the sub-transaction
//! that took them. While the sub-transaction runs, only that
//! sub-transaction may pass the lock; when it commits, the lock is
//! surrendered to the parent transaction and every later
//! sub-transaction of the same transaction passes it.

mod availability;
mod errors;
mod locks;
mod manager;

pub use availability::{Availability, LockHolder};
pub use errors::IsolationError;
pub use locks::{LockKind, LockState};
pub use manager::{ContainerLockKind, IsolationManager, LockOutcome};
