//! Containers.
//!
//! This module provides:
//! - `Container` - a bounded, coordinated entry collection and the
//!   write/read/take flows against it
//! - `ContainerManager` - the container registry and its lifecycle
//!   operations
//!
//! Every flow is all-or-nothing at the sub-transaction level: a step
//! that fails after earlier steps took locks or registered entries
//! undoes those steps synchronously before it reports the failure.

mod container;
mod errors;
mod manager;

pub use container::{Container, ContainerStatsSnapshot};
pub use errors::ContainerError;
pub use manager::ContainerManager;
