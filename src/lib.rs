//! spacecore - a transactional tuple-space coordination engine
//!
//! Entries are written into named, concurrently shared containers and
//! selected back out through chains of coordinator-specific selectors,
//! all under pessimistic entry- and container-level isolation.

pub mod access;
pub mod config;
pub mod container;
pub mod coordination;
pub mod error;
pub mod isolation;
pub mod model;
pub mod observability;
pub mod space;
pub mod storage;
pub mod transaction;
