//! Storage abstraction.
//!
//! This module provides:
//! - `StoredMap` - the key-value map interface coordinators and
//!   containers persist their state through
//! - `InMemoryStoredMap` - the in-memory profile
//! - `StorageContext` - factory handing out named maps
//! - `PayloadStore` / `PayloadCache` - entry payloads with a bounded,
//!   explicitly evicted cache in front

mod cache;
mod map;
mod payloads;

pub use cache::PayloadCache;
pub use map::{InMemoryStoredMap, StorageContext, StoredMap};
pub use payloads::PayloadStore;
