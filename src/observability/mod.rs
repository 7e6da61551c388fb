//! Observability for the space engine.
//!
//! This module provides:
//! - Structured logging (JSON, one line per event)
//! - Operation counters
//!
//! Observability is read-only: nothing here influences operation
//! outcomes, and a logging failure is never propagated to callers.

mod logger;
mod metrics;

pub use logger::{Logger, Severity};
pub use metrics::{SpaceMetrics, SpaceMetricsSnapshot};
