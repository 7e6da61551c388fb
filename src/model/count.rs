//! Selection count semantics.

use serde::{Deserialize, Serialize};

/// How many entries a selector must yield.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Count {
    /// Exactly this many entries; fewer is a count shortfall.
    Exact(usize),
    /// Every entry the coordinator has registered; inaccessible
    /// entries make the selection fail rather than shrink.
    All,
    /// As many entries as are currently accessible, possibly zero.
    Max,
}
