//! Coordination data attached to writes.

use serde::{Deserialize, Serialize};

/// Position parameter for vector coordinators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VectorIndex {
    /// Behind the current last element.
    Append,
    /// At this position, shifting later elements.
    At(usize),
}

/// The per-coordinator parameter of one write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CoordinationParam {
    /// The coordinator needs no parameter.
    None,
    /// A label for label coordinators.
    Label(String),
    /// A unique key for key coordinators.
    Key(String),
    /// A position for vector coordinators.
    Index(VectorIndex),
}

/// Names the coordinator a write registers at, with its parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoordinationData {
    coordinator: String,
    param: CoordinationParam,
}

impl CoordinationData {
    pub fn new(coordinator: impl Into<String>) -> Self {
        CoordinationData {
            coordinator: coordinator.into(),
            param: CoordinationParam::None,
        }
    }

    pub fn with_label(coordinator: impl Into<String>, label: impl Into<String>) -> Self {
        CoordinationData {
            coordinator: coordinator.into(),
            param: CoordinationParam::Label(label.into()),
        }
    }

    pub fn with_key(coordinator: impl Into<String>, key: impl Into<String>) -> Self {
        CoordinationData {
            coordinator: coordinator.into(),
            param: CoordinationParam::Key(key.into()),
        }
    }

    pub fn with_index(coordinator: impl Into<String>, index: VectorIndex) -> Self {
        CoordinationData {
            coordinator: coordinator.into(),
            param: CoordinationParam::Index(index),
        }
    }

    #[inline]
    pub fn coordinator(&self) -> &str {
        &self.coordinator
    }

    #[inline]
    pub fn param(&self) -> &CoordinationParam {
        &self.param
    }
}
