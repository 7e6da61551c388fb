//! Per-request context.

use std::collections::HashMap;

use uuid::Uuid;

/// Opaque context attached to every operation.
///
/// The engine threads it through unchanged so access managers and
/// coordinators can read caller-supplied properties from it.
#[derive(Debug, Clone)]
pub struct RequestContext {
    id: Uuid,
    properties: HashMap<String, serde_json::Value>,
}

impl RequestContext {
    pub fn new() -> Self {
        RequestContext {
            id: Uuid::new_v4(),
            properties: HashMap::new(),
        }
    }

    #[inline]
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn set_property(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.properties.insert(key.into(), value);
    }

    pub fn property(&self, key: &str) -> Option<&serde_json::Value> {
        self.properties.get(key)
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        RequestContext::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn properties_round_trip() {
        let mut context = RequestContext::new();
        context.set_property("user", json!("ada"));
        assert_eq!(context.property("user"), Some(&json!("ada")));
        assert_eq!(context.property("missing"), None);
    }
}
