//! The linda coordinator: selection by template matching.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};

use serde_json::Value;

use crate::coordination::{
    attached, CoordinationError, CoordinationParam, Coordinator, CoordinatorContext,
    SelectionCriterion, SelectionError, SelectionView,
};
use crate::model::{EntryId, EntryRef, EntryValue};
use crate::transaction::SubTransaction;

/// The matchable fields of one entry type, computed from the first
/// payload of that type and cached for every later template.
struct TypeMatcher {
    fields: Vec<String>,
}

impl TypeMatcher {
    fn from_payload(payload: &EntryValue) -> Self {
        let fields = match payload.fields() {
            Value::Object(map) => map.keys().cloned().collect(),
            _ => Vec::new(),
        };
        TypeMatcher { fields }
    }

    /// Whether a template matches a payload of this type. Null or
    /// absent template fields are wildcards; a non-null template field
    /// must match the payload's field.
    fn matches(&self, template: &EntryValue, payload: &EntryValue) -> bool {
        if self.fields.is_empty() {
            // Non-object payloads match on the whole value.
            return value_matches(template.fields(), payload.fields());
        }
        self.fields.iter().all(|field| match template.field(field) {
            None | Some(Value::Null) => true,
            Some(expected) => payload
                .field(field)
                .is_some_and(|actual| value_matches(expected, actual)),
        })
    }
}

fn value_matches(template: &Value, actual: &Value) -> bool {
    match template {
        Value::Null => true,
        Value::Object(fields) => match actual {
            Value::Object(actual_fields) => fields.iter().all(|(key, template_field)| {
                actual_fields
                    .get(key)
                    .is_some_and(|actual_field| value_matches(template_field, actual_field))
            }),
            _ => false,
        },
        other => other == actual,
    }
}

/// Indexes entries by payload type and selects them with templates.
///
/// A template matches an entry of the same type whose fields equal
/// every non-null template field. The matchable fields of a type are
/// computed once, from the first payload seen, and cached.
pub struct LindaCoordinator {
    name: String,
    ctx: OnceLock<CoordinatorContext>,
    by_type: Mutex<HashMap<String, Vec<EntryRef>>>,
    matchers: Mutex<HashMap<String, Arc<TypeMatcher>>>,
}

impl LindaCoordinator {
    pub fn new(name: impl Into<String>) -> Self {
        LindaCoordinator {
            name: name.into(),
            ctx: OnceLock::new(),
            by_type: Mutex::new(HashMap::new()),
            matchers: Mutex::new(HashMap::new()),
        }
    }

    fn lock_index(&self) -> std::sync::MutexGuard<'_, HashMap<String, Vec<EntryRef>>> {
        match self.by_type.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn matcher_for(&self, type_name: &str, payload: &EntryValue) -> Arc<TypeMatcher> {
        let mut matchers = match self.matchers.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        Arc::clone(
            matchers
                .entry(type_name.to_string())
                .or_insert_with(|| Arc::new(TypeMatcher::from_payload(payload))),
        )
    }
}

impl Coordinator for LindaCoordinator {
    fn name(&self) -> &str {
        &self.name
    }

    fn attach(&self, ctx: CoordinatorContext) {
        let _ = self.ctx.set(ctx);
    }

    fn register(
        &self,
        _stx: &Arc<SubTransaction>,
        param: &CoordinationParam,
        entry: &EntryRef,
    ) -> Result<(), CoordinationError> {
        if !matches!(param, CoordinationParam::None) {
            return Err(CoordinationError::InvalidCoordinationData(
                "linda coordinator takes no parameter".to_string(),
            ));
        }
        self.lock_index()
            .entry(entry.type_name().to_string())
            .or_default()
            .push(Arc::clone(entry));
        Ok(())
    }

    fn unregister(&self, entry: &EntryRef) -> bool {
        let mut index = self.lock_index();
        let Some(bucket) = index.get_mut(entry.type_name()) else {
            return false;
        };
        let before = bucket.len();
        bucket.retain(|e| e != entry);
        let removed = bucket.len() < before;
        if bucket.is_empty() {
            index.remove(entry.type_name());
        }
        removed
    }

    fn view(&self, criterion: &SelectionCriterion) -> Result<Box<dyn SelectionView>, SelectionError> {
        let SelectionCriterion::Template(template) = criterion else {
            return Err(SelectionError::InvalidSelector(format!(
                "coordinator '{}' selects by template",
                self.name
            )));
        };
        let ctx = attached(&self.ctx, &self.name)
            .map_err(|_| SelectionError::CoordinatorNotRegistered(self.name.clone()))?;

        // Matching is decided against the payloads at view time.
        let candidates = self
            .lock_index()
            .get(template.type_name())
            .cloned()
            .unwrap_or_default();
        let matching: Vec<EntryRef> = candidates
            .into_iter()
            .filter(|entry| {
                ctx.payloads.get(entry.id()).is_some_and(|payload| {
                    self.matcher_for(entry.type_name(), payload.as_ref())
                        .matches(template, payload.as_ref())
                })
            })
            .collect();
        let ids = matching.iter().map(|e| e.id()).collect();
        Ok(Box::new(LindaView {
            entries: matching,
            ids,
        }))
    }

    fn clear(&self) {
        self.lock_index().clear();
        match self.matchers.lock() {
            Ok(mut guard) => guard.clear(),
            Err(poisoned) => poisoned.into_inner().clear(),
        }
    }
}

struct LindaView {
    entries: Vec<EntryRef>,
    ids: std::collections::HashSet<EntryId>,
}

impl SelectionView for LindaView {
    fn registered_count(&self) -> usize {
        self.entries.len()
    }

    fn slots(&self) -> Vec<Vec<EntryRef>> {
        self.entries.iter().cloned().map(|e| vec![e]).collect()
    }

    fn contains(&self, entry: &EntryRef) -> bool {
        self.ids.contains(&entry.id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn matcher(payload: &EntryValue) -> TypeMatcher {
        TypeMatcher::from_payload(payload)
    }

    #[test]
    fn null_template_fields_are_wildcards() {
        let payload = EntryValue::new("Order", json!({ "customer": "ada", "state": "open" }));
        let matching = EntryValue::new("Order", json!({ "customer": null, "state": "open" }));
        let wrong_state = EntryValue::new("Order", json!({ "customer": null, "state": "done" }));

        let matcher = matcher(&payload);
        assert!(matcher.matches(&matching, &payload));
        assert!(!matcher.matches(&wrong_state, &payload));
    }

    #[test]
    fn absent_template_fields_are_wildcards_too() {
        let payload = EntryValue::new("Order", json!({ "customer": "ada", "state": "open" }));
        let template = EntryValue::new("Order", json!({ "state": "open" }));
        assert!(matcher(&payload).matches(&template, &payload));
    }

    #[test]
    fn nested_objects_match_recursively() {
        let payload = EntryValue::new(
            "Order",
            json!({ "customer": { "city": "wien", "name": "ada" } }),
        );
        let template = EntryValue::new("Order", json!({ "customer": { "city": "wien" } }));
        assert!(matcher(&payload).matches(&template, &payload));
    }

    #[test]
    fn the_matcher_of_a_type_is_built_once() {
        let coordinator = LindaCoordinator::new("linda");
        let first = EntryValue::new("Order", json!({ "n": 1 }));
        let a = coordinator.matcher_for("Order", &first);
        let b = coordinator.matcher_for("Order", &EntryValue::new("Order", json!({ "m": 2 })));
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn scalar_payloads_compare_whole_values() {
        let payload = EntryValue::new("Tag", json!("urgent"));
        let matcher = matcher(&payload);
        assert!(matcher.matches(&EntryValue::new("Tag", json!("urgent")), &payload));
        assert!(!matcher.matches(&EntryValue::new("Tag", json!("idle")), &payload));
        assert!(matcher.matches(&EntryValue::new("Tag", json!(null)), &payload));
    }
}
