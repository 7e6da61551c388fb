//! The query coordinator: selection by field predicates.

use std::sync::{Arc, Mutex, OnceLock};

use regex::Regex;
use serde_json::Value;

use crate::coordination::{
    attached, CoordinationError, CoordinationParam, Coordinator, CoordinatorContext,
    SelectionCriterion, SelectionError, SelectionView,
};
use crate::model::{EntryId, EntryRef, EntryValue};
use crate::transaction::SubTransaction;

/// A predicate over entry payload fields, addressed by dotted paths.
#[derive(Debug, Clone)]
pub enum Matchmaker {
    Eq(String, Value),
    Ne(String, Value),
    Lt(String, Value),
    Le(String, Value),
    Gt(String, Value),
    Ge(String, Value),
    Between(String, Value, Value),
    /// Field matches the compiled regular expression.
    Matches(String, Regex),
    /// Field exists, whatever its value.
    Exists(String),
    And(Vec<Matchmaker>),
    Or(Vec<Matchmaker>),
    Not(Box<Matchmaker>),
}

fn compare(actual: &Value, expected: &Value) -> Option<std::cmp::Ordering> {
    match (actual, expected) {
        (Value::Number(a), Value::Number(b)) => a.as_f64().partial_cmp(&b.as_f64()),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

impl Matchmaker {
    /// Builds a regex predicate, refusing an invalid pattern.
    pub fn matching(path: impl Into<String>, pattern: &str) -> Result<Self, CoordinationError> {
        let regex = Regex::new(pattern)
            .map_err(|e| CoordinationError::InvalidQuery(e.to_string()))?;
        Ok(Matchmaker::Matches(path.into(), regex))
    }

    /// Whether the payload satisfies the predicate. Comparisons on
    /// missing fields or mismatched types are false, not errors.
    pub fn matches(&self, payload: &EntryValue) -> bool {
        match self {
            Matchmaker::Eq(path, expected) => payload.field(path) == Some(expected),
            Matchmaker::Ne(path, expected) => {
                payload.field(path).is_some_and(|actual| actual != expected)
            }
            Matchmaker::Lt(path, expected) => Self::ordered(payload, path, expected, |o| o.is_lt()),
            Matchmaker::Le(path, expected) => Self::ordered(payload, path, expected, |o| o.is_le()),
            Matchmaker::Gt(path, expected) => Self::ordered(payload, path, expected, |o| o.is_gt()),
            Matchmaker::Ge(path, expected) => Self::ordered(payload, path, expected, |o| o.is_ge()),
            Matchmaker::Between(path, low, high) => {
                Self::ordered(payload, path, low, |o| o.is_ge())
                    && Self::ordered(payload, path, high, |o| o.is_le())
            }
            Matchmaker::Matches(path, regex) => payload
                .field(path)
                .and_then(Value::as_str)
                .is_some_and(|s| regex.is_match(s)),
            Matchmaker::Exists(path) => payload.field(path).is_some(),
            Matchmaker::And(all) => all.iter().all(|m| m.matches(payload)),
            Matchmaker::Or(any) => any.iter().any(|m| m.matches(payload)),
            Matchmaker::Not(inner) => !inner.matches(payload),
        }
    }

    fn ordered(
        payload: &EntryValue,
        path: &str,
        expected: &Value,
        accept: fn(std::cmp::Ordering) -> bool,
    ) -> bool {
        payload
            .field(path)
            .and_then(|actual| compare(actual, expected))
            .is_some_and(accept)
    }
}

/// Keeps registered entries in insertion order and selects the ones
/// whose payload satisfies a predicate.
pub struct QueryCoordinator {
    name: String,
    ctx: OnceLock<CoordinatorContext>,
    entries: Mutex<Vec<EntryRef>>,
}

impl QueryCoordinator {
    pub fn new(name: impl Into<String>) -> Self {
        QueryCoordinator {
            name: name.into(),
            ctx: OnceLock::new(),
            entries: Mutex::new(Vec::new()),
        }
    }

    fn lock_entries(&self) -> std::sync::MutexGuard<'_, Vec<EntryRef>> {
        match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Coordinator for QueryCoordinator {
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
                "query coordinator takes no parameter".to_string(),
            ));
        }
        self.lock_entries().push(Arc::clone(entry));
        Ok(())
    }

    fn unregister(&self, entry: &EntryRef) -> bool {
        let mut entries = self.lock_entries();
        let before = entries.len();
        entries.retain(|e| e != entry);
        entries.len() < before
    }

    fn view(&self, criterion: &SelectionCriterion) -> Result<Box<dyn SelectionView>, SelectionError> {
        let SelectionCriterion::Query(matchmaker) = criterion else {
            return Err(SelectionError::InvalidSelector(format!(
                "coordinator '{}' selects by query",
                self.name
            )));
        };
        let ctx = attached(&self.ctx, &self.name)
            .map_err(|_| SelectionError::CoordinatorNotRegistered(self.name.clone()))?;

        let matching: Vec<EntryRef> = self
            .lock_entries()
            .iter()
            .filter(|entry| {
                ctx.payloads
                    .get(entry.id())
                    .is_some_and(|payload| matchmaker.matches(payload.as_ref()))
            })
            .cloned()
            .collect();
        let ids = matching.iter().map(|e| e.id()).collect();
        Ok(Box::new(QueryView {
            entries: matching,
            ids,
        }))
    }

    fn clear(&self) {
        self.lock_entries().clear();
    }
}

struct QueryView {
    entries: Vec<EntryRef>,
    ids: std::collections::HashSet<EntryId>,
}

impl SelectionView for QueryView {
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

    fn order(amount: u64, state: &str) -> EntryValue {
        EntryValue::new("Order", json!({ "amount": amount, "state": state }))
    }

    #[test]
    fn comparisons_follow_field_values() {
        let payload = order(50, "open");
        assert!(Matchmaker::Eq("state".to_string(), json!("open")).matches(&payload));
        assert!(Matchmaker::Gt("amount".to_string(), json!(10)).matches(&payload));
        assert!(!Matchmaker::Lt("amount".to_string(), json!(10)).matches(&payload));
        assert!(Matchmaker::Between("amount".to_string(), json!(10), json!(100)).matches(&payload));
    }

    #[test]
    fn missing_fields_and_type_mismatches_are_false() {
        let payload = order(50, "open");
        assert!(!Matchmaker::Gt("missing".to_string(), json!(1)).matches(&payload));
        assert!(!Matchmaker::Gt("state".to_string(), json!(1)).matches(&payload));
        assert!(Matchmaker::Exists("state".to_string()).matches(&payload));
        assert!(!Matchmaker::Exists("missing".to_string()).matches(&payload));
    }

    #[test]
    fn boolean_combinators_compose() {
        let payload = order(50, "open");
        let open_and_small = Matchmaker::And(vec![
            Matchmaker::Eq("state".to_string(), json!("open")),
            Matchmaker::Lt("amount".to_string(), json!(100)),
        ]);
        assert!(open_and_small.matches(&payload));
        assert!(!Matchmaker::Not(Box::new(open_and_small)).matches(&payload));
    }

    #[test]
    fn regex_predicates_validate_their_pattern() {
        let valid = Matchmaker::matching("state", "^op.*$").unwrap();
        assert!(valid.matches(&order(1, "open")));
        assert!(Matchmaker::matching("state", "(").is_err());
    }
}
