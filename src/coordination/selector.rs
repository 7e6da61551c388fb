//! Selector chain evaluation.
//!
//! A read or take names a chain of selectors. The first stage walks
//! its coordinator's candidate order and checks every candidate's
//! accessibility; later stages only filter and reorder what the
//! previous stage produced. Accessibility is therefore decided exactly
//! once per entry.

use crate::coordination::{Matchmaker, SelectionError};
use crate::isolation::LockHolder;
use crate::model::{Count, EntryRef, EntryValue};

/// One link of a selection chain.
#[derive(Debug, Clone)]
pub struct Selector {
    coordinator: String,
    count: Count,
    criterion: SelectionCriterion,
}

impl Selector {
    pub fn new(coordinator: impl Into<String>, count: Count) -> Self {
        Selector {
            coordinator: coordinator.into(),
            count,
            criterion: SelectionCriterion::Any,
        }
    }

    pub fn with_criterion(
        coordinator: impl Into<String>,
        count: Count,
        criterion: SelectionCriterion,
    ) -> Self {
        Selector {
            coordinator: coordinator.into(),
            count,
            criterion,
        }
    }

    #[inline]
    pub fn coordinator(&self) -> &str {
        &self.coordinator
    }

    #[inline]
    pub fn count(&self) -> Count {
        self.count
    }

    #[inline]
    pub fn criterion(&self) -> &SelectionCriterion {
        &self.criterion
    }
}

/// What a selector asks its coordinator for.
#[derive(Debug, Clone)]
pub enum SelectionCriterion {
    /// No restriction, the coordinator's own order.
    Any,
    /// Entries under this label or key.
    Label(String),
    /// Vector entries starting at this index.
    Index(usize),
    /// Entries whose payload matches the template's non-null fields.
    Template(EntryValue),
    /// Entries whose payload satisfies the predicate.
    Query(Matchmaker),
}

/// How one entry presents itself to the selecting request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryAccess {
    Available,
    /// Locked by someone the requester does not pass.
    Locked(Option<LockHolder>),
    /// Forbidden by the access policy.
    Denied,
    /// Not visible to the requester; skipped as if absent.
    Invisible,
}

/// Snapshot view a coordinator produces for one selection stage.
pub trait SelectionView {
    /// How many entries the coordinator had registered under this
    /// criterion when the view was taken.
    fn registered_count(&self) -> usize;

    /// Candidate slots in the coordinator's order. Most coordinators
    /// put one entry per slot; a vector slot lists overwrite
    /// candidates of which the first accessible one counts.
    fn slots(&self) -> Vec<Vec<EntryRef>>;

    /// Whether the entry is in this view.
    fn contains(&self, entry: &EntryRef) -> bool;

    /// Whether an inaccessible entry fails the selection instead of
    /// being skipped.
    fn mandatory_for(&self, count: Count) -> bool {
        matches!(count, Count::All)
    }

    /// Whether the first stage stops at an inaccessible entry and
    /// returns the accessible prefix, queue semantics.
    fn halts_on_inaccessible(&self) -> bool {
        false
    }

    /// Whether a slot with no accessible entry ends the first stage,
    /// vector semantics.
    fn halts_on_empty_slot(&self) -> bool {
        false
    }

    /// Filters and orders a previous stage's output as a later stage.
    /// The default keeps the incoming order; ordered coordinators
    /// impose their own.
    fn narrow(&self, input: &[EntryRef]) -> Vec<EntryRef> {
        input.iter().filter(|e| self.contains(e)).cloned().collect()
    }
}

/// One prepared stage of a chain: the coordinator's view plus the
/// selector's count.
pub struct SelectionStage {
    pub view: Box<dyn SelectionView>,
    pub count: Count,
}

#[derive(Default)]
struct AccessTracker {
    locked: Option<Option<LockHolder>>,
    denied: bool,
}

impl AccessTracker {
    /// Turns a shortfall into the most telling error: a lock beats a
    /// denial beats a plain count miss.
    fn shortfall(&self, actual: usize, expected: usize) -> SelectionError {
        if let Some(holder) = self.locked {
            SelectionError::EntryLocked(holder)
        } else if self.denied {
            SelectionError::AccessDenied
        } else {
            SelectionError::CountNotMet { actual, expected }
        }
    }
}

fn expected(count: Count, registered: usize) -> Option<usize> {
    match count {
        Count::Exact(n) => Some(n),
        Count::All => Some(registered),
        Count::Max => None,
    }
}

/// Evaluates a prepared chain against a per-entry accessibility check.
pub fn evaluate(
    stages: &[SelectionStage],
    access: &mut dyn FnMut(&EntryRef) -> EntryAccess,
) -> Result<Vec<EntryRef>, SelectionError> {
    let Some((first, rest)) = stages.split_first() else {
        return Ok(Vec::new());
    };

    let mut result = select_first_stage(first, access)?;

    for stage in rest {
        let narrowed = stage.view.narrow(&result);
        if let Some(expected) = expected(stage.count, stage.view.registered_count()) {
            if narrowed.len() < expected {
                return Err(SelectionError::CountNotMet {
                    actual: narrowed.len(),
                    expected,
                });
            }
        }
        result = match stage.count {
            Count::Exact(n) => narrowed.into_iter().take(n).collect(),
            Count::All | Count::Max => narrowed,
        };
    }

    Ok(result)
}

fn select_first_stage(
    stage: &SelectionStage,
    access: &mut dyn FnMut(&EntryRef) -> EntryAccess,
) -> Result<Vec<EntryRef>, SelectionError> {
    let view = stage.view.as_ref();
    let mandatory = view.mandatory_for(stage.count);
    let expected = expected(stage.count, view.registered_count());
    let mut tracker = AccessTracker::default();
    let mut result = Vec::new();

    for slot in view.slots() {
        if expected.is_some_and(|n| result.len() >= n) {
            break;
        }
        let mut added = false;
        let mut slot_blocked = false;
        for entry in slot {
            match access(&entry) {
                EntryAccess::Available => {
                    result.push(entry);
                    added = true;
                    break;
                }
                EntryAccess::Invisible => {}
                EntryAccess::Locked(holder) => {
                    if mandatory {
                        return Err(SelectionError::EntryLocked(holder));
                    }
                    tracker.locked.get_or_insert(holder);
                    slot_blocked = true;
                }
                EntryAccess::Denied => {
                    if mandatory {
                        return Err(SelectionError::AccessDenied);
                    }
                    tracker.denied = true;
                    slot_blocked = true;
                }
            }
        }
        if !added {
            if view.halts_on_empty_slot() {
                break;
            }
            if slot_blocked && view.halts_on_inaccessible() {
                break;
            }
        }
    }

    if let Some(expected) = expected {
        if result.len() < expected {
            return Err(tracker.shortfall(result.len(), expected));
        }
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ContainerId, EntryHandle, EntryId};
    use std::sync::Arc;

    struct ListView {
        entries: Vec<EntryRef>,
        halt_inaccessible: bool,
        mandatory_below_max: bool,
    }

    impl SelectionView for ListView {
        fn registered_count(&self) -> usize {
            self.entries.len()
        }

        fn slots(&self) -> Vec<Vec<EntryRef>> {
            self.entries.iter().cloned().map(|e| vec![e]).collect()
        }

        fn contains(&self, entry: &EntryRef) -> bool {
            self.entries.contains(entry)
        }

        fn mandatory_for(&self, count: Count) -> bool {
            if self.mandatory_below_max {
                !matches!(count, Count::Max)
            } else {
                matches!(count, Count::All)
            }
        }

        fn halts_on_inaccessible(&self) -> bool {
            self.halt_inaccessible
        }
    }

    fn entry(id: u64) -> EntryRef {
        Arc::new(EntryHandle::new(EntryId::new(id), ContainerId::new(1), "T"))
    }

    fn stage(ids: &[u64], count: Count) -> SelectionStage {
        SelectionStage {
            view: Box::new(ListView {
                entries: ids.iter().copied().map(entry).collect(),
                halt_inaccessible: false,
                mandatory_below_max: false,
            }),
            count,
        }
    }

    #[test]
    fn exact_count_takes_a_prefix_of_accessible_entries() {
        let stages = [stage(&[1, 2, 3], Count::Exact(2))];
        let result = evaluate(&stages, &mut |_| EntryAccess::Available).unwrap();
        assert_eq!(result.len(), 2);
        assert_eq!(result[0].id(), EntryId::new(1));
    }

    #[test]
    fn locked_entries_are_skipped_under_exact_counts() {
        let stages = [stage(&[1, 2, 3], Count::Exact(2))];
        let result = evaluate(&stages, &mut |e| {
            if e.id() == EntryId::new(1) {
                EntryAccess::Locked(None)
            } else {
                EntryAccess::Available
            }
        })
        .unwrap();
        assert_eq!(result.len(), 2);
        assert_eq!(result[0].id(), EntryId::new(2));
    }

    #[test]
    fn count_all_fails_fast_on_a_locked_entry() {
        let stages = [stage(&[1, 2], Count::All)];
        let err = evaluate(&stages, &mut |e| {
            if e.id() == EntryId::new(2) {
                EntryAccess::Locked(None)
            } else {
                EntryAccess::Available
            }
        })
        .unwrap_err();
        assert!(matches!(err, SelectionError::EntryLocked(_)));
    }

    #[test]
    fn shortfall_prefers_lock_over_count() {
        let stages = [stage(&[1, 2], Count::Exact(2))];
        let err = evaluate(&stages, &mut |e| {
            if e.id() == EntryId::new(2) {
                EntryAccess::Locked(None)
            } else {
                EntryAccess::Available
            }
        })
        .unwrap_err();
        assert!(matches!(err, SelectionError::EntryLocked(_)));
    }

    #[test]
    fn plain_shortfall_is_count_not_met() {
        let stages = [stage(&[1], Count::Exact(2))];
        let err = evaluate(&stages, &mut |_| EntryAccess::Available).unwrap_err();
        assert_eq!(err, SelectionError::CountNotMet { actual: 1, expected: 2 });
    }

    #[test]
    fn invisible_entries_never_fail_a_mandatory_stage() {
        let stages = [stage(&[1, 2], Count::Max)];
        let result = evaluate(&stages, &mut |e| {
            if e.id() == EntryId::new(1) {
                EntryAccess::Invisible
            } else {
                EntryAccess::Available
            }
        })
        .unwrap();
        assert_eq!(result.len(), 1);
    }

    #[test]
    fn halting_view_returns_the_accessible_prefix() {
        let stages = [SelectionStage {
            view: Box::new(ListView {
                entries: [1, 2, 3].iter().map(|&n| entry(n)).collect(),
                halt_inaccessible: true,
                mandatory_below_max: true,
            }),
            count: Count::Max,
        }];
        let result = evaluate(&stages, &mut |e| {
            if e.id() == EntryId::new(2) {
                EntryAccess::Locked(None)
            } else {
                EntryAccess::Available
            }
        })
        .unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].id(), EntryId::new(1));
    }

    #[test]
    fn later_stages_filter_without_access_checks(){
        let mut checks = 0;
        let stages = [stage(&[1, 2, 3], Count::Max), stage(&[2, 3, 4], Count::Max)];
        let result = evaluate(&stages, &mut |_| {
            checks += 1;
            EntryAccess::Available
        })
        .unwrap();
        assert_eq!(checks, 3);
        assert_eq!(result.len(), 2);
        assert_eq!(result[0].id(), EntryId::new(2));
    }
}
