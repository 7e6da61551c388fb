//! Selection count semantics.
//!
//! `Exact` demands, `All` demands everything registered, `Max` takes
//! what it can get. A shortfall caused by a lock reports as locked,
//! one caused by plain absence reports as a count miss the caller may
//! retry later.

use std::sync::Arc;

use serde_json::json;
use spacecore::coordination::{
    AnyCoordinator, Coordinator, Matchmaker, QueryCoordinator, QueueCoordinator,
    SelectionCriterion, Selector,
};
use spacecore::error::OperationStatus;
use spacecore::model::{ContainerId, Count, EntryValue, RequestContext};
use spacecore::space::Space;

fn item(n: u64) -> EntryValue {
    EntryValue::new("Item", json!({ "n": n }))
}

fn numbers(entries: &[Arc<EntryValue>]) -> Vec<u64> {
    entries
        .iter()
        .map(|e| e.field("n").and_then(|v| v.as_u64()).unwrap())
        .collect()
}

fn space_with(coordinator: Arc<dyn Coordinator>, prefill: u64) -> (Space, ContainerId) {
    let space = Space::with_defaults();
    let ctx = RequestContext::new();
    let tx = space.create_transaction();
    let id = space
        .create_container(&tx, None, vec![coordinator], vec![], None, None)
        .unwrap();
    for n in 1..=prefill {
        space.write(&tx, id, item(n), &[], &ctx).unwrap();
    }
    space.commit_transaction(&tx).unwrap();
    (space, id)
}

// =============================================================================
// SHORTFALLS
// =============================================================================

#[test]
fn exact_count_on_an_empty_container_is_delayable() {
    let (space, container) = space_with(Arc::new(AnyCoordinator::new("any")), 0);
    let ctx = RequestContext::new();

    let tx = space.create_transaction();
    let err = space
        .read(&tx, container, &[Selector::new("any", Count::Exact(1))], None, &ctx)
        .unwrap_err();
    assert_eq!(err.status(), OperationStatus::Delayable);
    space.rollback_transaction(&tx).unwrap();
}

#[test]
fn exact_count_beyond_the_registered_entries_is_delayable() {
    let (space, container) = space_with(Arc::new(AnyCoordinator::new("any")), 2);
    let ctx = RequestContext::new();

    let tx = space.create_transaction();
    let err = space
        .take(&tx, container, &[Selector::new("any", Count::Exact(3))], None, &ctx)
        .unwrap_err();
    assert_eq!(err.status(), OperationStatus::Delayable);

    // The failed take consumed nothing.
    let entries = space
        .read(&tx, container, &[Selector::new("any", Count::All)], None, &ctx)
        .unwrap();
    assert_eq!(entries.len(), 2);
    space.commit_transaction(&tx).unwrap();
}

// =============================================================================
// ALL AND MAX AGAINST LOCKED ENTRIES
// =============================================================================

#[test]
fn count_all_over_a_locked_entry_reports_locked() {
    let (space, container) = space_with(Arc::new(AnyCoordinator::new("any")), 2);
    let ctx = RequestContext::new();

    let tx1 = space.create_transaction();
    space
        .take(&tx1, container, &[Selector::new("any", Count::Exact(1))], None, &ctx)
        .unwrap();

    let tx2 = space.create_transaction();
    let err = space
        .take(&tx2, container, &[Selector::new("any", Count::All)], None, &ctx)
        .unwrap_err();
    assert_eq!(err.status(), OperationStatus::Locked);

    space.rollback_transaction(&tx1).unwrap();
    space.rollback_transaction(&tx2).unwrap();
}

#[test]
fn count_max_skips_locked_entries() {
    let (space, container) = space_with(Arc::new(AnyCoordinator::new("any")), 2);
    let ctx = RequestContext::new();

    let tx1 = space.create_transaction();
    let first = space
        .take(&tx1, container, &[Selector::new("any", Count::Exact(1))], None, &ctx)
        .unwrap();

    let tx2 = space.create_transaction();
    let rest = space
        .take(&tx2, container, &[Selector::new("any", Count::Max)], None, &ctx)
        .unwrap();
    assert_eq!(rest.len(), 1);
    assert_ne!(numbers(&first), numbers(&rest));

    space.commit_transaction(&tx1).unwrap();
    space.commit_transaction(&tx2).unwrap();
}

#[test]
fn count_all_read_over_a_locked_entry_reports_locked() {
    let (space, container) = space_with(Arc::new(AnyCoordinator::new("any")), 2);
    let ctx = RequestContext::new();

    let tx1 = space.create_transaction();
    space
        .take(&tx1, container, &[Selector::new("any", Count::Exact(1))], None, &ctx)
        .unwrap();

    // A pending removal blocks readers too, not only competing takers.
    let tx2 = space.create_transaction();
    let err = space
        .read(&tx2, container, &[Selector::new("any", Count::All)], None, &ctx)
        .unwrap_err();
    assert_eq!(err.status(), OperationStatus::Locked);

    space.rollback_transaction(&tx1).unwrap();
    space.rollback_transaction(&tx2).unwrap();
}

#[test]
fn count_max_read_skips_locked_entries() {
    let (space, container) = space_with(Arc::new(AnyCoordinator::new("any")), 2);
    let ctx = RequestContext::new();

    let tx1 = space.create_transaction();
    let taken = space
        .take(&tx1, container, &[Selector::new("any", Count::Exact(1))], None, &ctx)
        .unwrap();

    let tx2 = space.create_transaction();
    let readable = space
        .read(&tx2, container, &[Selector::new("any", Count::Max)], None, &ctx)
        .unwrap();
    assert_eq!(readable.len(), 1);
    assert_ne!(numbers(&taken), numbers(&readable));

    space.rollback_transaction(&tx1).unwrap();
    space.commit_transaction(&tx2).unwrap();
}

#[test]
fn queue_take_stops_at_a_locked_head() {
    let (space, container) = space_with(Arc::new(QueueCoordinator::fifo("queue")), 3);
    let ctx = RequestContext::new();

    let tx1 = space.create_transaction();
    let head = space
        .take(&tx1, container, &[Selector::new("queue", Count::Exact(1))], None, &ctx)
        .unwrap();
    assert_eq!(numbers(&head), vec![1]);

    // A queue never hands out entries behind a blocked head.
    let tx2 = space.create_transaction();
    let entries = space
        .take(&tx2, container, &[Selector::new("queue", Count::Max)], None, &ctx)
        .unwrap();
    assert!(entries.is_empty());

    space.rollback_transaction(&tx1).unwrap();
    space.rollback_transaction(&tx2).unwrap();
}

// =============================================================================
// PREDICATE SELECTION
// =============================================================================

#[test]
fn query_selector_returns_exactly_the_matching_entries() {
    let (space, container) = space_with(Arc::new(QueryCoordinator::new("query")), 5);
    let ctx = RequestContext::new();

    let tx = space.create_transaction();
    let entries = space
        .read(
            &tx,
            container,
            &[Selector::with_criterion(
                "query",
                Count::All,
                SelectionCriterion::Query(Matchmaker::Gt("n".to_string(), json!(3))),
            )],
            None,
            &ctx,
        )
        .unwrap();
    space.commit_transaction(&tx).unwrap();

    let mut found = numbers(&entries);
    found.sort_unstable();
    assert_eq!(found, vec![4, 5]);
}

#[test]
fn query_stage_feeding_an_exact_count() {
    let (space, container) = space_with(Arc::new(QueryCoordinator::new("query")), 5);
    let ctx = RequestContext::new();

    let tx = space.create_transaction();
    let entries = space
        .take(
            &tx,
            container,
            &[Selector::with_criterion(
                "query",
                Count::Exact(2),
                SelectionCriterion::Query(Matchmaker::Le("n".to_string(), json!(3))),
            )],
            None,
            &ctx,
        )
        .unwrap();
    space.commit_transaction(&tx).unwrap();
    assert_eq!(entries.len(), 2);
}
