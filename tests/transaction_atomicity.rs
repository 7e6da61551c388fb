//! Transaction atomicity tests.
//!
//! A transaction either happens entirely or not at all: rollbacks
//! erase writes, resurrect takes, and a failed operation inside a
//! transaction never poisons the operations around it.

use std::sync::Arc;

use serde_json::json;
use spacecore::coordination::{AnyCoordinator, CoordinationData, Coordinator, Selector};
use spacecore::error::OperationStatus;
use spacecore::model::{ContainerId, Count, EntryValue, RequestContext};
use spacecore::space::Space;

fn job(n: u64) -> EntryValue {
    EntryValue::new("Job", json!({ "n": n }))
}

fn all() -> Vec<Selector> {
    vec![Selector::new("any", Count::All)]
}

fn setup(prefill: u64) -> (Space, ContainerId) {
    let space = Space::with_defaults();
    let ctx = RequestContext::new();
    let tx = space.create_transaction();
    let id = space
        .create_container(
            &tx,
            None,
            vec![Arc::new(AnyCoordinator::new("any")) as Arc<dyn Coordinator>],
            vec![],
            None,
            None,
        )
        .unwrap();
    for n in 1..=prefill {
        space.write(&tx, id, job(n), &[], &ctx).unwrap();
    }
    space.commit_transaction(&tx).unwrap();
    (space, id)
}

// =============================================================================
// ROLLBACK
// =============================================================================

#[test]
fn rolled_back_writes_leave_no_trace() {
    let (space, container) = setup(0);
    let ctx = RequestContext::new();

    let tx = space.create_transaction();
    space.write(&tx, container, job(1), &[], &ctx).unwrap();
    space.write(&tx, container, job(2), &[], &ctx).unwrap();
    space.rollback_transaction(&tx).unwrap();

    let tx = space.create_transaction();
    let entries = space.read(&tx, container, &all(), None, &ctx).unwrap();
    assert!(entries.is_empty());
    space.commit_transaction(&tx).unwrap();
}

#[test]
fn rolled_back_take_restores_the_entries() {
    let (space, container) = setup(2);
    let ctx = RequestContext::new();

    let tx = space.create_transaction();
    let taken = space
        .take(&tx, container, &[Selector::new("any", Count::All)], None, &ctx)
        .unwrap();
    assert_eq!(taken.len(), 2);
    space.rollback_transaction(&tx).unwrap();

    let tx = space.create_transaction();
    let entries = space.read(&tx, container, &all(), None, &ctx).unwrap();
    assert_eq!(entries.len(), 2);
    space.commit_transaction(&tx).unwrap();
}

// =============================================================================
// COMMIT
// =============================================================================

#[test]
fn committed_take_is_permanent() {
    let (space, container) = setup(1);
    let ctx = RequestContext::new();

    let tx = space.create_transaction();
    space
        .take(&tx, container, &[Selector::new("any", Count::Exact(1))], None, &ctx)
        .unwrap();
    space.commit_transaction(&tx).unwrap();

    let tx = space.create_transaction();
    let entries = space.read(&tx, container, &all(), None, &ctx).unwrap();
    assert!(entries.is_empty());
    space.commit_transaction(&tx).unwrap();
}

#[test]
fn write_and_take_in_one_transaction_cancel_out() {
    let (space, container) = setup(0);
    let ctx = RequestContext::new();

    let tx = space.create_transaction();
    space.write(&tx, container, job(1), &[], &ctx).unwrap();
    let taken = space
        .take(&tx, container, &[Selector::new("any", Count::Exact(1))], None, &ctx)
        .unwrap();
    assert_eq!(taken[0].field("n"), Some(&json!(1)));
    space.commit_transaction(&tx).unwrap();

    let tx = space.create_transaction();
    let entries = space.read(&tx, container, &all(), None, &ctx).unwrap();
    assert!(entries.is_empty());
    space.commit_transaction(&tx).unwrap();
}

// =============================================================================
// FAILURE CONTAINMENT
// =============================================================================

#[test]
fn failed_operation_leaves_the_transaction_usable() {
    let (space, container) = setup(0);
    let ctx = RequestContext::new();

    let tx = space.create_transaction();
    let err = space
        .read(&tx, container, &[Selector::new("any", Count::Exact(1))], None, &ctx)
        .unwrap_err();
    assert_eq!(err.status(), OperationStatus::Delayable);

    space.write(&tx, container, job(1), &[], &ctx).unwrap();
    space.commit_transaction(&tx).unwrap();

    let tx = space.create_transaction();
    let entries = space.read(&tx, container, &all(), None, &ctx).unwrap();
    assert_eq!(entries.len(), 1);
    space.commit_transaction(&tx).unwrap();
}

#[test]
fn failed_operations_still_mark_the_touched_container() {
    let (space, container) = setup(0);
    let ctx = RequestContext::new();

    let tx = space.create_transaction();
    assert!(tx.accessed_containers().is_empty());
    space
        .read(&tx, container, &[Selector::new("any", Count::Exact(1))], None, &ctx)
        .unwrap_err();
    assert_eq!(tx.accessed_containers(), vec![container]);
    space.rollback_transaction(&tx).unwrap();
}

#[test]
fn refused_coordination_data_still_marks_the_container() {
    let (space, container) = setup(0);
    let ctx = RequestContext::new();

    let tx = space.create_transaction();
    space
        .write(&tx, container, job(1), &[CoordinationData::new("missing")], &ctx)
        .unwrap_err();
    assert_eq!(tx.accessed_containers(), vec![container]);
    space.rollback_transaction(&tx).unwrap();
}

#[test]
fn finished_transaction_refuses_further_operations() {
    let (space, container) = setup(0);
    let ctx = RequestContext::new();

    let tx = space.create_transaction();
    space.commit_transaction(&tx).unwrap();
    let err = space.write(&tx, container, job(1), &[], &ctx).unwrap_err();
    assert_eq!(err.status(), OperationStatus::NotOk);
}

// =============================================================================
// CONCURRENCY
// =============================================================================

#[test]
fn concurrent_writers_do_not_lose_entries() {
    let (space, container) = setup(0);

    std::thread::scope(|scope| {
        for t in 0..4u64 {
            let space = &space;
            scope.spawn(move || {
                let ctx = RequestContext::new();
                for n in 0..25 {
                    let tx = space.create_transaction();
                    space.write(&tx, container, job(t * 25 + n), &[], &ctx).unwrap();
                    space.commit_transaction(&tx).unwrap();
                }
            });
        }
    });

    let ctx = RequestContext::new();
    let tx = space.create_transaction();
    let entries = space.read(&tx, container, &all(), None, &ctx).unwrap();
    assert_eq!(entries.len(), 100);
    space.commit_transaction(&tx).unwrap();
}

// =============================================================================
// METRICS
// =============================================================================

#[test]
fn the_space_counts_operations_and_outcomes() {
    let (space, container) = setup(0);
    let ctx = RequestContext::new();

    let tx = space.create_transaction();
    space.write(&tx, container, job(1), &[], &ctx).unwrap();
    space
        .read(&tx, container, &[Selector::new("any", Count::Exact(2))], None, &ctx)
        .unwrap_err();
    space.commit_transaction(&tx).unwrap();

    let tx = space.create_transaction();
    space.rollback_transaction(&tx).unwrap();

    let metrics = space.metrics();
    assert_eq!(metrics.writes_ok, 1);
    assert_eq!(metrics.reads_failed, 1);
    assert_eq!(metrics.containers_created, 1);
    assert_eq!(metrics.transactions_committed, 2);
    assert_eq!(metrics.transactions_rolled_back, 1);
}
