//! Concurrent approval tests.
//!
//! Two approvers acting on the same request at once must never both
//! succeed once the first approval settles the request.

#![allow(clippy::unwrap_used)]

mod common;

use std::sync::Barrier;
use std::thread;

use rust_decimal_macros::dec;

use common::{DALE, Fixture, MONA};
use procura_core::audit::{AuditAction, ExecutionStatus};
use procura_core::model::{Assignee, Role};
use procura_core::workflow::{RequestStatus, WorkflowError};
use procura_shared::types::{RequestId, UserId};

const ROUNDS: usize = 25;

fn race(fx: &Fixture, id: RequestId, first: UserId, second: UserId) -> Vec<Result<(), WorkflowError>> {
    let barrier = Barrier::new(2);
    thread::scope(|scope| {
        let handles: Vec<_> = [first, second]
            .into_iter()
            .map(|user| {
                let barrier = &barrier;
                let engine = &fx.engine;
                scope.spawn(move || {
                    barrier.wait();
                    engine.approve(id, user, None).map(|_| ())
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    })
}

#[test]
fn test_two_managers_race_single_quorum() {
    let fx = Fixture::new();
    fx.add_step(1, "Manager Review", 1, true);
    fx.assign(1, 1, Assignee::Role(Role::Manager), 1);

    for _ in 0..ROUNDS {
        let id = fx.submit_verified(dec!(3000));
        let results = race(&fx, id, MONA, DALE);

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(
            results
                .iter()
                .filter_map(|r| r.as_ref().err())
                .all(|e| matches!(e, WorkflowError::UnexpectedStatus { .. }))
        );
        assert_eq!(fx.status(id), RequestStatus::Approved);
        assert_eq!(fx.count_action(id, AuditAction::AllApprovalsComplete), 1);
    }
}

#[test]
fn test_same_approver_twice_counts_once() {
    let fx = Fixture::new();
    fx.add_step(1, "Department Review", 1, true);
    fx.assign(1, 1, Assignee::Role(Role::Manager), 2);

    for _ in 0..ROUNDS {
        let id = fx.submit_verified(dec!(3000));
        let results = race(&fx, id, MONA, MONA);

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        let approvals = fx
            .engine
            .step_executions(id)
            .unwrap()
            .into_iter()
            .filter(|e| e.status == ExecutionStatus::Approved)
            .count();
        assert_eq!(approvals, 1);
        assert_eq!(fx.status(id), RequestStatus::PendingApproval);
    }
}
