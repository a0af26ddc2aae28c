//! Delegation tests: windows, administration and the rollback pass.

#![allow(clippy::unwrap_used)]

mod common;

use chrono::{Duration, Utc};
use rust_decimal_macros::dec;

use common::{DALE, ERIN, FIONA, Fixture, GUS, MONA};
use procura_core::audit::{AuditAction, ExecutionStatus};
use procura_core::delegation::{DelegationUpdate, NewDelegation};
use procura_core::model::{Assignee, Role};
use procura_core::store::RequestRepository;
use procura_core::workflow::{RequestStatus, WorkflowError};
use procura_shared::types::{DelegationId, StepId};

fn manager_review() -> Fixture {
    let fx = Fixture::new();
    fx.add_step(1, "Manager Review", 1, true);
    fx.assign(1, 1, Assignee::User(MONA), 1);
    fx
}

fn window(start_hours: i64, end_hours: i64) -> NewDelegation {
    let now = Utc::now();
    NewDelegation {
        starts_at: Some(now + Duration::hours(start_hours)),
        expires_at: Some(now + Duration::hours(end_hours)),
        ..NewDelegation::for_step(GUS, StepId::new(1))
    }
}

#[test]
fn test_effective_delegation_substitutes_delegate() {
    let fx = manager_review();
    fx.engine.create_delegation(MONA, window(-1, 1)).unwrap();
    let id = fx.submit_verified(dec!(3000));

    assert_eq!(fx.notified(GUS), 1);
    assert_eq!(fx.notified(MONA), 0);
    assert_eq!(fx.count_action(id, AuditAction::DelegationApplied), 1);

    fx.engine.approve(id, GUS, None).unwrap();
    assert_eq!(fx.status(id), RequestStatus::Approved);
    let approval = fx
        .engine
        .step_executions(id)
        .unwrap()
        .into_iter()
        .find(|e| e.status == ExecutionStatus::Approved)
        .unwrap();
    assert_eq!(approval.on_behalf_of, vec![MONA]);
}

#[test]
fn test_expired_delegation_is_ignored() {
    let fx = manager_review();
    fx.engine.create_delegation(MONA, window(-2, -1)).unwrap();
    let id = fx.submit_verified(dec!(3000));

    assert_eq!(fx.notified(MONA), 1);
    assert_eq!(fx.notified(GUS), 0);
    assert!(!fx.engine.can_approve(id, GUS).unwrap());
    assert!(fx.engine.can_approve(id, MONA).unwrap());
}

#[test]
fn test_future_delegation_is_ignored() {
    let fx = manager_review();
    fx.engine.create_delegation(MONA, window(1, 2)).unwrap();
    let id = fx.submit_verified(dec!(3000));

    assert_eq!(fx.notified(MONA), 1);
    assert!(!fx.engine.can_approve(id, GUS).unwrap());
}

#[test]
fn test_create_validation() {
    let fx = manager_review();

    assert!(matches!(
        fx.engine.create_delegation(MONA, window(2, 1)),
        Err(WorkflowError::InvalidDelegationWindow)
    ));
    assert!(matches!(
        fx.engine
            .create_delegation(MONA, NewDelegation::for_step(MONA, StepId::new(1))),
        Err(WorkflowError::SelfDelegation)
    ));
    assert!(matches!(
        fx.engine
            .create_delegation(MONA, NewDelegation::for_step(GUS, StepId::new(99))),
        Err(WorkflowError::StepNotFound(_))
    ));
    assert!(fx.store.system_audit_log().unwrap().is_empty());
}

#[test]
fn test_only_delegator_updates() {
    let fx = manager_review();
    let delegation = fx.engine.create_delegation(MONA, window(-1, 1)).unwrap();

    let update = DelegationUpdate {
        reason: Some("conference".to_string()),
        ..DelegationUpdate::default()
    };
    assert!(matches!(
        fx.engine.update_delegation(GUS, delegation.id, update.clone()),
        Err(WorkflowError::NotDelegationParty { .. })
    ));
    let updated = fx.engine.update_delegation(MONA, delegation.id, update).unwrap();
    assert_eq!(updated.reason.as_deref(), Some("conference"));
}

#[test]
fn test_rejected_delegation_routes_to_delegator() {
    let fx = manager_review();
    let delegation = fx.engine.create_delegation(MONA, window(-1, 1)).unwrap();

    assert!(matches!(
        fx.engine.reject_delegation(MONA, delegation.id, "no"),
        Err(WorkflowError::NotDelegationParty { .. })
    ));
    let rejected = fx.engine.reject_delegation(GUS, delegation.id, "on leave").unwrap();
    assert!(!rejected.is_active);
    assert_eq!(rejected.reject_reason.as_deref(), Some("on leave"));

    fx.submit_verified(dec!(3000));
    assert_eq!(fx.notified(MONA), 1);
    assert_eq!(fx.notified(GUS), 0);
}

#[test]
fn test_delete_rolls_work_back_to_delegator() {
    let fx = manager_review();
    let delegation = fx.engine.create_delegation(MONA, window(-1, 1)).unwrap();
    let id = fx.submit_verified(dec!(3000));
    assert_eq!(fx.notified(GUS), 1);

    assert!(matches!(
        fx.engine.delete_delegation(FIONA, delegation.id),
        Err(WorkflowError::NotDelegationParty { .. })
    ));
    let rolled_back = fx.engine.delete_delegation(MONA, delegation.id).unwrap();

    assert_eq!(rolled_back, vec![id]);
    assert_eq!(fx.notified(MONA), 1);
    assert_eq!(fx.count_action(id, AuditAction::DelegationRollback), 1);
    assert!(!fx.engine.can_approve(id, GUS).unwrap());
    assert!(fx.engine.can_approve(id, MONA).unwrap());

    let admin_actions: Vec<AuditAction> = fx
        .store
        .system_audit_log()
        .unwrap()
        .into_iter()
        .map(|e| e.action)
        .collect();
    assert_eq!(
        admin_actions,
        vec![AuditAction::DelegationCreated, AuditAction::DelegationDeleted]
    );

    fx.engine.approve(id, MONA, None).unwrap();
    assert_eq!(fx.status(id), RequestStatus::Approved);
}

#[test]
fn test_delete_keeps_given_approvals() {
    let fx = manager_review();
    let delegation = fx.engine.create_delegation(MONA, window(-1, 1)).unwrap();
    let id = fx.submit_verified(dec!(3000));
    fx.engine.approve(id, GUS, None).unwrap();

    let rolled_back = fx.engine.delete_delegation(GUS, delegation.id).unwrap();
    assert!(rolled_back.is_empty());
    assert_eq!(fx.status(id), RequestStatus::Approved);
    assert!(matches!(
        fx.engine.delete_delegation(MONA, DelegationId::new(77)),
        Err(WorkflowError::DelegationNotFound(_))
    ));
}

#[test]
fn test_requester_cannot_be_delegate_target() {
    let fx = manager_review();
    let mut input = window(-1, 1);
    input.delegate_id = ERIN;
    fx.engine.create_delegation(MONA, input).unwrap();

    fx.submit_verified(dec!(3000));
    assert_eq!(fx.notified(MONA), 1);
    assert_eq!(fx.notified(ERIN), 0);
}

#[test]
fn test_all_effective_delegates_receive_the_step() {
    let fx = manager_review();
    let to_gus = fx.engine.create_delegation(MONA, NewDelegation::for_step(GUS, StepId::new(1))).unwrap();
    fx.engine
        .create_delegation(MONA, NewDelegation::for_step(FIONA, StepId::new(1)))
        .unwrap();
    let id = fx.submit_verified(dec!(3000));

    assert_eq!(fx.notified(GUS), 1);
    assert_eq!(fx.notified(FIONA), 1);
    assert_eq!(fx.notified(MONA), 0);
    assert_eq!(fx.count_action(id, AuditAction::DelegationApplied), 2);
    assert!(fx.engine.can_approve(id, GUS).unwrap());
    assert!(fx.engine.can_approve(id, FIONA).unwrap());

    // Mona's share still goes to Fiona, so nothing returns to Mona.
    let rolled_back = fx.engine.delete_delegation(MONA, to_gus.id).unwrap();
    assert!(rolled_back.is_empty());
    assert_eq!(fx.notified(MONA), 0);
    assert!(!fx.engine.can_approve(id, GUS).unwrap());

    fx.engine.approve(id, FIONA, None).unwrap();
    assert_eq!(fx.status(id), RequestStatus::Approved);
}

#[test]
fn test_delegate_who_is_also_assigned_counts_once() {
    let fx = Fixture::new();
    fx.add_step(1, "Department Review", 1, true);
    fx.assign(1, 1, Assignee::Role(Role::Manager), 2);
    let delegation = fx
        .engine
        .create_delegation(MONA, NewDelegation::for_step(DALE, StepId::new(1)))
        .unwrap();
    let id = fx.submit_verified(dec!(3000));

    assert_eq!(fx.notified(DALE), 1);
    assert_eq!(fx.notified(MONA), 0);
    fx.engine.approve(id, DALE, None).unwrap();
    assert_eq!(fx.status(id), RequestStatus::PendingApproval);
    assert!(!fx.engine.all_approvals_complete(id).unwrap());
    assert!(!fx.engine.can_approve(id, DALE).unwrap());

    fx.engine.delete_delegation(MONA, delegation.id).unwrap();
    fx.engine.approve(id, MONA, None).unwrap();
    assert_eq!(fx.status(id), RequestStatus::Approved);
}
