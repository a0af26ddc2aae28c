//! End-to-end workflow tests against the in-memory store.
//!
//! Covers sequential gating, quorum, rejection, idempotent re-evaluation,
//! the legacy threshold router and the full purchase round trip.

#![allow(clippy::unwrap_used)]

mod common;

use rust_decimal_macros::dec;
use serde_json::json;

use common::{ADA, CLEO, DALE, ENGINEERING, ERIN, FIONA, Fixture, GUS, MONA, PACO};
use procura_core::audit::{Actor, AuditAction, AuditLogEntry};
use procura_core::model::{
    ApprovalRule, Assignee, Condition, ConditionOperator, Department, NewRequest, Role,
};
use procura_core::workflow::{
    ErrorKind, ProcurementAction, ProcurementStatus, RequestStatus, StepOutcome, WorkflowError,
};
use procura_shared::MissingFieldPolicy;
use procura_shared::types::{ApprovalRuleId, StepId};

/// Manager Review (Mona) then Finance Review (Fiona), both required.
fn two_step_fixture() -> Fixture {
    let fx = Fixture::new();
    fx.add_step(1, "Manager Review", 1, true);
    fx.add_step(2, "Finance Review", 2, true);
    fx.assign(1, 1, Assignee::User(MONA), 1);
    fx.assign(2, 2, Assignee::User(FIONA), 1);
    fx
}

#[test]
fn test_submit_forwards_to_procurement() {
    let fx = Fixture::new();
    let request = fx.engine.submit(NewRequest::purchase("Monitor", dec!(300)), ERIN).unwrap();

    assert_eq!(request.status, RequestStatus::PendingProcurementVerification);
    assert_eq!(request.department_id, Some(ENGINEERING));
    assert_eq!(fx.notified(PACO), 1);
    assert_eq!(fx.count_action(request.id, AuditAction::Submitted), 1);
    assert_eq!(fx.count_action(request.id, AuditAction::StepForwarded), 1);
}

#[test]
fn test_submit_rejects_bad_input() {
    let fx = Fixture::new();
    let err = fx
        .engine
        .submit(NewRequest::purchase("Monitor", dec!(-5)), ERIN)
        .unwrap_err();
    assert!(matches!(err, WorkflowError::InvalidAmount(_)));
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[test]
fn test_sequential_gating() {
    let fx = two_step_fixture();
    let id = fx.submit_verified(dec!(3000));

    assert_eq!(fx.status(id), RequestStatus::PendingApproval);
    assert_eq!(fx.notified(MONA), 1);
    assert_eq!(fx.notified(FIONA), 0);
    assert!(!fx.engine.can_approve(id, FIONA).unwrap());
    assert_eq!(
        fx.engine.current_step_for_approver(id, MONA).unwrap().map(|s| s.id),
        Some(StepId::new(1))
    );

    let err = fx.engine.approve(id, FIONA, None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authorization);

    fx.engine.approve(id, MONA, Some("fine")).unwrap();
    assert_eq!(fx.status(id), RequestStatus::PendingApproval);
    assert_eq!(fx.notified(FIONA), 1);
    assert!(fx.engine.can_approve(id, FIONA).unwrap());

    fx.engine.approve(id, FIONA, None).unwrap();
    assert_eq!(fx.status(id), RequestStatus::Approved);
    assert_eq!(fx.count_action(id, AuditAction::AllApprovalsComplete), 1);
    assert!(fx.engine.all_approvals_complete(id).unwrap());
}

#[test]
fn test_quorum_needs_distinct_approvers() {
    let fx = Fixture::new();
    fx.add_step(1, "Department Review", 1, true);
    fx.assign(1, 1, Assignee::Role(Role::Manager), 2);
    let id = fx.submit_verified(dec!(3000));

    assert_eq!(fx.notified(MONA), 1);
    assert_eq!(fx.notified(DALE), 1);

    fx.engine.approve(id, MONA, None).unwrap();
    assert_eq!(fx.status(id), RequestStatus::PendingApproval);
    assert!(!fx.engine.can_approve(id, MONA).unwrap());
    assert!(fx.engine.approve(id, MONA, None).is_err());

    fx.engine.approve(id, DALE, None).unwrap();
    assert_eq!(fx.status(id), RequestStatus::Approved);
}

#[test]
fn test_rejection_short_circuits() {
    let fx = two_step_fixture();
    let id = fx.submit_verified(dec!(3000));

    assert!(matches!(
        fx.engine.reject(id, MONA, "  "),
        Err(WorkflowError::RejectionReasonRequired)
    ));
    fx.engine.reject(id, MONA, "over budget").unwrap();

    assert_eq!(fx.status(id), RequestStatus::Rejected);
    assert_eq!(fx.notified(FIONA), 0);
    assert_eq!(fx.count_action(id, AuditAction::WorkflowStepRejected), 1);
    let notice = fx.notifier.employee_notices().pop().unwrap();
    assert_eq!(notice.status_tag, "rejected");
    assert_eq!(notice.reason.as_deref(), Some("over budget"));

    let err = fx.engine.approve(id, MONA, None).unwrap_err();
    assert!(matches!(err, WorkflowError::UnexpectedStatus { .. }));
    assert_eq!(err.kind(), ErrorKind::State);
}

#[test]
fn test_rejection_cancels_parallel_steps() {
    let fx = Fixture::new();
    fx.add_step(1, "Peer Review", 1, false);
    fx.add_step(2, "Finance Review", 2, true);
    fx.assign(1, 1, Assignee::User(MONA), 1);
    fx.assign(2, 2, Assignee::User(FIONA), 1);
    let id = fx.submit_verified(dec!(3000));

    assert_eq!(fx.notified(MONA), 1);
    assert_eq!(fx.notified(FIONA), 1);

    fx.engine.reject(id, FIONA, "no budget code").unwrap();
    assert_eq!(fx.status(id), RequestStatus::Rejected);
    assert_eq!(fx.count_action(id, AuditAction::WorkflowStepCancelled), 1);
}

#[test]
fn test_reevaluation_without_events_writes_nothing() {
    let fx = two_step_fixture();
    let id = fx.submit_verified(dec!(3000));
    let audit_before = fx.audit(id).len();
    let executions_before = fx.engine.step_executions(id).unwrap().len();
    let sent_before = fx.notifier.sent().len();

    for _ in 0..3 {
        assert_eq!(
            fx.engine.process_next_workflow_step(id).unwrap(),
            StepOutcome::Waiting(StepId::new(1))
        );
    }

    assert_eq!(fx.audit(id).len(), audit_before);
    assert_eq!(fx.engine.step_executions(id).unwrap().len(), executions_before);
    assert_eq!(fx.notifier.sent().len(), sent_before);
}

#[test]
fn test_legacy_completion_row_is_honoured() {
    let fx = two_step_fixture();
    let id = fx.submit_verified(dec!(3000));
    fx.store.append_audit(AuditLogEntry::new(
        Some(id),
        Actor::Human(MONA),
        AuditAction::StepCompleted,
        "Manager Review: completed (Step ID: 1)",
        chrono::Utc::now(),
    ));

    assert_eq!(
        fx.engine.process_next_workflow_step(id).unwrap(),
        StepOutcome::Forwarded(StepId::new(2))
    );
    assert_eq!(fx.notified(FIONA), 1);
}

#[test]
fn test_marker_of_another_step_is_ignored() {
    let fx = two_step_fixture();
    let id = fx.submit_verified(dec!(3000));
    fx.store.append_audit(AuditLogEntry::new(
        Some(id),
        Actor::Human(MONA),
        AuditAction::StepCompleted,
        "Manager Review: completed (Step ID: 12)",
        chrono::Utc::now(),
    ));

    assert_eq!(
        fx.engine.process_next_workflow_step(id).unwrap(),
        StepOutcome::Waiting(StepId::new(1))
    );
    assert_eq!(fx.notified(FIONA), 0);
}

#[test]
fn test_legacy_auto_approval() {
    let fx = Fixture::new();
    let id = fx.submit_verified(dec!(800));

    assert_eq!(fx.status(id), RequestStatus::Approved);
    assert_eq!(fx.count_action(id, AuditAction::AutoApproved), 1);
    assert_eq!(fx.notified(MONA), 0);
}

#[test]
fn test_legacy_manager_only() {
    let fx = Fixture::new();
    let id = fx.submit_verified(dec!(1500));

    assert_eq!(fx.status(id), RequestStatus::PendingApproval);
    assert_eq!(fx.notified(MONA), 1);
    assert_eq!(fx.notified(DALE), 0);
    assert!(!fx.engine.can_approve(id, FIONA).unwrap());
    assert!(!fx.engine.can_approve(id, ERIN).unwrap());

    fx.engine.approve(id, MONA, None).unwrap();
    assert_eq!(fx.status(id), RequestStatus::Approved);
}

#[test]
fn test_legacy_notifies_one_manager_without_designation() {
    let fx = Fixture::new();
    fx.store.insert_department(Department {
        id: ENGINEERING,
        name: "Engineering".to_string(),
        manager_id: None,
    });
    let id = fx.submit_verified(dec!(1500));

    assert_eq!(fx.notified(MONA), 1);
    assert_eq!(fx.notified(DALE), 0);
    assert!(fx.engine.can_approve(id, DALE).unwrap());

    fx.engine.approve(id, DALE, None).unwrap();
    assert_eq!(fx.status(id), RequestStatus::Approved);
}

#[test]
fn test_legacy_manager_then_ceo() {
    let fx = Fixture::new();
    let id = fx.submit_verified(dec!(6000));

    assert_eq!(fx.notified(MONA), 1);
    assert_eq!(fx.notified(CLEO), 0);

    fx.engine.approve(id, MONA, None).unwrap();
    assert_eq!(fx.status(id), RequestStatus::PendingApproval);
    assert_eq!(fx.notified(CLEO), 1);
    assert!(!fx.engine.can_approve(id, MONA).unwrap());

    fx.engine.approve(id, CLEO, None).unwrap();
    assert_eq!(fx.status(id), RequestStatus::Approved);
}

#[test]
fn test_legacy_admin_approval_completes_employee_request() {
    let fx = Fixture::new();
    let id = fx.submit_verified(dec!(6000));

    fx.engine.approve(id, ADA, None).unwrap();
    assert_eq!(fx.status(id), RequestStatus::Approved);
}

#[test]
fn test_legacy_department_rules_replace_thresholds() {
    let fx = Fixture::new();
    fx.store.insert_rule(ApprovalRule {
        id: ApprovalRuleId::new(1),
        department_id: ENGINEERING,
        min_amount: dec!(5000),
        max_amount: None,
        approver_role: Role::Ceo,
        order: 1,
        is_active: true,
    });
    let id = fx.submit_verified(dec!(6000));

    assert_eq!(fx.notified(MONA), 0);
    assert_eq!(fx.notified(CLEO), 1);
    fx.engine.approve(id, CLEO, None).unwrap();
    assert_eq!(fx.status(id), RequestStatus::Approved);
}

#[test]
fn test_missing_field_passes_by_default() {
    let fx = Fixture::new();
    let mut step = fx.add_step(1, "R&D Review", 1, true);
    step.conditions = vec![Condition::new(
        "attributes.cost_center",
        ConditionOperator::Equal,
        json!("R&D"),
    )];
    fx.store.insert_step(step);
    fx.assign(1, 1, Assignee::User(GUS), 1);

    let id = fx.submit_verified(dec!(1500));
    assert_eq!(
        fx.engine.current_step_for_approver(id, GUS).unwrap().map(|s| s.id),
        Some(StepId::new(1))
    );
}

#[test]
fn test_missing_field_fails_under_strict_policy() {
    let mut settings = common::settings();
    settings.missing_field_policy = MissingFieldPolicy::Fail;
    let fx = Fixture::with_settings(settings);
    let mut step = fx.add_step(1, "R&D Review", 1, true);
    step.conditions = vec![Condition::new(
        "attributes.cost_center",
        ConditionOperator::Equal,
        json!("R&D"),
    )];
    fx.store.insert_step(step);
    fx.assign(1, 1, Assignee::User(GUS), 1);

    let legacy = fx.submit_verified(dec!(1500));
    assert_eq!(fx.engine.current_step_for_approver(legacy, GUS).unwrap(), None);
    assert_eq!(fx.notified(MONA), 1);

    let mut input = NewRequest::purchase("Oscilloscope", dec!(1500));
    input.attributes.insert("cost_center".to_string(), json!("R&D"));
    let dynamic = fx.submit_verified_with(input);
    assert!(fx.engine.current_step_for_approver(dynamic, GUS).unwrap().is_some());
}

#[test]
fn test_verification_failure_rejects() {
    let fx = Fixture::new();
    let request = fx.engine.submit(NewRequest::purchase("Unobtainium", dec!(300)), ERIN).unwrap();

    let updated = fx
        .engine
        .process_procurement_verification(
            request.id,
            PACO,
            ProcurementStatus::NotAvailable,
            None,
            Some("discontinued"),
        )
        .unwrap();
    assert_eq!(updated.status, RequestStatus::Rejected);
    assert_eq!(updated.procurement_status, Some(ProcurementStatus::NotAvailable));
    let notice = fx.notifier.employee_notices().pop().unwrap();
    assert_eq!(notice.reason.as_deref(), Some("discontinued"));
}

#[test]
fn test_only_procurement_verifies() {
    let fx = Fixture::new();
    let request = fx.engine.submit(NewRequest::purchase("Chair", dec!(300)), ERIN).unwrap();

    let err = fx
        .engine
        .process_procurement_verification(request.id, MONA, ProcurementStatus::Verified, None, None)
        .unwrap_err();
    assert!(matches!(err, WorkflowError::InsufficientRole { .. }));
    assert_eq!(fx.status(request.id), RequestStatus::PendingProcurementVerification);
}

#[test]
fn test_round_trip() {
    let fx = Fixture::new();
    fx.add_step(1, "Manager Review", 1, true);
    fx.assign(1, 1, Assignee::User(MONA), 1);

    let request = fx.engine.submit(NewRequest::purchase("Workstation", dec!(3000)), ERIN).unwrap();
    let verified = fx
        .engine
        .process_procurement_verification(request.id, PACO, ProcurementStatus::Verified, Some(dec!(2800)), None)
        .unwrap();
    assert_eq!(verified.amount, dec!(2800));
    assert_eq!(verified.status, RequestStatus::PendingApproval);

    fx.engine.approve(request.id, MONA, None).unwrap();
    assert_eq!(fx.status(request.id), RequestStatus::Approved);

    let ordered = fx
        .engine
        .process_procurement_approval(request.id, PACO, ProcurementAction::Ordered, Some(dec!(2750)), None)
        .unwrap();
    assert_eq!(ordered.status, RequestStatus::Ordered);
    assert_eq!(ordered.final_cost, Some(dec!(2750)));

    fx.engine
        .process_procurement_approval(request.id, PACO, ProcurementAction::Delivered, None, None)
        .unwrap();
    assert_eq!(fx.status(request.id), RequestStatus::Delivered);

    let tags: Vec<String> = fx
        .notifier
        .employee_notices()
        .into_iter()
        .map(|n| n.status_tag)
        .collect();
    assert_eq!(tags, vec!["verified", "approved", "Ordered", "Delivered"]);
    assert!(fx.engine.rollback(request.id, PACO, None).is_err());
}

#[test]
fn test_cancel_and_rollback() {
    let fx = Fixture::new();
    let id = fx.submit_verified(dec!(1500));
    fx.engine.approve(id, MONA, None).unwrap();

    fx.engine
        .process_procurement_approval(id, PACO, ProcurementAction::Cancelled, None, Some("supplier gone"))
        .unwrap();
    assert_eq!(fx.status(id), RequestStatus::Cancelled);

    assert!(matches!(
        fx.engine.rollback(id, ERIN, None),
        Err(WorkflowError::InsufficientRole { .. })
    ));
    let reopened = fx.engine.rollback(id, PACO, Some("new supplier")).unwrap();
    assert_eq!(reopened.status, RequestStatus::PendingProcurement);
    assert_eq!(fx.count_action(id, AuditAction::RequestRolledBack), 1);
}

#[test]
fn test_procurement_override_forces_approval() {
    let fx = Fixture::new();
    let id = fx.submit_verified(dec!(1500));

    assert!(matches!(
        fx.engine
            .process_procurement_approval(id, PACO, ProcurementAction::Delivered, None, None),
        Err(WorkflowError::InvalidTransition { .. })
    ));

    fx.engine
        .process_procurement_approval(id, PACO, ProcurementAction::Ordered, None, None)
        .unwrap();
    assert_eq!(fx.status(id), RequestStatus::Ordered);
    assert_eq!(fx.count_action(id, AuditAction::AllApprovalsComplete), 1);
}

#[test]
fn test_admin_requester_skips_manager_steps() {
    let fx = Fixture::new();
    fx.add_step(1, "Manager Review", 1, true);
    fx.add_step(2, "Finance Review", 2, true);
    fx.assign(1, 1, Assignee::Role(Role::Manager), 1);
    fx.assign(2, 2, Assignee::User(FIONA), 1);

    let request = fx.engine.submit(NewRequest::purchase("Server", dec!(3000)), ADA).unwrap();
    fx.engine
        .process_procurement_verification(request.id, PACO, ProcurementStatus::Verified, None, None)
        .unwrap();

    assert_eq!(fx.notified(MONA), 0);
    assert_eq!(fx.notified(FIONA), 1);
    fx.engine.approve(request.id, FIONA, None).unwrap();
    assert_eq!(fx.status(request.id), RequestStatus::Approved);
}
