//! Procura workflow simulator
//!
//! Seeds an in-memory organisation, then walks requests through
//! verification, dynamic and legacy approval, delegation and fulfilment,
//! logging every notification and audit row.

use std::sync::Arc;

use anyhow::Context;
use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use serde_json::json;
use tracing::info;

use procura_core::delegation::NewDelegation;
use procura_core::model::{
    Assignee, Condition, ConditionOperator, Department, FinanceAssignment, NewRequest,
    RequestCategory, Role, StepType, User, WorkflowStep, WorkflowStepAssignment,
};
use procura_core::notify::{Notification, RecordingNotifier};
use procura_core::store::memory::InMemoryStore;
use procura_core::workflow::{
    EngineSettings, ProcurementAction, ProcurementStatus, WorkflowEngine,
};
use procura_shared::AppConfig;
use procura_shared::telemetry::init_tracing;
use procura_shared::types::{AssignmentId, DepartmentId, RequestId, StepId, UserId};

type Engine = WorkflowEngine<InMemoryStore, RecordingNotifier>;

const ENGINEERING: DepartmentId = DepartmentId::new(1);
const EMPLOYEE: UserId = UserId::new(1);
const MANAGER: UserId = UserId::new(2);
const PROCUREMENT: UserId = UserId::new(3);
const FINANCE: UserId = UserId::new(4);
const CEO: UserId = UserId::new(5);
const DEPUTY: UserId = UserId::new(6);

fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("Failed to load configuration")?;
    init_tracing(&config.logging);

    let store = Arc::new(InMemoryStore::new());
    seed(&store);
    let notifier = Arc::new(RecordingNotifier::new());
    let engine = WorkflowEngine::new(
        Arc::clone(&store),
        Arc::clone(&notifier),
        EngineSettings::from(&config.workflow),
    );
    info!(
        auto_approval = %config.workflow.auto_approval_threshold,
        manager_only = %config.workflow.manager_only_threshold,
        ceo_approval = %config.workflow.ceo_approval_threshold,
        "Engine configured"
    );

    let laptop = dynamic_round_trip(&engine, &notifier)?;
    report(&engine, laptop)?;

    let travel = legacy_route(&engine, config.workflow.manager_only_threshold)?;
    report(&engine, travel)?;

    for notification in notifier.sent() {
        match notification {
            Notification::Approval(notice) => info!(
                request_id = %notice.request_id,
                approver_id = %notice.approver_id,
                step = %notice.step_label,
                "Approval requested"
            ),
            Notification::Employee(notice) => info!(
                request_id = %notice.request_id,
                status = %notice.status_tag,
                "Employee notified"
            ),
        }
    }
    Ok(())
}

fn user(id: UserId, name: &str, role: Role, department_id: Option<DepartmentId>) -> User {
    User {
        id,
        name: name.to_string(),
        email: format!("{}@procura.local", name.to_lowercase()),
        role,
        department_id,
        is_active: true,
    }
}

fn seed(store: &InMemoryStore) {
    store.insert_department(Department {
        id: ENGINEERING,
        name: "Engineering".to_string(),
        manager_id: Some(MANAGER),
    });
    store.insert_user(user(EMPLOYEE, "Erin", Role::Employee, Some(ENGINEERING)));
    store.insert_user(user(MANAGER, "Mona", Role::Manager, Some(ENGINEERING)));
    store.insert_user(user(PROCUREMENT, "Paco", Role::Procurement, None));
    store.insert_user(user(FINANCE, "Fiona", Role::Finance, None));
    store.insert_user(user(CEO, "Cleo", Role::Ceo, None));
    store.insert_user(user(DEPUTY, "Dev", Role::Employee, Some(ENGINEERING)));
    store.insert_finance_assignment(FinanceAssignment {
        user_id: FINANCE,
        department_id: Some(ENGINEERING),
        is_active: true,
    });

    // Hardware purchases go through the manager, then finance above 2000.
    let hardware = vec![Condition::new(
        "attributes.kind",
        ConditionOperator::Equal,
        json!("hardware"),
    )];
    store.insert_step(WorkflowStep {
        id: StepId::new(1),
        name: "Manager Review".to_string(),
        description: None,
        category: RequestCategory::General,
        order_index: 1,
        step_type: StepType::Approval,
        is_active: true,
        is_required: true,
        conditions: hardware.clone(),
        auto_approve_if_condition_met: false,
        timeout_hours: Some(48),
    });
    let mut finance_conditions = hardware;
    finance_conditions.push(Condition::new("amount", ConditionOperator::GreaterThan, json!(2000)));
    store.insert_step(WorkflowStep {
        id: StepId::new(2),
        name: "Finance Review".to_string(),
        description: None,
        category: RequestCategory::General,
        order_index: 2,
        step_type: StepType::Approval,
        is_active: true,
        is_required: true,
        conditions: finance_conditions,
        auto_approve_if_condition_met: false,
        timeout_hours: Some(48),
    });
    store.insert_assignment(WorkflowStepAssignment {
        id: AssignmentId::new(1),
        step_id: StepId::new(1),
        assignee: Assignee::Role(Role::Manager),
        is_required: true,
        priority: 1,
        conditions: vec![],
    });
    store.insert_assignment(WorkflowStepAssignment {
        id: AssignmentId::new(2),
        step_id: StepId::new(2),
        assignee: Assignee::FinanceAssignment,
        is_required: true,
        priority: 1,
        conditions: vec![],
    });
}

fn dynamic_round_trip(engine: &Engine, notifier: &RecordingNotifier) -> anyhow::Result<RequestId> {
    let now = Utc::now();
    engine.create_delegation(
        MANAGER,
        NewDelegation {
            starts_at: Some(now - Duration::hours(1)),
            expires_at: Some(now + Duration::days(7)),
            reason: Some("Conference week".to_string()),
            ..NewDelegation::for_step(DEPUTY, StepId::new(1))
        },
    )?;

    let mut input = NewRequest::purchase("Laptop", Decimal::new(2_600, 0));
    input.reason = "Replacement for failed machine".to_string();
    input.attributes.insert("kind".to_string(), json!("hardware"));
    let request = engine.submit(input, EMPLOYEE)?;
    info!(request_id = %request.id, status = %request.status, "Submitted");

    let verification = notifier
        .approval_notices_for(PROCUREMENT)
        .into_iter()
        .find(|n| n.request_id == request.id)
        .context("procurement was not notified")?;
    let verified = engine.verify_with_token(
        verification.token,
        ProcurementStatus::Verified,
        Some(Decimal::new(2_450, 0)),
        Some("Vendor quote attached"),
    )?;
    info!(request_id = %request.id, amount = %verified.amount, status = %verified.status, "Verified");

    let approved = engine.approve(request.id, DEPUTY, Some("Covering for Mona"))?;
    info!(request_id = %request.id, status = %approved.status, "Deputy approved");
    let approved = engine.approve(request.id, FINANCE, None)?;
    info!(request_id = %request.id, status = %approved.status, "Finance approved");

    engine.process_procurement_approval(
        request.id,
        PROCUREMENT,
        ProcurementAction::Ordered,
        Some(Decimal::new(2_430, 0)),
        None,
    )?;
    let delivered = engine.process_procurement_approval(
        request.id,
        PROCUREMENT,
        ProcurementAction::Delivered,
        None,
        Some("Received at front desk"),
    )?;
    info!(request_id = %request.id, status = %delivered.status, "Fulfilled");
    Ok(request.id)
}

fn legacy_route(engine: &Engine, manager_only: Decimal) -> anyhow::Result<RequestId> {
    let amount = manager_only + Decimal::new(1_000, 0);
    let request = engine.submit(NewRequest::purchase("Team offsite", amount), EMPLOYEE)?;
    engine.process_procurement_verification(
        request.id,
        PROCUREMENT,
        ProcurementStatus::Verified,
        None,
        None,
    )?;
    engine.approve(request.id, MANAGER, None)?;
    let after_manager = engine.request(request.id)?;
    info!(request_id = %request.id, status = %after_manager.status, "Manager approved legacy request");

    if engine.can_approve(request.id, CEO)? {
        let approved = engine.approve(request.id, CEO, Some("Budget confirmed"))?;
        info!(request_id = %request.id, status = %approved.status, "CEO approved");
    }
    Ok(request.id)
}

fn report(engine: &Engine, request_id: RequestId) -> anyhow::Result<()> {
    for entry in engine.audit_log(request_id)? {
        info!(
            request_id = %request_id,
            actor = %entry.actor,
            action = %entry.action,
            notes = %entry.notes,
            "Audit"
        );
    }
    Ok(())
}
