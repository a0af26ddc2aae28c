//! Shared fixture for engine integration tests.
//!
//! One department (Engineering) with a designated manager, a second
//! manager, procurement, two finance users, a CEO, an admin and two
//! employees. Legacy thresholds are 1000 / 2000 / 5000.

#![allow(dead_code)]

use std::sync::Arc;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use procura_core::audit::{AuditAction, AuditLogEntry};
use procura_core::model::{
    Assignee, Department, NewRequest, RequestCategory, Role, StepType, User, WorkflowStep,
    WorkflowStepAssignment,
};
use procura_core::notify::RecordingNotifier;
use procura_core::store::memory::InMemoryStore;
use procura_core::workflow::{
    EngineSettings, LegacyThresholds, ProcurementStatus, RequestStatus, WorkflowEngine,
};
use procura_shared::MissingFieldPolicy;
use procura_shared::types::{AssignmentId, DepartmentId, RequestId, StepId, UserId};

pub const ENGINEERING: DepartmentId = DepartmentId::new(1);

pub const ERIN: UserId = UserId::new(1);
pub const MONA: UserId = UserId::new(2);
pub const PACO: UserId = UserId::new(3);
pub const FIONA: UserId = UserId::new(4);
pub const CLEO: UserId = UserId::new(5);
pub const ADA: UserId = UserId::new(6);
pub const DALE: UserId = UserId::new(7);
pub const FRANK: UserId = UserId::new(8);
pub const GUS: UserId = UserId::new(9);

pub type Engine = WorkflowEngine<InMemoryStore, RecordingNotifier>;

pub struct Fixture {
    pub store: Arc<InMemoryStore>,
    pub notifier: Arc<RecordingNotifier>,
    pub engine: Engine,
}

pub fn settings() -> EngineSettings {
    EngineSettings {
        thresholds: LegacyThresholds {
            auto_approval: dec!(1000),
            manager_only: dec!(2000),
            ceo_approval: dec!(5000),
        },
        missing_field_policy: MissingFieldPolicy::Pass,
        approval_token_ttl_hours: 72,
    }
}

fn user(id: UserId, name: &str, role: Role, department: Option<DepartmentId>) -> User {
    User {
        id,
        name: name.to_string(),
        email: format!("{}@procura.test", name.to_lowercase()),
        role,
        department_id: department,
        is_active: true,
    }
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_settings(settings())
    }

    pub fn with_settings(settings: EngineSettings) -> Self {
        let store = Arc::new(InMemoryStore::new());
        store.insert_department(Department {
            id: ENGINEERING,
            name: "Engineering".to_string(),
            manager_id: Some(MONA),
        });
        store.insert_user(user(ERIN, "Erin", Role::Employee, Some(ENGINEERING)));
        store.insert_user(user(MONA, "Mona", Role::Manager, Some(ENGINEERING)));
        store.insert_user(user(PACO, "Paco", Role::Procurement, None));
        store.insert_user(user(FIONA, "Fiona", Role::Finance, None));
        store.insert_user(user(CLEO, "Cleo", Role::Ceo, None));
        store.insert_user(user(ADA, "Ada", Role::Admin, None));
        store.insert_user(user(DALE, "Dale", Role::Manager, Some(ENGINEERING)));
        store.insert_user(user(FRANK, "Frank", Role::Finance, None));
        store.insert_user(user(GUS, "Gus", Role::Employee, Some(ENGINEERING)));

        let notifier = Arc::new(RecordingNotifier::new());
        let engine = WorkflowEngine::new(Arc::clone(&store), Arc::clone(&notifier), settings);
        Self {
            store,
            notifier,
            engine,
        }
    }

    pub fn add_step(&self, id: i64, name: &str, order: i32, required: bool) -> WorkflowStep {
        let step = WorkflowStep {
            id: StepId::new(id),
            name: name.to_string(),
            description: None,
            category: RequestCategory::General,
            order_index: order,
            step_type: StepType::Approval,
            is_active: true,
            is_required: required,
            conditions: vec![],
            auto_approve_if_condition_met: false,
            timeout_hours: None,
        };
        self.store.insert_step(step.clone());
        step
    }

    pub fn assign(&self, id: i64, step: i64, assignee: Assignee, priority: u32) {
        self.store.insert_assignment(WorkflowStepAssignment {
            id: AssignmentId::new(id),
            step_id: StepId::new(step),
            assignee,
            is_required: true,
            priority,
            conditions: vec![],
        });
    }

    /// Submits as Erin and verifies as Paco at the submitted amount.
    pub fn submit_verified(&self, amount: Decimal) -> RequestId {
        self.submit_verified_with(NewRequest::purchase("Laptop", amount))
    }

    pub fn submit_verified_with(&self, input: NewRequest) -> RequestId {
        let request = self.engine.submit(input, ERIN).unwrap();
        self.engine
            .process_procurement_verification(request.id, PACO, ProcurementStatus::Verified, None, None)
            .unwrap();
        request.id
    }

    pub fn status(&self, request_id: RequestId) -> RequestStatus {
        self.engine.request(request_id).unwrap().status
    }

    pub fn audit(&self, request_id: RequestId) -> Vec<AuditLogEntry> {
        self.engine.audit_log(request_id).unwrap()
    }

    pub fn count_action(&self, request_id: RequestId, action: AuditAction) -> usize {
        self.audit(request_id).iter().filter(|e| e.action == action).count()
    }

    pub fn notified(&self, user: UserId) -> usize {
        self.notifier.approval_notices_for(user).len()
    }
}
