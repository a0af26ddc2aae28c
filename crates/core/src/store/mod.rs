//! Persistence seams for the workflow engine.
//!
//! The engine reads through these traits and writes every change of one
//! operation through a single [`RequestRepository::commit`] call. The
//! in-memory implementation backs tests and the simulator; a database-backed
//! implementation lives outside this crate.

pub mod memory;

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use procura_shared::types::{DelegationId, DepartmentId, RequestId, StepId, UserId};

use crate::audit::{AuditLogEntry, StepExecution};
use crate::delegation::Delegation;
use crate::model::{
    ApprovalRule, Department, FinanceAssignment, Request, RequestCategory, Role, User,
    WorkflowStep, WorkflowStepAssignment,
};
use crate::workflow::tokens::ApprovalToken;

/// Errors raised by a store implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A write referenced a row that does not exist.
    #[error("{entity} {id} not found")]
    Missing {
        /// Entity kind.
        entity: &'static str,
        /// Raw key.
        id: String,
    },

    /// A write conflicted with the stored state.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Backend failure.
    #[error("Backend error: {0}")]
    Backend(String),
}

/// Users, departments and finance assignments.
pub trait Directory: Send + Sync {
    /// Finds a user by id.
    fn find_user(&self, id: UserId) -> Result<Option<User>, StoreError>;

    /// All users holding `role`, active or not.
    fn users_with_role(&self, role: Role) -> Result<Vec<User>, StoreError>;

    /// All users of a department, active or not.
    fn users_in_department(&self, department_id: DepartmentId) -> Result<Vec<User>, StoreError>;

    /// Finds a department by id.
    fn find_department(&self, id: DepartmentId) -> Result<Option<Department>, StoreError>;

    /// Active finance assignments.
    fn finance_assignments(&self) -> Result<Vec<FinanceAssignment>, StoreError>;
}

/// Workflow configuration: steps, assignments, legacy rules and delegations.
pub trait WorkflowCatalog: Send + Sync {
    /// Every step of a category, active or not.
    fn workflow_steps(&self, category: RequestCategory) -> Result<Vec<WorkflowStep>, StoreError>;

    /// Finds a step by id.
    fn find_step(&self, id: StepId) -> Result<Option<WorkflowStep>, StoreError>;

    /// Assignments of one step.
    fn step_assignments(&self, step_id: StepId) -> Result<Vec<WorkflowStepAssignment>, StoreError>;

    /// Assignments of every step.
    fn all_step_assignments(&self) -> Result<Vec<WorkflowStepAssignment>, StoreError>;

    /// Legacy approval rules of a department.
    fn approval_rules(&self, department_id: DepartmentId) -> Result<Vec<ApprovalRule>, StoreError>;

    /// Delegations covering a step, effective or not.
    fn delegations_for_step(&self, step_id: StepId) -> Result<Vec<Delegation>, StoreError>;

    /// Finds a delegation by id.
    fn find_delegation(&self, id: DelegationId) -> Result<Option<Delegation>, StoreError>;
}

/// Requests and their history.
pub trait RequestRepository: Send + Sync {
    /// Allocates a request id.
    fn next_request_id(&self) -> Result<RequestId, StoreError>;

    /// Allocates a delegation id.
    fn next_delegation_id(&self) -> Result<DelegationId, StoreError>;

    /// Finds a request by id.
    fn find_request(&self, id: RequestId) -> Result<Option<Request>, StoreError>;

    /// Audit rows of a request, oldest first.
    fn audit_log(&self, request_id: RequestId) -> Result<Vec<AuditLogEntry>, StoreError>;

    /// Audit rows not tied to a request, oldest first.
    fn system_audit_log(&self) -> Result<Vec<AuditLogEntry>, StoreError>;

    /// Step executions of a request, oldest first.
    fn step_executions(&self, request_id: RequestId) -> Result<Vec<StepExecution>, StoreError>;

    /// Requests whose status is `Pending Approval`.
    fn in_flight_requests(&self) -> Result<Vec<Request>, StoreError>;

    /// Finds an approval token.
    fn find_token(&self, token: Uuid) -> Result<Option<ApprovalToken>, StoreError>;

    /// Applies every write of `changes` or none of them.
    fn commit(&self, changes: Changeset) -> Result<(), StoreError>;
}

/// Everything the engine needs from persistence.
pub trait WorkflowStore: Directory + WorkflowCatalog + RequestRepository {}

impl<T> WorkflowStore for T where T: Directory + WorkflowCatalog + RequestRepository {}

/// A write to the delegation table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DelegationWrite {
    /// Insert or replace.
    Upsert(Delegation),
    /// Remove.
    Delete(DelegationId),
}

/// All writes of one engine operation.
#[derive(Debug, Clone, Default)]
pub struct Changeset {
    /// New state of the request, if it changed.
    pub request: Option<Request>,
    /// Audit rows to append.
    pub audit: Vec<AuditLogEntry>,
    /// Step executions to append.
    pub executions: Vec<StepExecution>,
    /// Tokens to store.
    pub issued_tokens: Vec<ApprovalToken>,
    /// Tokens to mark used, with the redemption time.
    pub consumed_tokens: Vec<(Uuid, DateTime<Utc>)>,
    /// Delegation writes.
    pub delegations: Vec<DelegationWrite>,
}

impl Changeset {
    /// Returns true if committing would write nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.request.is_none()
            && self.audit.is_empty()
            && self.executions.is_empty()
            && self.issued_tokens.is_empty()
            && self.consumed_tokens.is_empty()
            && self.delegations.is_empty()
    }
}
