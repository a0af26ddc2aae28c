//! In-memory store backed by `DashMap` tables.

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use uuid::Uuid;

use procura_shared::types::{
    ApprovalRuleId, AssignmentId, DelegationId, DepartmentId, RequestId, StepId, UserId,
};

use super::{
    Changeset, DelegationWrite, Directory, RequestRepository, StoreError, WorkflowCatalog,
};
use crate::audit::{AuditLogEntry, StepExecution};
use crate::delegation::Delegation;
use crate::model::{
    ApprovalRule, Department, FinanceAssignment, Request, RequestCategory, Role, User,
    WorkflowStep, WorkflowStepAssignment,
};
use crate::workflow::tokens::ApprovalToken;
use crate::workflow::types::RequestStatus;

/// Thread-safe store holding every table in memory.
///
/// Commits are serialized and applied under a write gate, so readers never
/// observe half of a changeset.
#[derive(Debug)]
pub struct InMemoryStore {
    users: DashMap<UserId, User>,
    departments: DashMap<DepartmentId, Department>,
    finance_assignments: RwLock<Vec<FinanceAssignment>>,
    steps: DashMap<StepId, WorkflowStep>,
    assignments: DashMap<AssignmentId, WorkflowStepAssignment>,
    rules: DashMap<ApprovalRuleId, ApprovalRule>,
    delegations: DashMap<DelegationId, Delegation>,
    requests: DashMap<RequestId, Request>,
    audit: DashMap<RequestId, Vec<AuditLogEntry>>,
    system_audit: RwLock<Vec<AuditLogEntry>>,
    executions: DashMap<RequestId, Vec<StepExecution>>,
    tokens: DashMap<Uuid, ApprovalToken>,
    next_request: AtomicI64,
    next_delegation: AtomicI64,
    gate: RwLock<()>,
    commit_lock: Mutex<()>,
    fail_commits: AtomicBool,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            users: DashMap::new(),
            departments: DashMap::new(),
            finance_assignments: RwLock::new(Vec::new()),
            steps: DashMap::new(),
            assignments: DashMap::new(),
            rules: DashMap::new(),
            delegations: DashMap::new(),
            requests: DashMap::new(),
            audit: DashMap::new(),
            system_audit: RwLock::new(Vec::new()),
            executions: DashMap::new(),
            tokens: DashMap::new(),
            next_request: AtomicI64::new(1),
            next_delegation: AtomicI64::new(1),
            gate: RwLock::new(()),
            commit_lock: Mutex::new(()),
            fail_commits: AtomicBool::new(false),
        }
    }

    /// Adds or replaces a user.
    pub fn insert_user(&self, user: User) {
        self.users.insert(user.id, user);
    }

    /// Adds or replaces a department.
    pub fn insert_department(&self, department: Department) {
        self.departments.insert(department.id, department);
    }

    /// Adds a finance assignment.
    pub fn insert_finance_assignment(&self, assignment: FinanceAssignment) {
        self.finance_assignments.write().push(assignment);
    }

    /// Adds or replaces a workflow step.
    pub fn insert_step(&self, step: WorkflowStep) {
        self.steps.insert(step.id, step);
    }

    /// Adds or replaces a step assignment.
    pub fn insert_assignment(&self, assignment: WorkflowStepAssignment) {
        self.assignments.insert(assignment.id, assignment);
    }

    /// Adds or replaces a legacy approval rule.
    pub fn insert_rule(&self, rule: ApprovalRule) {
        self.rules.insert(rule.id, rule);
    }

    /// Adds or replaces a delegation, bypassing the engine.
    pub fn insert_delegation(&self, delegation: Delegation) {
        self.next_delegation
            .fetch_max(delegation.id.into_inner() + 1, Ordering::SeqCst);
        self.delegations.insert(delegation.id, delegation);
    }

    /// Adds or replaces a request, bypassing the engine.
    pub fn insert_request(&self, request: Request) {
        self.next_request
            .fetch_max(request.id.into_inner() + 1, Ordering::SeqCst);
        self.requests.insert(request.id, request);
    }

    /// Appends an audit row directly, as rows written by older releases were.
    pub fn append_audit(&self, entry: AuditLogEntry) {
        let _gate = self.gate.write();
        self.push_audit(entry);
    }

    /// Makes every following commit fail with a backend error.
    pub fn set_fail_commits(&self, fail: bool) {
        self.fail_commits.store(fail, Ordering::SeqCst);
    }

    fn push_audit(&self, entry: AuditLogEntry) {
        match entry.request_id {
            Some(request_id) => self.audit.entry(request_id).or_default().push(entry),
            None => self.system_audit.write().push(entry),
        }
    }

    fn validate(&self, changes: &Changeset) -> Result<(), StoreError> {
        for (token, _) in &changes.consumed_tokens {
            let stored = self.tokens.get(token).ok_or_else(|| StoreError::Missing {
                entity: "token",
                id: token.to_string(),
            })?;
            if stored.used_at.is_some() {
                return Err(StoreError::Conflict(format!("token {token} already used")));
            }
        }
        for write in &changes.delegations {
            if let DelegationWrite::Delete(id) = write
                && !self.delegations.contains_key(id)
            {
                return Err(StoreError::Missing {
                    entity: "delegation",
                    id: id.to_string(),
                });
            }
        }
        Ok(())
    }
}

impl Directory for InMemoryStore {
    fn find_user(&self, id: UserId) -> Result<Option<User>, StoreError> {
        Ok(self.users.get(&id).map(|u| u.clone()))
    }

    fn users_with_role(&self, role: Role) -> Result<Vec<User>, StoreError> {
        let mut users: Vec<User> = self
            .users
            .iter()
            .filter(|u| u.role == role)
            .map(|u| u.clone())
            .collect();
        users.sort_by_key(|u| u.id);
        Ok(users)
    }

    fn users_in_department(&self, department_id: DepartmentId) -> Result<Vec<User>, StoreError> {
        let mut users: Vec<User> = self
            .users
            .iter()
            .filter(|u| u.department_id == Some(department_id))
            .map(|u| u.clone())
            .collect();
        users.sort_by_key(|u| u.id);
        Ok(users)
    }

    fn find_department(&self, id: DepartmentId) -> Result<Option<Department>, StoreError> {
        Ok(self.departments.get(&id).map(|d| d.clone()))
    }

    fn finance_assignments(&self) -> Result<Vec<FinanceAssignment>, StoreError> {
        Ok(self
            .finance_assignments
            .read()
            .iter()
            .filter(|a| a.is_active)
            .cloned()
            .collect())
    }
}

impl WorkflowCatalog for InMemoryStore {
    fn workflow_steps(&self, category: RequestCategory) -> Result<Vec<WorkflowStep>, StoreError> {
        let mut steps: Vec<WorkflowStep> = self
            .steps
            .iter()
            .filter(|s| s.category == category)
            .map(|s| s.clone())
            .collect();
        steps.sort_by_key(|s| (s.order_index, s.id));
        Ok(steps)
    }

    fn find_step(&self, id: StepId) -> Result<Option<WorkflowStep>, StoreError> {
        Ok(self.steps.get(&id).map(|s| s.clone()))
    }

    fn step_assignments(&self, step_id: StepId) -> Result<Vec<WorkflowStepAssignment>, StoreError> {
        let mut assignments: Vec<WorkflowStepAssignment> = self
            .assignments
            .iter()
            .filter(|a| a.step_id == step_id)
            .map(|a| a.clone())
            .collect();
        assignments.sort_by_key(|a| a.id);
        Ok(assignments)
    }

    fn all_step_assignments(&self) -> Result<Vec<WorkflowStepAssignment>, StoreError> {
        let mut assignments: Vec<WorkflowStepAssignment> =
            self.assignments.iter().map(|a| a.clone()).collect();
        assignments.sort_by_key(|a| a.id);
        Ok(assignments)
    }

    fn approval_rules(&self, department_id: DepartmentId) -> Result<Vec<ApprovalRule>, StoreError> {
        let mut rules: Vec<ApprovalRule> = self
            .rules
            .iter()
            .filter(|r| r.department_id == department_id)
            .map(|r| r.clone())
            .collect();
        rules.sort_by_key(|r| (r.order, r.id));
        Ok(rules)
    }

    fn delegations_for_step(&self, step_id: StepId) -> Result<Vec<Delegation>, StoreError> {
        let mut delegations: Vec<Delegation> = self
            .delegations
            .iter()
            .filter(|d| d.workflow_step_id == step_id)
            .map(|d| d.clone())
            .collect();
        delegations.sort_by_key(|d| d.id);
        Ok(delegations)
    }

    fn find_delegation(&self, id: DelegationId) -> Result<Option<Delegation>, StoreError> {
        Ok(self.delegations.get(&id).map(|d| d.clone()))
    }
}

impl RequestRepository for InMemoryStore {
    fn next_request_id(&self) -> Result<RequestId, StoreError> {
        Ok(RequestId::new(self.next_request.fetch_add(1, Ordering::SeqCst)))
    }

    fn next_delegation_id(&self) -> Result<DelegationId, StoreError> {
        Ok(DelegationId::new(
            self.next_delegation.fetch_add(1, Ordering::SeqCst),
        ))
    }

    fn find_request(&self, id: RequestId) -> Result<Option<Request>, StoreError> {
        let _gate = self.gate.read();
        Ok(self.requests.get(&id).map(|r| r.clone()))
    }

    fn audit_log(&self, request_id: RequestId) -> Result<Vec<AuditLogEntry>, StoreError> {
        let _gate = self.gate.read();
        Ok(self
            .audit
            .get(&request_id)
            .map(|rows| rows.clone())
            .unwrap_or_default())
    }

    fn system_audit_log(&self) -> Result<Vec<AuditLogEntry>, StoreError> {
        let _gate = self.gate.read();
        Ok(self.system_audit.read().clone())
    }

    fn step_executions(&self, request_id: RequestId) -> Result<Vec<StepExecution>, StoreError> {
        let _gate = self.gate.read();
        Ok(self
            .executions
            .get(&request_id)
            .map(|rows| rows.clone())
            .unwrap_or_default())
    }

    fn in_flight_requests(&self) -> Result<Vec<Request>, StoreError> {
        let _gate = self.gate.read();
        let mut requests: Vec<Request> = self
            .requests
            .iter()
            .filter(|r| r.status == RequestStatus::PendingApproval)
            .map(|r| r.clone())
            .collect();
        requests.sort_by_key(|r| r.id);
        Ok(requests)
    }

    fn find_token(&self, token: Uuid) -> Result<Option<ApprovalToken>, StoreError> {
        let _gate = self.gate.read();
        Ok(self.tokens.get(&token).map(|t| t.clone()))
    }

    fn commit(&self, changes: Changeset) -> Result<(), StoreError> {
        let _serial = self.commit_lock.lock();
        if self.fail_commits.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("commit rejected".to_string()));
        }
        self.validate(&changes)?;

        let _gate = self.gate.write();
        if let Some(request) = changes.request {
            self.requests.insert(request.id, request);
        }
        for entry in changes.audit {
            self.push_audit(entry);
        }
        for execution in changes.executions {
            self.executions
                .entry(execution.request_id)
                .or_default()
                .push(execution);
        }
        for token in changes.issued_tokens {
            self.tokens.insert(token.token, token);
        }
        for (token, used_at) in changes.consumed_tokens {
            if let Some(mut stored) = self.tokens.get_mut(&token) {
                stored.used_at = Some(used_at);
            }
        }
        for write in changes.delegations {
            match write {
                DelegationWrite::Upsert(delegation) => {
                    self.delegations.insert(delegation.id, delegation);
                }
                DelegationWrite::Delete(id) => {
                    self.delegations.remove(&id);
                }
            }
        }
        Ok(())
    }
}
