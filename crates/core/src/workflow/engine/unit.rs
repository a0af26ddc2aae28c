//! Unit of work: one request's history plus the writes of one operation.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use procura_shared::types::{RequestId, StepId, UserId};

use crate::audit::{Actor, AuditAction, AuditLogEntry, ExecutionStatus, StepExecution};
use crate::model::Request;
use crate::notify::{ApprovalNotice, EmployeeNotice, Notification};
use crate::store::{Changeset, RequestRepository};
use crate::workflow::error::WorkflowError;
use crate::workflow::tokens::{ApprovalToken, TokenPurpose};
use crate::workflow::types::RequestStatus;

/// Snapshot of a request with pending appends.
///
/// `audit` and `executions` hold the stored history followed by this
/// operation's rows, so evaluation always sees the latest state.
#[derive(Debug)]
pub(crate) struct UnitOfWork {
    pub(crate) request: Request,
    pub(crate) audit: Vec<AuditLogEntry>,
    pub(crate) executions: Vec<StepExecution>,
    pub(crate) now: DateTime<Utc>,
    audit_base: usize,
    executions_base: usize,
    request_dirty: bool,
    token_ttl_hours: u32,
    issued_tokens: Vec<ApprovalToken>,
    consumed_tokens: Vec<(Uuid, DateTime<Utc>)>,
    outbox: Vec<Notification>,
}

impl UnitOfWork {
    /// Loads a stored request and its history.
    pub(crate) fn load<S>(
        store: &S,
        request_id: RequestId,
        now: DateTime<Utc>,
        token_ttl_hours: u32,
    ) -> Result<Self, WorkflowError>
    where
        S: RequestRepository + ?Sized,
    {
        let request = store
            .find_request(request_id)?
            .ok_or(WorkflowError::RequestNotFound(request_id))?;
        let audit = store.audit_log(request_id)?;
        let executions = store.step_executions(request_id)?;
        Ok(Self {
            audit_base: audit.len(),
            executions_base: executions.len(),
            request,
            audit,
            executions,
            now,
            request_dirty: false,
            token_ttl_hours,
            issued_tokens: Vec::new(),
            consumed_tokens: Vec::new(),
            outbox: Vec::new(),
        })
    }

    /// Starts a unit of work for a request that is not stored yet.
    pub(crate) fn create(request: Request, now: DateTime<Utc>, token_ttl_hours: u32) -> Self {
        Self {
            request,
            audit: Vec::new(),
            executions: Vec::new(),
            now,
            audit_base: 0,
            executions_base: 0,
            request_dirty: true,
            token_ttl_hours,
            issued_tokens: Vec::new(),
            consumed_tokens: Vec::new(),
            outbox: Vec::new(),
        }
    }

    /// Mutable access to the request; marks it for writing.
    pub(crate) fn request_mut(&mut self) -> &mut Request {
        self.request_dirty = true;
        self.request.updated_at = self.now;
        &mut self.request
    }

    pub(crate) fn set_status(&mut self, status: RequestStatus) {
        tracing::debug!(
            request_id = %self.request.id,
            from = %self.request.status,
            to = %status,
            "Request status changed"
        );
        self.request_mut().status = status;
    }

    /// Appends an audit row for this request.
    pub(crate) fn log(&mut self, actor: Actor, action: AuditAction, notes: impl Into<String>) {
        self.audit.push(AuditLogEntry::new(
            Some(self.request.id),
            actor,
            action,
            notes,
            self.now,
        ));
    }

    /// A new execution record for this request, stamped now.
    pub(crate) fn execution(
        &self,
        step_id: Option<StepId>,
        status: ExecutionStatus,
        actor: Actor,
    ) -> StepExecution {
        StepExecution::new(self.request.id, step_id, status, actor, self.now)
    }

    pub(crate) fn record(&mut self, execution: StepExecution) {
        self.executions.push(execution);
    }

    /// Issues a token and queues an approval notice for `approver_id`.
    pub(crate) fn request_action(
        &mut self,
        approver_id: UserId,
        step_id: Option<StepId>,
        step_label: String,
        purpose: TokenPurpose,
    ) {
        let token = ApprovalToken::issue(
            self.request.id,
            approver_id,
            step_id,
            purpose,
            self.now,
            self.token_ttl_hours,
        );
        self.outbox.push(Notification::Approval(ApprovalNotice {
            request_id: self.request.id,
            approver_id,
            step_label,
            token: token.token,
        }));
        self.issued_tokens.push(token);
    }

    /// Queues a status update for the requester.
    pub(crate) fn notify_employee(&mut self, status_tag: &str, reason: Option<String>) {
        self.outbox.push(Notification::Employee(EmployeeNotice {
            request_id: self.request.id,
            employee_id: self.request.requester_id,
            status_tag: status_tag.to_string(),
            reason,
        }));
    }

    pub(crate) fn consume_token(&mut self, token: Uuid) {
        self.consumed_tokens.push((token, self.now));
    }

    /// Splits into the writes to commit and the notices to send afterwards.
    pub(crate) fn into_parts(mut self) -> (Changeset, Vec<Notification>) {
        let audit = self.audit.split_off(self.audit_base);
        let executions = self.executions.split_off(self.executions_base);
        let changes = Changeset {
            request: self.request_dirty.then_some(self.request),
            audit,
            executions,
            issued_tokens: self.issued_tokens,
            consumed_tokens: self.consumed_tokens,
            delegations: Vec::new(),
        };
        (changes, self.outbox)
    }
}
