//! Audit log and step execution types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use procura_shared::types::{DelegationId, RequestId, StepId, UserId};

/// Who performed an audited action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "user_id", rename_all = "lowercase")]
pub enum Actor {
    /// A person.
    Human(UserId),
    /// The engine itself (auto-approvals, routing, sweeps).
    System,
}

impl Actor {
    /// Returns the user behind the action, if any.
    #[must_use]
    pub fn user_id(&self) -> Option<UserId> {
        match self {
            Self::Human(id) => Some(*id),
            Self::System => None,
        }
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Human(id) => write!(f, "user {id}"),
            Self::System => write!(f, "system"),
        }
    }
}

/// Controlled vocabulary of audit actions.
///
/// The strings are a persisted format shared with existing audit history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum AuditAction {
    /// Request created.
    Submitted,
    /// Step (or legacy stage) routed to approvers.
    StepForwarded,
    /// One approver signed off on a step.
    WorkflowStepCompleted,
    /// A step was rejected.
    WorkflowStepRejected,
    /// A step was abandoned because the request closed.
    WorkflowStepCancelled,
    /// A step exceeded its timeout.
    WorkflowStepDelayed,
    /// A step reached completion.
    StepCompleted,
    /// Every required step is complete.
    AllApprovalsComplete,
    /// A delegate replaced an approver.
    DelegationApplied,
    /// Delegation granted.
    DelegationCreated,
    /// Delegation edited.
    DelegationUpdated,
    /// Delegation removed.
    DelegationDeleted,
    /// Delegate declined the delegation.
    DelegationRejected,
    /// Work forwarded to a removed delegate was handed back.
    DelegationRollback,
    /// Legacy routing approval.
    Approved,
    /// Request rejected.
    Rejected,
    /// Request approved below the auto-approval threshold.
    AutoApproved,
    /// Post-approval procurement status change.
    ProcurementUpdated,
    /// Cancelled request reopened.
    RequestRolledBack,
}

impl AuditAction {
    const ALL: [Self; 19] = [
        Self::Submitted,
        Self::StepForwarded,
        Self::WorkflowStepCompleted,
        Self::WorkflowStepRejected,
        Self::WorkflowStepCancelled,
        Self::WorkflowStepDelayed,
        Self::StepCompleted,
        Self::AllApprovalsComplete,
        Self::DelegationApplied,
        Self::DelegationCreated,
        Self::DelegationUpdated,
        Self::DelegationDeleted,
        Self::DelegationRejected,
        Self::DelegationRollback,
        Self::Approved,
        Self::Rejected,
        Self::AutoApproved,
        Self::ProcurementUpdated,
        Self::RequestRolledBack,
    ];

    /// Returns the persisted string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Submitted => "Submitted",
            Self::StepForwarded => "Step Forwarded",
            Self::WorkflowStepCompleted => "Workflow Step Completed",
            Self::WorkflowStepRejected => "Workflow Step Rejected",
            Self::WorkflowStepCancelled => "Workflow Step Cancelled",
            Self::WorkflowStepDelayed => "Workflow Step Delayed",
            Self::StepCompleted => "Step completed",
            Self::AllApprovalsComplete => "All Approvals Complete",
            Self::DelegationApplied => "Delegation Applied",
            Self::DelegationCreated => "Delegation Created",
            Self::DelegationUpdated => "Delegation Updated",
            Self::DelegationDeleted => "Delegation Deleted",
            Self::DelegationRejected => "Delegation Rejected",
            Self::DelegationRollback => "Delegation Rollback",
            Self::Approved => "Approved",
            Self::Rejected => "Rejected",
            Self::AutoApproved => "Auto Approved",
            Self::ProcurementUpdated => "Procurement Updated",
            Self::RequestRolledBack => "Request Rolled Back",
        }
    }

    /// Parses the persisted string. Matching is exact: `Step completed` and
    /// `Workflow Step Completed` are different actions.
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|action| action.as_str() == s)
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<AuditAction> for String {
    fn from(action: AuditAction) -> Self {
        action.as_str().to_string()
    }
}

impl TryFrom<String> for AuditAction {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value).ok_or_else(|| format!("Unknown audit action: {value}"))
    }
}

/// One immutable audit log row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditLogEntry {
    /// Request the row belongs to; `None` for delegation administration.
    pub request_id: Option<RequestId>,
    /// Who acted.
    pub actor: Actor,
    /// What happened.
    pub action: AuditAction,
    /// Free text; step rows embed the step name and `Step ID: N`.
    pub notes: String,
    /// When it happened.
    pub created_at: DateTime<Utc>,
}

impl AuditLogEntry {
    /// Creates a row.
    #[must_use]
    pub fn new(
        request_id: Option<RequestId>,
        actor: Actor,
        action: AuditAction,
        notes: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            request_id,
            actor,
            action,
            notes: notes.into(),
            created_at,
        }
    }
}

/// State reached by a step for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    /// Step routed to `target`.
    Forwarded,
    /// `actor` approved (possibly on behalf of delegators).
    Approved,
    /// Step satisfied.
    Completed,
    /// Step rejected.
    Rejected,
    /// Step abandoned because the request closed.
    Cancelled,
    /// Step exceeded its timeout.
    Delayed,
}

/// Explicit record of a step state change for one request.
///
/// `step_id` is `None` for approvals and forwards made by the legacy
/// threshold router, which has no configured steps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepExecution {
    /// Request the record belongs to.
    pub request_id: RequestId,
    /// Step the record belongs to.
    pub step_id: Option<StepId>,
    /// New state.
    pub status: ExecutionStatus,
    /// Who caused the change.
    pub actor: Actor,
    /// For `Forwarded`: the user the step was routed to.
    pub target: Option<UserId>,
    /// For `Approved` by a delegate: the delegators the approval stands for.
    #[serde(default)]
    pub on_behalf_of: Vec<UserId>,
    /// Delegation that produced a forward or an approval.
    pub delegation_id: Option<DelegationId>,
    /// When it happened.
    pub at: DateTime<Utc>,
}

impl StepExecution {
    /// Creates a record with no target, delegation, or delegators.
    #[must_use]
    pub fn new(
        request_id: RequestId,
        step_id: Option<StepId>,
        status: ExecutionStatus,
        actor: Actor,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            request_id,
            step_id,
            status,
            actor,
            target: None,
            on_behalf_of: Vec::new(),
            delegation_id: None,
            at,
        }
    }
}
