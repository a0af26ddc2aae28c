//! Delegation records and their inputs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use procura_shared::types::{DelegationId, DepartmentId, StepId, UserId};

/// A grant of one step's approval authority from a delegator to a delegate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delegation {
    /// Unique identifier.
    pub id: DelegationId,
    /// User whose authority is delegated.
    pub delegator_id: UserId,
    /// User who acts instead.
    pub delegate_id: UserId,
    /// Step the grant covers.
    pub workflow_step_id: StepId,
    /// Restricts the grant to requests of this department.
    pub department_id: Option<DepartmentId>,
    /// Start of the window (inclusive).
    pub starts_at: Option<DateTime<Utc>>,
    /// End of the window (exclusive).
    pub expires_at: Option<DateTime<Utc>>,
    /// Cleared when the delegate rejects the grant.
    pub is_active: bool,
    /// Why the delegation exists.
    pub reason: Option<String>,
    /// Why the delegate refused it.
    pub reject_reason: Option<String>,
    /// Stored for administration; chains are never followed.
    pub can_delegate_further: bool,
    /// When the grant was created.
    pub created_at: DateTime<Utc>,
}

impl Delegation {
    /// Returns true if the grant is active and `now` lies inside its window.
    #[must_use]
    pub fn is_effective(&self, now: DateTime<Utc>) -> bool {
        self.is_active
            && self.starts_at.is_none_or(|start| now >= start)
            && self.expires_at.is_none_or(|end| now < end)
    }

    /// Returns true if the grant covers `step_id` for a request of `department_id`.
    #[must_use]
    pub fn applies_to(&self, step_id: StepId, department_id: Option<DepartmentId>) -> bool {
        self.workflow_step_id == step_id
            && self
                .department_id
                .is_none_or(|scope| department_id == Some(scope))
    }

    /// Returns true if the window is well formed.
    #[must_use]
    pub fn has_valid_window(&self) -> bool {
        valid_window(self.starts_at, self.expires_at)
    }
}

pub(crate) fn valid_window(starts_at: Option<DateTime<Utc>>, expires_at: Option<DateTime<Utc>>) -> bool {
    match (starts_at, expires_at) {
        (Some(start), Some(end)) => end > start,
        _ => true,
    }
}

/// Input for creating a delegation. The delegator is the acting user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewDelegation {
    /// User who acts instead.
    pub delegate_id: UserId,
    /// Step the grant covers.
    pub workflow_step_id: StepId,
    /// Optional department scope.
    pub department_id: Option<DepartmentId>,
    /// Start of the window.
    pub starts_at: Option<DateTime<Utc>>,
    /// End of the window.
    pub expires_at: Option<DateTime<Utc>>,
    /// Why the delegation exists.
    pub reason: Option<String>,
    /// Stored only.
    #[serde(default)]
    pub can_delegate_further: bool,
}

impl NewDelegation {
    /// An open-ended grant for one step.
    #[must_use]
    pub fn for_step(delegate_id: UserId, workflow_step_id: StepId) -> Self {
        Self {
            delegate_id,
            workflow_step_id,
            department_id: None,
            starts_at: None,
            expires_at: None,
            reason: None,
            can_delegate_further: false,
        }
    }
}

/// Changes a delegator may make to an existing grant. `None` keeps the field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegationUpdate {
    /// New delegate.
    pub delegate_id: Option<UserId>,
    /// New start of the window.
    pub starts_at: Option<DateTime<Utc>>,
    /// New end of the window.
    pub expires_at: Option<DateTime<Utc>>,
    /// New reason.
    pub reason: Option<String>,
    /// Re-activate or deactivate the grant.
    pub is_active: Option<bool>,
}

impl DelegationUpdate {
    /// Applies the update to `delegation`.
    pub fn apply_to(self, delegation: &mut Delegation) {
        if let Some(delegate_id) = self.delegate_id {
            delegation.delegate_id = delegate_id;
        }
        if let Some(starts_at) = self.starts_at {
            delegation.starts_at = Some(starts_at);
        }
        if let Some(expires_at) = self.expires_at {
            delegation.expires_at = Some(expires_at);
        }
        if let Some(reason) = self.reason {
            delegation.reason = Some(reason);
        }
        if let Some(is_active) = self.is_active {
            delegation.is_active = is_active;
            if is_active {
                delegation.reject_reason = None;
            }
        }
    }
}
