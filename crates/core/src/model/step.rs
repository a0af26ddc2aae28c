//! Workflow steps and their assignments.

use serde::{Deserialize, Serialize};
use std::fmt;

use procura_shared::types::{AssignmentId, DepartmentId, StepId, UserId};

use super::condition::Condition;
use super::directory::{Role, User};
use super::request::{Request, RequestCategory};
use crate::store::{Directory, StoreError};

/// Kind of work a step represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepType {
    /// One or more approvers must sign off.
    Approval,
    /// Procurement must verify the request.
    Verification,
    /// Informational; completes as soon as it is executed.
    Notification,
}

impl StepType {
    /// Returns the string representation of the step type.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approval => "approval",
            Self::Verification => "verification",
            Self::Notification => "notification",
        }
    }
}

impl fmt::Display for StepType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One configurable unit of work in a category's workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowStep {
    /// Unique identifier.
    pub id: StepId,
    /// Display name; also embedded in audit notes.
    pub name: String,
    /// Optional description.
    pub description: Option<String>,
    /// Category whose requests this step belongs to.
    pub category: RequestCategory,
    /// Position in the category's total order.
    pub order_index: i32,
    /// Kind of step.
    pub step_type: StepType,
    /// Inactive steps never apply.
    pub is_active: bool,
    /// Required steps gate every later step.
    pub is_required: bool,
    /// All conditions must hold for the step to apply.
    #[serde(default)]
    pub conditions: Vec<Condition>,
    /// Complete the step without approvers when it applies.
    #[serde(default)]
    pub auto_approve_if_condition_met: bool,
    /// Hours before a started step counts as overdue.
    pub timeout_hours: Option<u32>,
}

impl WorkflowStep {
    /// Label used in notifications: the step name and its type.
    #[must_use]
    pub fn label(&self) -> String {
        format!("{} ({})", self.name, self.step_type)
    }
}

/// The principal a step assignment targets.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum Assignee {
    /// One specific user.
    User(UserId),
    /// Every active user with the role. `Manager` narrows to the managers of
    /// the requester's department.
    Role(Role),
    /// Every active user in the department.
    Department(DepartmentId),
    /// Users holding an active finance assignment covering the requester's
    /// department.
    FinanceAssignment,
}

impl Assignee {
    /// Resolves the assignee to concrete active users for `request`.
    ///
    /// The requester is never part of the result. Users are returned sorted
    /// by id and de-duplicated.
    pub fn resolve_users<D>(&self, directory: &D, request: &Request) -> Result<Vec<User>, StoreError>
    where
        D: Directory + ?Sized,
    {
        let mut users = match self {
            Self::User(id) => directory.find_user(*id)?.into_iter().collect(),
            Self::Role(Role::Manager) => directory
                .users_with_role(Role::Manager)?
                .into_iter()
                .filter(|u| request.department_id.is_none() || u.department_id == request.department_id)
                .collect(),
            Self::Role(role) => directory.users_with_role(*role)?,
            Self::Department(department_id) => directory.users_in_department(*department_id)?,
            Self::FinanceAssignment => {
                let mut users = Vec::new();
                for assignment in directory.finance_assignments()? {
                    if assignment.covers(request.department_id)
                        && let Some(user) = directory.find_user(assignment.user_id)?
                    {
                        users.push(user);
                    }
                }
                users
            }
        };

        users.retain(|u: &User| u.is_active && u.id != request.requester_id);
        users.sort_by_key(|u| u.id);
        users.dedup_by_key(|u| u.id);
        Ok(users)
    }

    /// Returns true if the assignee targets department managers.
    #[must_use]
    pub fn is_manager_role(&self) -> bool {
        matches!(self, Self::Role(Role::Manager))
    }
}

/// Binds a step to a principal that may act on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowStepAssignment {
    /// Unique identifier.
    pub id: AssignmentId,
    /// The step this assignment belongs to.
    pub step_id: StepId,
    /// Who may act.
    pub assignee: Assignee,
    /// Required assignments must all be satisfied for the step to complete.
    pub is_required: bool,
    /// Number of distinct approvals this assignment needs (minimum 1).
    pub priority: u32,
    /// Assignment applies only when all of these hold.
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

impl WorkflowStepAssignment {
    /// Approvals needed to satisfy this assignment.
    #[must_use]
    pub fn quorum(&self) -> usize {
        usize::try_from(self.priority.max(1)).unwrap_or(usize::MAX)
    }
}
