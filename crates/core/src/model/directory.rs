//! Users, roles, and departments.

use serde::{Deserialize, Serialize};
use std::fmt;

use procura_shared::types::{DepartmentId, UserId};

/// Organizational role of a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Submits requests.
    Employee,
    /// Verifies availability and places orders.
    Procurement,
    /// Reviews spend; may hold finance assignments.
    Finance,
    /// Approves requests from their department.
    Manager,
    /// Approves high-value requests.
    Ceo,
    /// Full access.
    Admin,
}

impl Role {
    /// Parse a role from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "employee" => Some(Self::Employee),
            "procurement" => Some(Self::Procurement),
            "finance" => Some(Self::Finance),
            "manager" => Some(Self::Manager),
            "ceo" => Some(Self::Ceo),
            "admin" => Some(Self::Admin),
            _ => None,
        }
    }

    /// Returns the string representation of the role.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Employee => "employee",
            Self::Procurement => "procurement",
            Self::Finance => "finance",
            Self::Manager => "manager",
            Self::Ceo => "ceo",
            Self::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A user of the system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Unique identifier.
    pub id: UserId,
    /// Display name.
    pub name: String,
    /// Email address used by the notification collaborator.
    pub email: String,
    /// Organizational role.
    pub role: Role,
    /// Home department, if any.
    pub department_id: Option<DepartmentId>,
    /// Inactive users are never resolved as approvers.
    pub is_active: bool,
}

impl User {
    /// Returns true if the user holds the given role.
    #[must_use]
    pub fn has_role(&self, role: Role) -> bool {
        self.role == role
    }

    /// Returns true if the user is an administrator.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// A department.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Department {
    /// Unique identifier.
    pub id: DepartmentId,
    /// Department name.
    pub name: String,
    /// The department's designated manager.
    pub manager_id: Option<UserId>,
}

/// Standing assignment of a finance user to review requests.
///
/// A `None` department means the assignment covers every department.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinanceAssignment {
    /// The assigned user.
    pub user_id: UserId,
    /// Department scope.
    pub department_id: Option<DepartmentId>,
    /// Only active assignments are considered.
    pub is_active: bool,
}

impl FinanceAssignment {
    /// Returns true if this assignment covers requests from `department`.
    #[must_use]
    pub fn covers(&self, department: Option<DepartmentId>) -> bool {
        self.is_active && (self.department_id.is_none() || self.department_id == department)
    }
}
