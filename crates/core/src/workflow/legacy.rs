//! Legacy threshold routing for requests without dynamic steps.
//!
//! Amount bands decide which roles must approve. A department's own
//! approval rules replace the global thresholds when one of them covers the
//! amount. Stages are approved one after another.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use procura_shared::WorkflowConfig;

use crate::model::{ApprovalRule, Request, Role, User};
use crate::store::{Directory, StoreError};

/// Global amount thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyThresholds {
    /// At or below: approved without anyone.
    pub auto_approval: Decimal,
    /// At or below: a manager alone.
    pub manager_only: Decimal,
    /// Above: the CEO after the manager; otherwise an admin.
    pub ceo_approval: Decimal,
}

impl Default for LegacyThresholds {
    fn default() -> Self {
        Self::from(&WorkflowConfig::default())
    }
}

impl From<&WorkflowConfig> for LegacyThresholds {
    fn from(config: &WorkflowConfig) -> Self {
        Self {
            auto_approval: config.auto_approval_threshold,
            manager_only: config.manager_only_threshold,
            ceo_approval: config.ceo_approval_threshold,
        }
    }
}

/// How a request is routed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LegacyRoute {
    /// No approver needed.
    AutoApproved,
    /// Roles that must approve, in order.
    Stages(Vec<Role>),
}

impl LegacyRoute {
    /// Returns true if any stage needs `role`.
    #[must_use]
    pub fn has_stage(&self, role: Role) -> bool {
        match self {
            Self::AutoApproved => false,
            Self::Stages(stages) => stages.contains(&role),
        }
    }
}

/// Stateless router over thresholds and department rules.
pub struct ThresholdRouter;

impl ThresholdRouter {
    /// Determines the route for `amount`.
    ///
    /// Active `rules` whose band contains the amount become the stages, in
    /// rule order. When none does, the global thresholds apply.
    #[must_use]
    pub fn route(amount: Decimal, rules: &[ApprovalRule], thresholds: &LegacyThresholds) -> LegacyRoute {
        if amount <= thresholds.auto_approval {
            return LegacyRoute::AutoApproved;
        }

        let mut matching: Vec<_> = rules
            .iter()
            .filter(|r| r.is_active && r.contains(amount))
            .collect();
        if !matching.is_empty() {
            matching.sort_by_key(|r| (r.order, r.id));
            return LegacyRoute::Stages(matching.iter().map(|r| r.approver_role).collect());
        }

        if amount <= thresholds.manager_only {
            LegacyRoute::Stages(vec![Role::Manager])
        } else if amount > thresholds.ceo_approval {
            LegacyRoute::Stages(vec![Role::Manager, Role::Ceo])
        } else {
            LegacyRoute::Stages(vec![Role::Manager, Role::Admin])
        }
    }

    /// Users notified for a stage.
    ///
    /// A manager stage goes to one user: the department's designated
    /// manager, else its lowest-id manager, else the admins. Other roles fall back to the admins when nobody holds
    /// them. The requester is never a candidate.
    pub fn stage_candidates<D>(directory: &D, role: Role, request: &Request) -> Result<Vec<User>, StoreError>
    where
        D: Directory + ?Sized,
    {
        let eligible = |u: &User| u.is_active && u.id != request.requester_id;

        let mut candidates: Vec<User> = match role {
            Role::Manager => {
                let department = match request.department_id {
                    Some(id) => directory.find_department(id)?,
                    None => None,
                };
                let designated = match department.and_then(|d| d.manager_id) {
                    Some(manager_id) => directory.find_user(manager_id)?.filter(|u| eligible(u)),
                    None => None,
                };
                let manager = match designated {
                    Some(manager) => Some(manager),
                    None => directory
                        .users_with_role(Role::Manager)?
                        .into_iter()
                        .filter(|u| eligible(u) && request.department_id.is_some() && u.department_id == request.department_id)
                        .min_by_key(|u| u.id),
                };
                manager.into_iter().collect()
            }
            other => directory
                .users_with_role(other)?
                .into_iter()
                .filter(|u| eligible(u))
                .collect(),
        };

        if candidates.is_empty() && role != Role::Admin {
            candidates = directory
                .users_with_role(Role::Admin)?
                .into_iter()
                .filter(|u| eligible(u))
                .collect();
        }
        candidates.sort_by_key(|u| u.id);
        Ok(candidates)
    }

    /// Returns true if `approver` counts for a stage of `role`.
    ///
    /// Admins count for every stage; otherwise the approver must be a
    /// candidate or hold the role (managers only within the department).
    #[must_use]
    pub fn qualifies(approver: &User, role: Role, request: &Request, candidates: &[User]) -> bool {
        if approver.is_admin() || candidates.iter().any(|c| c.id == approver.id) {
            return true;
        }
        match role {
            Role::Manager => {
                approver.role == Role::Manager
                    && approver.department_id.is_some()
                    && approver.department_id == request.department_id
            }
            other => approver.role == other,
        }
    }

    /// Returns true if `user` may approve a legacy-routed request.
    ///
    /// Admins always may; managers within the requester's department; the
    /// CEO when the route has a CEO stage; procurement staff when some step
    /// assignment targets them. Nobody approves twice or approves their own
    /// request.
    #[must_use]
    pub fn can_approve(
        user: &User,
        request: &Request,
        route: &LegacyRoute,
        has_step_assignment: bool,
        already_approved: bool,
    ) -> bool {
        if !user.is_active || already_approved || user.id == request.requester_id {
            return false;
        }
        match user.role {
            Role::Admin => true,
            Role::Manager => user.department_id.is_some() && user.department_id == request.department_id,
            Role::Ceo => route.has_stage(Role::Ceo),
            Role::Procurement => has_step_assignment,
            Role::Employee | Role::Finance => false,
        }
    }
}
