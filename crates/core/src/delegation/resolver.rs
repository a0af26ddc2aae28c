//! Substitutes effective delegates for nominal approvers.

use chrono::{DateTime, Utc};

use procura_shared::types::{DelegationId, StepId, UserId};

use super::types::Delegation;
use crate::model::{Request, User};
use crate::store::{Directory, StoreError};

/// A user who may act on a step, and whom they act for.
#[derive(Debug, Clone, PartialEq)]
pub struct EffectiveApprover {
    /// The acting user.
    pub user: User,
    /// Delegators this user stands in for. Empty for a nominal approver.
    pub on_behalf_of: Vec<UserId>,
    /// Grants that routed the step to this user, parallel to `on_behalf_of`.
    pub delegations: Vec<DelegationId>,
    /// The user is also a nominal approver in their own right.
    pub is_nominal: bool,
}

impl EffectiveApprover {
    fn nominal(user: User) -> Self {
        Self {
            user,
            on_behalf_of: Vec::new(),
            delegations: Vec::new(),
            is_nominal: true,
        }
    }

    /// Grant that routed the step here, if the user is not a nominal approver.
    #[must_use]
    pub fn routing_delegation(&self) -> Option<DelegationId> {
        if self.is_nominal {
            None
        } else {
            self.delegations.first().copied()
        }
    }

    /// Returns true if `user_id` approving here counts for `principal`.
    #[must_use]
    pub fn covers(&self, principal: UserId) -> bool {
        (self.is_nominal && self.user.id == principal) || self.on_behalf_of.contains(&principal)
    }
}

/// Stateless delegation resolution.
pub struct DelegationResolver;

impl DelegationResolver {
    /// Returns true if `delegator` may delegate to `delegate`.
    ///
    /// Anyone may delegate to anyone except themselves.
    #[must_use]
    pub fn can_delegate_to(delegator: UserId, delegate: UserId) -> bool {
        delegator != delegate
    }

    /// Grants that apply to `delegator` on `step_id` at `now`, oldest first.
    #[must_use]
    pub fn find_effective<'a>(
        delegations: &'a [Delegation],
        delegator: UserId,
        step_id: StepId,
        request: &Request,
        now: DateTime<Utc>,
    ) -> Vec<&'a Delegation> {
        let mut grants: Vec<&Delegation> = delegations
            .iter()
            .filter(|d| {
                d.delegator_id == delegator
                    && d.delegate_id != delegator
                    && d.applies_to(step_id, request.department_id)
                    && d.is_effective(now)
            })
            .collect();
        grants.sort_by_key(|d| (d.created_at, d.id));
        grants
    }

    /// Resolves the users who actually receive `step_id` for `request`.
    ///
    /// Each nominal user with effective grants is replaced by every delegate
    /// of those grants. Delegates that are missing, inactive, or the
    /// requester are skipped; when none is left the nominal user stays.
    /// Chains are not followed. The result is de-duplicated by user id and
    /// sorted by id.
    pub fn effective_approvers<D>(
        directory: &D,
        request: &Request,
        step_id: StepId,
        nominal: &[User],
        delegations: &[Delegation],
        now: DateTime<Utc>,
    ) -> Result<Vec<EffectiveApprover>, StoreError>
    where
        D: Directory + ?Sized,
    {
        let mut resolved: Vec<EffectiveApprover> = Vec::with_capacity(nominal.len());

        for user in nominal {
            let mut substitutes: Vec<(User, DelegationId)> = Vec::new();
            for grant in Self::find_effective(delegations, user.id, step_id, request, now) {
                if substitutes.iter().any(|(d, _)| d.id == grant.delegate_id) {
                    continue;
                }
                if let Some(delegate) = directory
                    .find_user(grant.delegate_id)?
                    .filter(|d| d.is_active && d.id != request.requester_id)
                {
                    substitutes.push((delegate, grant.id));
                }
            }

            if substitutes.is_empty() {
                if let Some(existing) = resolved.iter_mut().find(|a| a.user.id == user.id) {
                    existing.is_nominal = true;
                } else {
                    resolved.push(EffectiveApprover::nominal(user.clone()));
                }
                continue;
            }

            for (delegate, grant_id) in substitutes {
                tracing::debug!(
                    step_id = %step_id,
                    delegator = %user.id,
                    delegate = %delegate.id,
                    "Delegation substituted"
                );
                if let Some(existing) = resolved.iter_mut().find(|a| a.user.id == delegate.id) {
                    if !existing.on_behalf_of.contains(&user.id) {
                        existing.on_behalf_of.push(user.id);
                        existing.delegations.push(grant_id);
                    }
                } else {
                    resolved.push(EffectiveApprover {
                        user: delegate,
                        on_behalf_of: vec![user.id],
                        delegations: vec![grant_id],
                        is_nominal: false,
                    });
                }
            }
        }

        resolved.sort_by_key(|a| a.user.id);
        Ok(resolved)
    }
}
