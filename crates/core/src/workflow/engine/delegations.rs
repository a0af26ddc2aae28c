//! Delegation administration and the rollback pass run on deletion.

use chrono::{DateTime, Utc};

use procura_shared::types::{DelegationId, RequestId, UserId};

use crate::audit::notes::step_notes;
use crate::audit::{Actor, AuditAction, AuditLogEntry, ExecutionStatus};
use crate::delegation::{Delegation, DelegationResolver, DelegationUpdate, NewDelegation, valid_window};
use crate::notify::Notifier;
use crate::store::{Changeset, DelegationWrite, WorkflowStore};
use crate::workflow::error::WorkflowError;
use crate::workflow::tokens::TokenPurpose;

use super::{UnitOfWork, WorkflowEngine};

fn admin_entry(actor: UserId, action: AuditAction, notes: String, now: DateTime<Utc>) -> AuditLogEntry {
    AuditLogEntry::new(None, Actor::Human(actor), action, notes, now)
}

impl<S, N> WorkflowEngine<S, N>
where
    S: WorkflowStore,
    N: Notifier,
{
    fn require_delegation(&self, id: DelegationId) -> Result<Delegation, WorkflowError> {
        self.store
            .find_delegation(id)?
            .ok_or(WorkflowError::DelegationNotFound(id))
    }

    fn write_delegation(&self, write: DelegationWrite, entry: AuditLogEntry) -> Result<(), WorkflowError> {
        self.commit_changes(Changeset {
            audit: vec![entry],
            delegations: vec![write],
            ..Changeset::default()
        })
    }

    /// Grants `delegator_id`'s authority on one step to another user.
    pub fn create_delegation(
        &self,
        delegator_id: UserId,
        input: NewDelegation,
    ) -> Result<Delegation, WorkflowError> {
        let delegator = self.require_user(delegator_id)?;
        if !delegator.is_active {
            return Err(WorkflowError::NotAuthorized {
                user_id: delegator_id,
                action: "delegate",
            });
        }
        if !DelegationResolver::can_delegate_to(delegator_id, input.delegate_id) {
            return Err(WorkflowError::SelfDelegation);
        }
        let delegate = self.require_user(input.delegate_id)?;
        let step = self
            .store
            .find_step(input.workflow_step_id)?
            .ok_or(WorkflowError::StepNotFound(input.workflow_step_id))?;
        if !valid_window(input.starts_at, input.expires_at) {
            return Err(WorkflowError::InvalidDelegationWindow);
        }

        let now = Utc::now();
        let delegation = Delegation {
            id: self.store.next_delegation_id()?,
            delegator_id,
            delegate_id: delegate.id,
            workflow_step_id: step.id,
            department_id: input.department_id,
            starts_at: input.starts_at,
            expires_at: input.expires_at,
            is_active: true,
            reason: input.reason,
            reject_reason: None,
            can_delegate_further: input.can_delegate_further,
            created_at: now,
        };
        let notes = step_notes(
            &step,
            &format!("{} delegated to {} (delegation {})", delegator.name, delegate.name, delegation.id),
        );
        self.write_delegation(
            DelegationWrite::Upsert(delegation.clone()),
            admin_entry(delegator_id, AuditAction::DelegationCreated, notes, now),
        )?;
        tracing::info!(
            delegation_id = %delegation.id,
            delegator_id = %delegator_id,
            delegate_id = %delegation.delegate_id,
            step_id = %step.id,
            "Delegation created"
        );
        Ok(delegation)
    }

    /// Edits a delegation. Only its delegator may.
    pub fn update_delegation(
        &self,
        actor_id: UserId,
        id: DelegationId,
        update: DelegationUpdate,
    ) -> Result<Delegation, WorkflowError> {
        let mut delegation = self.require_delegation(id)?;
        if delegation.delegator_id != actor_id {
            return Err(WorkflowError::NotDelegationParty {
                user_id: actor_id,
                delegation_id: id,
            });
        }
        if let Some(delegate_id) = update.delegate_id {
            if !DelegationResolver::can_delegate_to(actor_id, delegate_id) {
                return Err(WorkflowError::SelfDelegation);
            }
            self.require_user(delegate_id)?;
        }
        update.apply_to(&mut delegation);
        if !delegation.has_valid_window() {
            return Err(WorkflowError::InvalidDelegationWindow);
        }

        self.write_delegation(
            DelegationWrite::Upsert(delegation.clone()),
            admin_entry(
                actor_id,
                AuditAction::DelegationUpdated,
                format!("Delegation {id} updated"),
                Utc::now(),
            ),
        )?;
        tracing::info!(delegation_id = %id, "Delegation updated");
        Ok(delegation)
    }

    /// The delegate declines a delegation. Work already routed stays put.
    pub fn reject_delegation(
        &self,
        actor_id: UserId,
        id: DelegationId,
        reason: &str,
    ) -> Result<Delegation, WorkflowError> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(WorkflowError::RejectionReasonRequired);
        }
        let mut delegation = self.require_delegation(id)?;
        if delegation.delegate_id != actor_id {
            return Err(WorkflowError::NotDelegationParty {
                user_id: actor_id,
                delegation_id: id,
            });
        }
        delegation.is_active = false;
        delegation.reject_reason = Some(reason.to_string());

        self.write_delegation(
            DelegationWrite::Upsert(delegation.clone()),
            admin_entry(
                actor_id,
                AuditAction::DelegationRejected,
                format!("Delegation {id} rejected: {reason}"),
                Utc::now(),
            ),
        )?;
        tracing::info!(delegation_id = %id, "Delegation rejected by delegate");
        Ok(delegation)
    }

    /// Removes a delegation and hands routed work back to the delegator.
    ///
    /// Returns the requests that were re-forwarded.
    pub fn delete_delegation(&self, actor_id: UserId, id: DelegationId) -> Result<Vec<RequestId>, WorkflowError> {
        let delegation = self.require_delegation(id)?;
        if actor_id != delegation.delegator_id && actor_id != delegation.delegate_id {
            return Err(WorkflowError::NotDelegationParty {
                user_id: actor_id,
                delegation_id: id,
            });
        }
        self.write_delegation(
            DelegationWrite::Delete(id),
            admin_entry(
                actor_id,
                AuditAction::DelegationDeleted,
                format!(
                    "Delegation {id} from user {} to user {} deleted",
                    delegation.delegator_id, delegation.delegate_id
                ),
                Utc::now(),
            ),
        )?;
        tracing::info!(delegation_id = %id, actor_id = %actor_id, "Delegation deleted");

        let mut rolled_back = Vec::new();
        for request in self.store.in_flight_requests()? {
            if self.with_request(request.id, |uow| self.roll_back_delegation(uow, &delegation))? {
                rolled_back.push(request.id);
            }
        }
        if !rolled_back.is_empty() {
            tracing::info!(delegation_id = %id, requests = rolled_back.len(), "Delegated work handed back");
        }
        Ok(rolled_back)
    }

    fn roll_back_delegation(&self, uow: &mut UnitOfWork, delegation: &Delegation) -> Result<bool, WorkflowError> {
        let ctx = self.context(uow)?;
        let Some(step) = ctx.steps.iter().find(|s| s.id == delegation.workflow_step_id) else {
            return Ok(false);
        };
        let state = ctx.state(step);
        let routed_here = state
            .forwarded
            .get(&delegation.delegate_id)
            .is_some_and(|via| *via == Some(delegation.id));
        if !state.is_in_flight() || !routed_here {
            return Ok(false);
        }
        if state.forwarded.contains_key(&delegation.delegator_id)
            || state.approving_principals().contains(&delegation.delegator_id)
            || uow.request.requester_id == delegation.delegator_id
        {
            return Ok(false);
        }
        // Another grant may still route the delegator's share elsewhere.
        let Some(delegator) = self
            .evaluator()
            .effective_approver(step, &ctx, delegation.delegator_id)?
            .filter(|a| a.is_nominal && a.user.is_active)
            .map(|a| a.user)
        else {
            return Ok(false);
        };

        let mut forwarded = uow.execution(Some(step.id), ExecutionStatus::Forwarded, Actor::System);
        forwarded.target = Some(delegator.id);
        uow.record(forwarded);
        uow.log(
            Actor::System,
            AuditAction::DelegationRollback,
            step_notes(
                step,
                &format!("returned to {} after delegation {} was deleted", delegator.name, delegation.id),
            ),
        );
        uow.request_action(delegator.id, Some(step.id), step.label(), TokenPurpose::Approval);
        Ok(true)
    }
}
