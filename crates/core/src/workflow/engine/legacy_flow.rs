//! Legacy threshold routing inside the engine.

use procura_shared::types::StepId;

use crate::audit::{Actor, AuditAction, ExecutionStatus};
use crate::model::{Role, User};
use crate::notify::Notifier;
use crate::store::WorkflowStore;
use crate::workflow::error::WorkflowError;
use crate::workflow::evaluator::RequestContext;
use crate::workflow::legacy::{LegacyRoute, ThresholdRouter};
use crate::workflow::tokens::TokenPurpose;
use crate::workflow::types::RequestStatus;

use super::{UnitOfWork, WorkflowEngine};

/// Legacy routing has no configured step.
const NO_STEP: Option<StepId> = None;

fn stage_label(role: Role) -> String {
    format!("Legacy {role} approval")
}

impl<S, N> WorkflowEngine<S, N>
where
    S: WorkflowStore,
    N: Notifier,
{
    fn legacy_route(&self, ctx: &RequestContext) -> Result<LegacyRoute, WorkflowError> {
        let rules = match ctx.request.department_id {
            Some(department_id) => self.store.approval_rules(department_id)?,
            None => Vec::new(),
        };
        Ok(ThresholdRouter::route(
            ctx.request.amount,
            &rules,
            &self.settings.thresholds,
        ))
    }

    fn legacy_approvers(&self, ctx: &RequestContext) -> Result<Vec<User>, WorkflowError> {
        let mut approvers = Vec::new();
        for approval in &ctx.ledger.legacy().approvals {
            if let Some(user) = self.store.find_user(approval.approver)? {
                approvers.push(user);
            }
        }
        Ok(approvers)
    }

    /// First stage no approval satisfies yet, with its candidates.
    fn first_open_stage(
        &self,
        ctx: &RequestContext,
        stages: &[Role],
    ) -> Result<Option<(Role, Vec<User>)>, WorkflowError> {
        let approvers = self.legacy_approvers(ctx)?;
        for role in stages {
            let candidates = ThresholdRouter::stage_candidates(&*self.store, *role, &ctx.request)?;
            let satisfied = approvers
                .iter()
                .any(|a| ThresholdRouter::qualifies(a, *role, &ctx.request, &candidates));
            if !satisfied {
                return Ok(Some((*role, candidates)));
            }
        }
        Ok(None)
    }

    /// Returns true if the legacy route needs no further approval.
    pub(super) fn legacy_complete(&self, ctx: &RequestContext) -> Result<bool, WorkflowError> {
        let stages = match self.legacy_route(ctx)? {
            LegacyRoute::AutoApproved => return Ok(true),
            LegacyRoute::Stages(stages) => stages,
        };
        let employee_origin = ctx.requester.as_ref().is_some_and(|r| r.role == Role::Employee);
        if employee_origin && self.legacy_approvers(ctx)?.iter().any(User::is_admin) {
            return Ok(true);
        }
        Ok(self.first_open_stage(ctx, &stages)?.is_none())
    }

    /// Legacy authorization for approving or rejecting.
    pub(super) fn legacy_can_approve(&self, ctx: &RequestContext, user: &User) -> Result<bool, WorkflowError> {
        let route = self.legacy_route(ctx)?;
        let has_step_assignment = user.role == Role::Procurement
            && self.evaluator().has_any_step_assignment(user)?;
        let already_approved = ctx.ledger.legacy().has_approved(user.id);
        Ok(ThresholdRouter::can_approve(
            user,
            &ctx.request,
            &route,
            has_step_assignment,
            already_approved,
        ))
    }

    /// Routes, notifies, or completes a legacy request.
    pub(super) fn process_legacy_route(
        &self,
        uow: &mut UnitOfWork,
        ctx: &RequestContext,
    ) -> Result<(), WorkflowError> {
        if uow.request.status != RequestStatus::PendingApproval {
            return Ok(());
        }

        let stages = match self.legacy_route(ctx)? {
            LegacyRoute::AutoApproved => {
                uow.set_status(RequestStatus::Approved);
                uow.log(
                    Actor::System,
                    AuditAction::AutoApproved,
                    format!(
                        "Amount {} within auto-approval threshold {}",
                        uow.request.amount, self.settings.thresholds.auto_approval
                    ),
                );
                uow.notify_employee("approved", None);
                tracing::info!(request_id = %uow.request.id, "Request auto-approved");
                return Ok(());
            }
            LegacyRoute::Stages(stages) => stages,
        };

        if self.legacy_complete(ctx)? {
            self.finish(uow);
            return Ok(());
        }
        let Some((role, candidates)) = self.first_open_stage(ctx, &stages)? else {
            self.finish(uow);
            return Ok(());
        };

        let state = ctx.ledger.legacy();
        if candidates.is_empty() {
            if !state.delayed {
                tracing::warn!(request_id = %uow.request.id, %role, "No eligible legacy approvers");
                let delayed = uow.execution(NO_STEP, ExecutionStatus::Delayed, Actor::System);
                uow.record(delayed);
                uow.log(
                    Actor::System,
                    AuditAction::WorkflowStepDelayed,
                    format!("{}: no eligible approvers", stage_label(role)),
                );
            }
            return Ok(());
        }

        let fresh: Vec<&User> = candidates
            .iter()
            .filter(|c| !state.forwarded.contains_key(&c.id) && !state.has_approved(c.id))
            .collect();
        if fresh.is_empty() {
            return Ok(());
        }
        for candidate in &fresh {
            let mut forwarded = uow.execution(NO_STEP, ExecutionStatus::Forwarded, Actor::System);
            forwarded.target = Some(candidate.id);
            uow.record(forwarded);
            uow.request_action(candidate.id, NO_STEP, stage_label(role), TokenPurpose::Approval);
        }
        let names: Vec<&str> = fresh.iter().map(|c| c.name.as_str()).collect();
        uow.log(
            Actor::System,
            AuditAction::StepForwarded,
            format!("{}: forwarded to {}", stage_label(role), names.join(", ")),
        );
        tracing::info!(request_id = %uow.request.id, %role, approvers = fresh.len(), "Legacy stage forwarded");
        Ok(())
    }

    /// Records a legacy approval and re-routes.
    pub(super) fn approve_legacy(
        &self,
        uow: &mut UnitOfWork,
        ctx: &RequestContext,
        approver: &User,
        notes: Option<&str>,
    ) -> Result<(), WorkflowError> {
        if !self.legacy_can_approve(ctx, approver)? {
            return Err(WorkflowError::NotAuthorized {
                user_id: approver.id,
                action: "approve",
            });
        }
        let approval = uow.execution(NO_STEP, ExecutionStatus::Approved, Actor::Human(approver.id));
        uow.record(approval);
        uow.log(
            Actor::Human(approver.id),
            AuditAction::Approved,
            super::approvals::approval_detail(approver, notes),
        );
        tracing::info!(request_id = %uow.request.id, approver_id = %approver.id, "Legacy approval recorded");

        let ctx = self.context(uow)?;
        self.process_legacy_route(uow, &ctx)
    }
}
