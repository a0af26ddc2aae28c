//! Dynamic step orchestration: one transition per `advance`, driven by `settle`.

use procura_shared::types::RequestId;

use crate::audit::notes::step_notes;
use crate::audit::{Actor, AuditAction, ExecutionStatus};
use crate::delegation::EffectiveApprover;
use crate::model::{Role, StepType, WorkflowStep};
use crate::notify::Notifier;
use crate::store::WorkflowStore;
use crate::workflow::error::WorkflowError;
use crate::workflow::evaluator::RequestContext;
use crate::workflow::tokens::TokenPurpose;
use crate::workflow::types::{RequestStatus, StepOutcome};

use super::{UnitOfWork, WorkflowEngine};

impl<S, N> WorkflowEngine<S, N>
where
    S: WorkflowStore,
    N: Notifier,
{
    /// Routes a request that just entered `Pending Approval`.
    pub(super) fn process_approval_workflow(&self, uow: &mut UnitOfWork) -> Result<(), WorkflowError> {
        let ctx = self.context(uow)?;
        if ctx.is_legacy() {
            tracing::debug!(request_id = %uow.request.id, "No applicable steps, using legacy routing");
            return self.process_legacy_route(uow, &ctx);
        }
        self.settle(uow)?;
        Ok(())
    }

    /// Performs at most one transition on a stored request.
    ///
    /// Calling it again without new approvals writes nothing.
    pub fn process_next_workflow_step(
        &self,
        request_id: RequestId,
    ) -> Result<StepOutcome, WorkflowError> {
        self.with_request(request_id, |uow| {
            if uow.request.status == RequestStatus::PendingApproval && self.context(uow)?.is_legacy() {
                return Ok(StepOutcome::Idle);
            }
            self.advance(uow)
        })
    }

    /// Calls `advance` until it stops making progress.
    pub(super) fn settle(&self, uow: &mut UnitOfWork) -> Result<StepOutcome, WorkflowError> {
        let bound = self.store.workflow_steps(uow.request.category)?.len() + 1;
        let mut outcome = StepOutcome::Idle;
        for _ in 0..bound {
            outcome = self.advance(uow)?;
            if !outcome.made_progress() {
                break;
            }
        }
        Ok(outcome)
    }

    /// Performs at most one workflow transition.
    pub(super) fn advance(&self, uow: &mut UnitOfWork) -> Result<StepOutcome, WorkflowError> {
        if uow.request.status != RequestStatus::PendingApproval {
            return Ok(StepOutcome::Idle);
        }
        let ctx = self.context(uow)?;
        let evaluator = self.evaluator();

        for step in &ctx.steps {
            if evaluator.is_skipped_for_requester(step, &ctx)?
                || evaluator.is_step_completed(step, &ctx)?
                || evaluator.is_step_rejected(step, &ctx)
            {
                continue;
            }
            if ctx.state(step).started {
                if step.is_required {
                    return Ok(StepOutcome::Waiting(step.id));
                }
                continue;
            }
            return self.execute_step(uow, step, &ctx);
        }

        if evaluator.all_required_complete(&ctx)? {
            self.finish(uow);
            return Ok(StepOutcome::Finished);
        }
        Ok(StepOutcome::Idle)
    }

    fn execute_step(
        &self,
        uow: &mut UnitOfWork,
        step: &WorkflowStep,
        ctx: &RequestContext,
    ) -> Result<StepOutcome, WorkflowError> {
        tracing::debug!(
            request_id = %uow.request.id,
            step_id = %step.id,
            step_type = %step.step_type,
            "Executing workflow step"
        );

        if step.auto_approve_if_condition_met {
            self.complete_step(uow, step, Actor::System, "auto-approved");
            return Ok(StepOutcome::Completed(step.id));
        }

        match step.step_type {
            StepType::Approval => {
                let assignments = self.evaluator().active_assignments(step, &ctx.facts)?;
                let approvers = self.evaluator().effective_approvers(step, ctx, &assignments)?;
                if approvers.is_empty() {
                    tracing::warn!(request_id = %uow.request.id, step_id = %step.id, "No eligible approvers");
                    let delayed = uow.execution(Some(step.id), ExecutionStatus::Delayed, Actor::System);
                    uow.record(delayed);
                    uow.log(
                        Actor::System,
                        AuditAction::WorkflowStepDelayed,
                        step_notes(step, "no eligible approvers"),
                    );
                } else {
                    self.forward(uow, step, &approvers, TokenPurpose::Approval);
                }
                Ok(StepOutcome::Forwarded(step.id))
            }
            StepType::Verification => {
                if uow.request.is_verified() {
                    self.complete_step(uow, step, Actor::System, "procurement verified");
                    return Ok(StepOutcome::Completed(step.id));
                }
                let procurement: Vec<EffectiveApprover> = self
                    .store
                    .users_with_role(Role::Procurement)?
                    .into_iter()
                    .filter(|u| u.is_active && u.id != uow.request.requester_id)
                    .map(|user| EffectiveApprover {
                        user,
                        on_behalf_of: Vec::new(),
                        delegations: Vec::new(),
                        is_nominal: true,
                    })
                    .collect();
                self.forward(uow, step, &procurement, TokenPurpose::Verification);
                Ok(StepOutcome::Forwarded(step.id))
            }
            StepType::Notification => {
                uow.notify_employee(&step.name, step.description.clone());
                self.complete_step(uow, step, Actor::System, "requester notified");
                Ok(StepOutcome::Completed(step.id))
            }
        }
    }

    /// Routes `step` to `approvers` and asks each of them to act.
    pub(super) fn forward(
        &self,
        uow: &mut UnitOfWork,
        step: &WorkflowStep,
        approvers: &[EffectiveApprover],
        purpose: TokenPurpose,
    ) {
        if approvers.is_empty() {
            return;
        }
        for approver in approvers {
            for (delegator, grant) in approver.on_behalf_of.iter().zip(&approver.delegations) {
                uow.log(
                    Actor::System,
                    AuditAction::DelegationApplied,
                    step_notes(
                        step,
                        &format!(
                            "{} acts for user {delegator} under delegation {grant}",
                            approver.user.name
                        ),
                    ),
                );
            }
            let mut forwarded = uow.execution(Some(step.id), ExecutionStatus::Forwarded, Actor::System);
            forwarded.target = Some(approver.user.id);
            forwarded.delegation_id = approver.routing_delegation();
            uow.record(forwarded);
            uow.request_action(approver.user.id, Some(step.id), step.label(), purpose);
        }

        let names: Vec<&str> = approvers.iter().map(|a| a.user.name.as_str()).collect();
        uow.log(
            Actor::System,
            AuditAction::StepForwarded,
            step_notes(step, &format!("forwarded to {}", names.join(", "))),
        );
        tracing::info!(
            request_id = %uow.request.id,
            step_id = %step.id,
            approvers = approvers.len(),
            "Step forwarded"
        );
    }

    /// Marks a step completed.
    pub(super) fn complete_step(&self, uow: &mut UnitOfWork, step: &WorkflowStep, actor: Actor, detail: &str) {
        let completed = uow.execution(Some(step.id), ExecutionStatus::Completed, actor);
        uow.record(completed);
        uow.log(actor, AuditAction::StepCompleted, step_notes(step, detail));
    }

    /// Notifies approvers of unsatisfied assignments who have not been asked yet.
    pub(super) fn process_next_approval(
        &self,
        uow: &mut UnitOfWork,
        step: &WorkflowStep,
        ctx: &RequestContext,
    ) -> Result<usize, WorkflowError> {
        let evaluator = self.evaluator();
        let state = ctx.state(step);
        let mut pending: Vec<EffectiveApprover> = Vec::new();

        for assignment in evaluator.active_assignments(step, &ctx.facts)? {
            if evaluator.is_assignment_satisfied(&assignment, ctx, state)? {
                continue;
            }
            for approver in evaluator.effective_approvers(step, ctx, std::slice::from_ref(&assignment))? {
                if state.forwarded.contains_key(&approver.user.id)
                    || state.has_approved(approver.user.id)
                    || pending.iter().any(|p| p.user.id == approver.user.id)
                {
                    continue;
                }
                pending.push(approver);
            }
        }

        self.forward(uow, step, &pending, TokenPurpose::Approval);
        Ok(pending.len())
    }

    pub(super) fn finish(&self, uow: &mut UnitOfWork) {
        uow.set_status(RequestStatus::Approved);
        uow.log(
            Actor::System,
            AuditAction::AllApprovalsComplete,
            "All required approval steps completed",
        );
        uow.notify_employee("approved", None);
        tracing::info!(request_id = %uow.request.id, "All approvals complete");
    }
}
