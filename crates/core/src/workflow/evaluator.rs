//! Step evaluation: which steps apply, which are done, and who may act.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

use procura_shared::MissingFieldPolicy;
use procura_shared::types::UserId;

use crate::audit::{AuditLogEntry, StepExecution, StepLedger, StepState};
use crate::delegation::{DelegationResolver, EffectiveApprover};
use crate::model::{
    Assignee, Request, StepType, User, WorkflowStep, WorkflowStepAssignment,
};
use crate::store::WorkflowStore;
use crate::workflow::conditions::{ConditionEvaluator, FactDocument};
use crate::workflow::error::WorkflowError;

/// Everything the evaluator knows about one request at one instant.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// The request.
    pub request: Request,
    /// The requester, if still on file.
    pub requester: Option<User>,
    /// Condition inputs.
    pub facts: FactDocument,
    /// Applicable steps, in order.
    pub steps: Vec<WorkflowStep>,
    /// Folded step state.
    pub ledger: StepLedger,
    /// Evaluation time, used for delegation windows.
    pub now: DateTime<Utc>,
}

impl RequestContext {
    /// Returns true if no dynamic step applies and the legacy router decides.
    #[must_use]
    pub fn is_legacy(&self) -> bool {
        self.steps.is_empty()
    }

    /// Returns true if the requester is an administrator.
    #[must_use]
    pub fn requester_is_admin(&self) -> bool {
        self.requester.as_ref().is_some_and(User::is_admin)
    }

    /// Folded state of a step.
    #[must_use]
    pub fn state(&self, step: &WorkflowStep) -> &StepState {
        self.ledger.step(step.id)
    }
}

/// Read-only evaluation over a store.
pub struct StepEvaluator<'a, S: ?Sized> {
    store: &'a S,
    conditions: ConditionEvaluator,
}

impl<'a, S> StepEvaluator<'a, S>
where
    S: WorkflowStore + ?Sized,
{
    /// Creates an evaluator.
    pub fn new(store: &'a S, policy: MissingFieldPolicy) -> Self {
        Self {
            store,
            conditions: ConditionEvaluator::new(policy),
        }
    }

    /// Builds the evaluation context for a request and its history.
    pub fn context(
        &self,
        request: &Request,
        audit_log: &[AuditLogEntry],
        executions: &[StepExecution],
        now: DateTime<Utc>,
    ) -> Result<RequestContext, WorkflowError> {
        let requester = self.store.find_user(request.requester_id)?;
        let department = match request.department_id {
            Some(id) => self.store.find_department(id)?,
            None => None,
        };
        let facts = FactDocument::build(request, requester.as_ref(), department.as_ref());
        let steps = self.steps_for_request(request, &facts)?;
        let ledger = StepLedger::build(executions, audit_log, &steps);

        Ok(RequestContext {
            request: request.clone(),
            requester,
            facts,
            steps,
            ledger,
            now,
        })
    }

    /// Returns true if the step is active and all its conditions hold.
    pub fn should_execute_step(&self, step: &WorkflowStep, facts: &FactDocument) -> bool {
        step.is_active && self.conditions.evaluate_all(&step.conditions, facts)
    }

    /// Applicable steps of the request's category in `order_index` order.
    pub fn steps_for_request(
        &self,
        request: &Request,
        facts: &FactDocument,
    ) -> Result<Vec<WorkflowStep>, WorkflowError> {
        let mut steps: Vec<WorkflowStep> = self
            .store
            .workflow_steps(request.category)?
            .into_iter()
            .filter(|s| self.should_execute_step(s, facts))
            .collect();
        steps.sort_by_key(|s| (s.order_index, s.id));
        Ok(steps)
    }

    /// Assignments of the step whose own conditions hold.
    pub fn active_assignments(
        &self,
        step: &WorkflowStep,
        facts: &FactDocument,
    ) -> Result<Vec<WorkflowStepAssignment>, WorkflowError> {
        Ok(self
            .store
            .step_assignments(step.id)?
            .into_iter()
            .filter(|a| self.conditions.evaluate_all(&a.conditions, facts))
            .collect())
    }

    /// Returns true if the step targets managers and the requester is an admin.
    pub fn is_skipped_for_requester(
        &self,
        step: &WorkflowStep,
        ctx: &RequestContext,
    ) -> Result<bool, WorkflowError> {
        if !ctx.requester_is_admin() {
            return Ok(false);
        }
        Ok(self
            .active_assignments(step, &ctx.facts)?
            .iter()
            .any(|a| a.assignee.is_manager_role()))
    }

    /// Returns true once enough distinct people approved for the assignment.
    ///
    /// Each approver counts once, for their own slot or for one delegator
    /// they acted for.
    pub fn is_assignment_satisfied(
        &self,
        assignment: &WorkflowStepAssignment,
        ctx: &RequestContext,
        state: &StepState,
    ) -> Result<bool, WorkflowError> {
        if state.approvals.is_empty() {
            return Ok(false);
        }
        let assigned: BTreeSet<UserId> = assignment
            .assignee
            .resolve_users(self.store, &ctx.request)?
            .iter()
            .map(|u| u.id)
            .collect();
        Ok(state.filled_slots(&assigned) >= assignment.quorum())
    }

    fn approval_satisfied(
        &self,
        step: &WorkflowStep,
        ctx: &RequestContext,
    ) -> Result<bool, WorkflowError> {
        let assignments = self.active_assignments(step, &ctx.facts)?;
        let state = ctx.state(step);
        let required: Vec<_> = assignments.iter().filter(|a| a.is_required).collect();

        if required.is_empty() {
            if assignments.is_empty() {
                return Ok(true);
            }
            for assignment in &assignments {
                if self.is_assignment_satisfied(assignment, ctx, state)? {
                    return Ok(true);
                }
            }
            return Ok(false);
        }

        for assignment in required {
            if !self.is_assignment_satisfied(assignment, ctx, state)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Returns true if the step is done.
    pub fn is_step_completed(
        &self,
        step: &WorkflowStep,
        ctx: &RequestContext,
    ) -> Result<bool, WorkflowError> {
        if ctx.state(step).completed {
            return Ok(true);
        }
        match step.step_type {
            StepType::Approval => self.approval_satisfied(step, ctx),
            StepType::Verification => Ok(ctx.request.is_verified()),
            StepType::Notification => Ok(false),
        }
    }

    /// Returns true if the step was rejected.
    pub fn is_step_rejected(&self, step: &WorkflowStep, ctx: &RequestContext) -> bool {
        ctx.state(step).rejected
            || (step.step_type == StepType::Verification
                && ctx.request.procurement_status.is_some_and(|s| s.is_failure()))
    }

    /// Returns true if every required applicable step is completed.
    pub fn all_required_complete(&self, ctx: &RequestContext) -> Result<bool, WorkflowError> {
        for step in ctx.steps.iter().filter(|s| s.is_required) {
            if self.is_skipped_for_requester(step, ctx)? {
                continue;
            }
            if !self.is_step_completed(step, ctx)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Users who receive the step through `assignments`, after delegation.
    pub fn effective_approvers(
        &self,
        step: &WorkflowStep,
        ctx: &RequestContext,
        assignments: &[WorkflowStepAssignment],
    ) -> Result<Vec<EffectiveApprover>, WorkflowError> {
        let mut nominal: Vec<User> = Vec::new();
        for assignment in assignments {
            nominal.extend(assignment.assignee.resolve_users(self.store, &ctx.request)?);
        }
        nominal.sort_by_key(|u| u.id);
        nominal.dedup_by_key(|u| u.id);

        let delegations = self.store.delegations_for_step(step.id)?;
        Ok(DelegationResolver::effective_approvers(
            self.store,
            &ctx.request,
            step.id,
            &nominal,
            &delegations,
            ctx.now,
        )?)
    }

    /// The user's effective assignment on the step, if any.
    pub fn effective_approver(
        &self,
        step: &WorkflowStep,
        ctx: &RequestContext,
        user_id: UserId,
    ) -> Result<Option<EffectiveApprover>, WorkflowError> {
        let assignments = self.active_assignments(step, &ctx.facts)?;
        Ok(self
            .effective_approvers(step, ctx, &assignments)?
            .into_iter()
            .find(|a| a.user.id == user_id))
    }

    /// The step `user_id` may act on now, if any.
    ///
    /// Completed, rejected and already-approved steps are skipped. The first
    /// approval step the user is effectively assigned to is returned when
    /// every earlier required step is complete.
    pub fn current_step_for_approver(
        &self,
        ctx: &RequestContext,
        user_id: UserId,
    ) -> Result<Option<WorkflowStep>, WorkflowError> {
        for (index, step) in ctx.steps.iter().enumerate() {
            if step.step_type != StepType::Approval
                || self.is_step_completed(step, ctx)?
                || self.is_step_rejected(step, ctx)
                || ctx.state(step).has_approved(user_id)
                || self.is_skipped_for_requester(step, ctx)?
            {
                continue;
            }
            if self.effective_approver(step, ctx, user_id)?.is_none() {
                continue;
            }
            if self.prior_required_complete(&ctx.steps[..index], ctx)? {
                return Ok(Some(step.clone()));
            }
        }
        Ok(None)
    }

    fn prior_required_complete(
        &self,
        prior: &[WorkflowStep],
        ctx: &RequestContext,
    ) -> Result<bool, WorkflowError> {
        for step in prior.iter().filter(|s| s.is_required) {
            if self.is_skipped_for_requester(step, ctx)? {
                continue;
            }
            if !self.is_step_completed(step, ctx)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Returns true if any step assignment anywhere targets `user`.
    pub fn has_any_step_assignment(&self, user: &User) -> Result<bool, WorkflowError> {
        let finance_holder = self
            .store
            .finance_assignments()?
            .iter()
            .any(|a| a.is_active && a.user_id == user.id);
        Ok(self.store.all_step_assignments()?.iter().any(|a| match a.assignee {
            Assignee::User(id) => id == user.id,
            Assignee::Role(role) => role == user.role,
            Assignee::Department(department_id) => user.department_id == Some(department_id),
            Assignee::FinanceAssignment => finance_holder,
        }))
    }
}
