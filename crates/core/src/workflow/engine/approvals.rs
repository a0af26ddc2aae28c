//! Approving and rejecting, directly or through an emailed token.

use rust_decimal::Decimal;
use uuid::Uuid;

use procura_shared::types::{RequestId, UserId};

use crate::audit::notes::step_notes;
use crate::audit::{Actor, AuditAction, ExecutionStatus};
use crate::model::{Request, User};
use crate::notify::Notifier;
use crate::store::WorkflowStore;
use crate::workflow::error::WorkflowError;
use crate::workflow::tokens::{ApprovalToken, TokenPurpose};
use crate::workflow::transitions::StatusTransitions;
use crate::workflow::types::{ProcurementStatus, RequestStatus};

use super::{UnitOfWork, WorkflowEngine};

/// Notes for an approval row: `approved by <name>[: <notes>]`.
pub(super) fn approval_detail(approver: &User, notes: Option<&str>) -> String {
    match notes.map(str::trim).filter(|n| !n.is_empty()) {
        Some(notes) => format!("approved by {}: {notes}", approver.name),
        None => format!("approved by {}", approver.name),
    }
}

fn require_pending_approval(request: &Request) -> Result<(), WorkflowError> {
    if request.status == RequestStatus::PendingApproval {
        Ok(())
    } else {
        Err(WorkflowError::UnexpectedStatus {
            expected: RequestStatus::PendingApproval,
            actual: request.status,
        })
    }
}

impl<S, N> WorkflowEngine<S, N>
where
    S: WorkflowStore,
    N: Notifier,
{
    fn active_user(&self, user_id: UserId, action: &'static str) -> Result<User, WorkflowError> {
        let user = self.require_user(user_id)?;
        if user.is_active {
            Ok(user)
        } else {
            Err(WorkflowError::NotAuthorized { user_id, action })
        }
    }

    /// Records an approval at the approver's current step.
    pub fn approve(
        &self,
        request_id: RequestId,
        approver_id: UserId,
        notes: Option<&str>,
    ) -> Result<Request, WorkflowError> {
        self.with_request(request_id, |uow| {
            self.approve_in(uow, approver_id, notes)?;
            Ok(uow.request.clone())
        })
    }

    fn approve_in(
        &self,
        uow: &mut UnitOfWork,
        approver_id: UserId,
        notes: Option<&str>,
    ) -> Result<(), WorkflowError> {
        require_pending_approval(&uow.request)?;
        let approver = self.active_user(approver_id, "approve")?;
        let ctx = self.context(uow)?;
        if ctx.is_legacy() {
            return self.approve_legacy(uow, &ctx, &approver, notes);
        }

        let evaluator = self.evaluator();
        let not_authorized = || WorkflowError::NotAuthorized {
            user_id: approver_id,
            action: "approve",
        };
        let step = evaluator
            .current_step_for_approver(&ctx, approver_id)?
            .ok_or_else(not_authorized)?;
        let effective = evaluator
            .effective_approver(&step, &ctx, approver_id)?
            .ok_or_else(not_authorized)?;

        let actor = Actor::Human(approver_id);
        let mut approval = uow.execution(Some(step.id), ExecutionStatus::Approved, actor);
        approval.on_behalf_of.clone_from(&effective.on_behalf_of);
        approval.delegation_id = effective.delegations.first().copied();
        uow.record(approval);
        uow.log(
            actor,
            AuditAction::WorkflowStepCompleted,
            step_notes(&step, &approval_detail(&approver, notes)),
        );
        tracing::info!(
            request_id = %uow.request.id,
            step_id = %step.id,
            approver_id = %approver_id,
            on_behalf_of = effective.on_behalf_of.len(),
            "Approval recorded"
        );

        let ctx = self.context(uow)?;
        if evaluator.is_step_completed(&step, &ctx)? {
            if !ctx.state(&step).completed {
                self.complete_step(uow, &step, actor, "all required approvals received");
            }
            self.settle(uow)?;
        } else {
            let notified = self.process_next_approval(uow, &step, &ctx)?;
            tracing::debug!(request_id = %uow.request.id, step_id = %step.id, notified, "Step still open");
        }
        Ok(())
    }

    /// Rejects the request. The reason is mandatory.
    pub fn reject(
        &self,
        request_id: RequestId,
        rejector_id: UserId,
        reason: &str,
    ) -> Result<Request, WorkflowError> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(WorkflowError::RejectionReasonRequired);
        }
        self.with_request(request_id, |uow| {
            self.reject_in(uow, rejector_id, reason)?;
            Ok(uow.request.clone())
        })
    }

    fn reject_in(&self, uow: &mut UnitOfWork, rejector_id: UserId, reason: &str) -> Result<(), WorkflowError> {
        require_pending_approval(&uow.request)?;
        let rejector = self.active_user(rejector_id, "reject")?;
        let ctx = self.context(uow)?;
        let actor = Actor::Human(rejector_id);
        let not_authorized = WorkflowError::NotAuthorized {
            user_id: rejector_id,
            action: "reject",
        };

        if ctx.is_legacy() {
            if !self.legacy_can_approve(&ctx, &rejector)? {
                return Err(not_authorized);
            }
            let rejected = uow.execution(None, ExecutionStatus::Rejected, actor);
            uow.record(rejected);
        } else {
            let Some(step) = self.evaluator().current_step_for_approver(&ctx, rejector_id)? else {
                return Err(not_authorized);
            };
            let rejected = uow.execution(Some(step.id), ExecutionStatus::Rejected, actor);
            uow.record(rejected);
            uow.log(
                actor,
                AuditAction::WorkflowStepRejected,
                step_notes(&step, &format!("rejected by {}: {reason}", rejector.name)),
            );
            for other in ctx.steps.iter().filter(|s| s.id != step.id) {
                if ctx.state(other).is_in_flight() {
                    let cancelled = uow.execution(Some(other.id), ExecutionStatus::Cancelled, Actor::System);
                    uow.record(cancelled);
                    uow.log(
                        Actor::System,
                        AuditAction::WorkflowStepCancelled,
                        step_notes(other, "request rejected"),
                    );
                }
            }
        }

        StatusTransitions::validate(uow.request.status, RequestStatus::Rejected)?;
        uow.set_status(RequestStatus::Rejected);
        uow.log(actor, AuditAction::Rejected, format!("Rejected by {}: {reason}", rejector.name));
        uow.notify_employee("rejected", Some(reason.to_string()));
        tracing::info!(request_id = %uow.request.id, rejector_id = %rejector_id, "Request rejected");
        Ok(())
    }

    /// Loads a token and, under the request lock, redeems it for `purpose`.
    fn redeem<T>(
        &self,
        token: Uuid,
        purpose: TokenPurpose,
        op: impl FnOnce(&mut UnitOfWork, &ApprovalToken) -> Result<T, WorkflowError>,
    ) -> Result<T, WorkflowError> {
        let issued = self.store.find_token(token)?.ok_or(WorkflowError::TokenNotFound)?;
        self.with_request(issued.request_id, |uow| {
            let current = self.store.find_token(token)?.ok_or(WorkflowError::TokenNotFound)?;
            current.redeemable(purpose, uow.now)?;
            uow.consume_token(current.token);
            tracing::debug!(request_id = %current.request_id, user_id = %current.user_id, "Token redeemed");
            op(uow, &current)
        })
    }

    /// Approves as the token's holder. The token is spent with the approval.
    pub fn approve_with_token(&self, token: Uuid, notes: Option<&str>) -> Result<Request, WorkflowError> {
        self.redeem(token, TokenPurpose::Approval, |uow, issued| {
            self.approve_in(uow, issued.user_id, notes)?;
            Ok(uow.request.clone())
        })
    }

    /// Records a procurement verdict as the token's holder.
    pub fn verify_with_token(
        &self,
        token: Uuid,
        decision: ProcurementStatus,
        final_price: Option<Decimal>,
        notes: Option<&str>,
    ) -> Result<Request, WorkflowError> {
        self.redeem(token, TokenPurpose::Verification, |uow, issued| {
            self.verify_in(uow, issued.user_id, decision, final_price, notes)?;
            Ok(uow.request.clone())
        })
    }
}
