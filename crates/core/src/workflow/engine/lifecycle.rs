//! Submission, procurement verification and post-approval fulfilment.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use procura_shared::types::{RequestId, UserId};

use crate::audit::{Actor, AuditAction};
use crate::model::{NewRequest, Request, Role, User};
use crate::notify::Notifier;
use crate::store::WorkflowStore;
use crate::workflow::error::WorkflowError;
use crate::workflow::tokens::TokenPurpose;
use crate::workflow::transitions::StatusTransitions;
use crate::workflow::types::{ProcurementAction, ProcurementStatus, RequestStatus};

use super::{UnitOfWork, WorkflowEngine};

const VERIFICATION_LABEL: &str = "Procurement Verification";

fn with_notes(text: String, notes: Option<&str>) -> String {
    match notes.map(str::trim).filter(|n| !n.is_empty()) {
        Some(notes) => format!("{text}: {notes}"),
        None => text,
    }
}

fn validate_input(input: &NewRequest) -> Result<(), WorkflowError> {
    if input.item.trim().is_empty() {
        return Err(WorkflowError::InvalidRequest("item must not be empty".to_string()));
    }
    if input.quantity == 0 {
        return Err(WorkflowError::InvalidRequest("quantity must be at least 1".to_string()));
    }
    if input.amount < Decimal::ZERO {
        return Err(WorkflowError::InvalidAmount(format!(
            "amount {} is negative",
            input.amount
        )));
    }
    Ok(())
}

impl<S, N> WorkflowEngine<S, N>
where
    S: WorkflowStore,
    N: Notifier,
{
    /// Creates a request and hands it to procurement for verification.
    pub fn submit(&self, input: NewRequest, employee_id: UserId) -> Result<Request, WorkflowError> {
        self.submit_at(input, employee_id, Utc::now())
    }

    /// [`Self::submit`] at an explicit instant.
    pub fn submit_at(
        &self,
        input: NewRequest,
        employee_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<Request, WorkflowError> {
        let employee = self.require_user(employee_id)?;
        if !employee.is_active {
            return Err(WorkflowError::NotAuthorized {
                user_id: employee_id,
                action: "submit",
            });
        }
        validate_input(&input)?;

        let request_id = self.store.next_request_id()?;
        let request = Request::from_input(request_id, input, employee_id, employee.department_id, now);
        let mut uow = UnitOfWork::create(request, now, self.settings.approval_token_ttl_hours);
        uow.log(
            Actor::Human(employee_id),
            AuditAction::Submitted,
            format!("{} x{} for {}", uow.request.item, uow.request.quantity, uow.request.amount),
        );

        StatusTransitions::validate(uow.request.status, RequestStatus::PendingProcurementVerification)?;
        uow.set_status(RequestStatus::PendingProcurementVerification);
        self.forward_to_procurement(&mut uow)?;

        let lock = self.lock_for(request_id);
        let _guard = lock.lock();
        let request = uow.request.clone();
        self.commit(uow)?;
        tracing::info!(request_id = %request_id, employee_id = %employee_id, amount = %request.amount, "Request submitted");
        Ok(request)
    }

    fn forward_to_procurement(&self, uow: &mut UnitOfWork) -> Result<(), WorkflowError> {
        let verifiers: Vec<User> = self
            .store
            .users_with_role(Role::Procurement)?
            .into_iter()
            .filter(|u| u.is_active && u.id != uow.request.requester_id)
            .collect();

        if verifiers.is_empty() {
            tracing::warn!(request_id = %uow.request.id, "No active procurement staff to verify request");
            uow.log(
                Actor::System,
                AuditAction::WorkflowStepDelayed,
                format!("{VERIFICATION_LABEL}: no eligible approvers"),
            );
            return Ok(());
        }
        for verifier in &verifiers {
            uow.request_action(verifier.id, None, VERIFICATION_LABEL.to_string(), TokenPurpose::Verification);
        }
        let names: Vec<&str> = verifiers.iter().map(|u| u.name.as_str()).collect();
        uow.log(
            Actor::System,
            AuditAction::StepForwarded,
            format!("{VERIFICATION_LABEL}: forwarded to {}", names.join(", ")),
        );
        Ok(())
    }

    /// Records procurement's verdict on availability and price.
    pub fn process_procurement_verification(
        &self,
        request_id: RequestId,
        verifier_id: UserId,
        decision: ProcurementStatus,
        final_price: Option<Decimal>,
        notes: Option<&str>,
    ) -> Result<Request, WorkflowError> {
        self.with_request(request_id, |uow| {
            self.verify_in(uow, verifier_id, decision, final_price, notes)?;
            Ok(uow.request.clone())
        })
    }

    pub(super) fn verify_in(
        &self,
        uow: &mut UnitOfWork,
        verifier_id: UserId,
        decision: ProcurementStatus,
        final_price: Option<Decimal>,
        notes: Option<&str>,
    ) -> Result<(), WorkflowError> {
        let verifier = self.require_procurement(verifier_id)?;
        if uow.request.status != RequestStatus::PendingProcurementVerification {
            return Err(WorkflowError::UnexpectedStatus {
                expected: RequestStatus::PendingProcurementVerification,
                actual: uow.request.status,
            });
        }
        if let Some(price) = final_price
            && price < Decimal::ZERO
        {
            return Err(WorkflowError::InvalidAmount(format!("final price {price} is negative")));
        }

        let actor = Actor::Human(verifier.id);
        if decision.is_failure() {
            let reason = notes.map(str::to_string);
            uow.request_mut().procurement_status = Some(decision);
            uow.set_status(RequestStatus::Rejected);
            uow.log(
                actor,
                AuditAction::WorkflowStepRejected,
                with_notes(format!("{VERIFICATION_LABEL}: {decision} by {}", verifier.name), notes),
            );
            uow.notify_employee("rejected", reason);
            tracing::info!(request_id = %uow.request.id, %decision, "Procurement verification failed");
            return Ok(());
        }

        {
            let request = uow.request_mut();
            request.procurement_status = Some(ProcurementStatus::Verified);
            if let Some(price) = final_price {
                request.amount = price;
            }
        }
        uow.log(
            actor,
            AuditAction::StepCompleted,
            with_notes(
                format!("{VERIFICATION_LABEL}: verified at {} by {}", uow.request.amount, verifier.name),
                notes,
            ),
        );
        uow.set_status(RequestStatus::PendingApproval);
        uow.notify_employee("verified", None);
        tracing::info!(request_id = %uow.request.id, amount = %uow.request.amount, "Procurement verified");

        self.process_approval_workflow(uow)
    }

    /// Applies a post-approval procurement action.
    ///
    /// `Ordered` and `Cancelled` on a request still awaiting approval first
    /// mark the approvals complete.
    pub fn process_procurement_approval(
        &self,
        request_id: RequestId,
        user_id: UserId,
        action: ProcurementAction,
        final_cost: Option<Decimal>,
        notes: Option<&str>,
    ) -> Result<Request, WorkflowError> {
        let user = self.require_procurement(user_id)?;
        if let Some(cost) = final_cost
            && cost < Decimal::ZERO
        {
            return Err(WorkflowError::InvalidAmount(format!("final cost {cost} is negative")));
        }

        self.with_request(request_id, |uow| {
            let from = uow.request.status;
            let to = StatusTransitions::procurement_target(from, action)?;
            let actor = Actor::Human(user.id);

            if StatusTransitions::forces_approval(from, action) {
                tracing::warn!(request_id = %uow.request.id, to = %to, "Procurement action forces approval completion");
                uow.log(
                    actor,
                    AuditAction::AllApprovalsComplete,
                    format!("Forced by procurement action {to}"),
                );
                uow.set_status(RequestStatus::Approved);
            }

            if let Some(cost) = final_cost {
                uow.request_mut().final_cost = Some(cost);
            }
            let before = uow.request.status;
            uow.set_status(to);
            uow.log(
                actor,
                AuditAction::ProcurementUpdated,
                with_notes(format!("{before} -> {to}"), notes),
            );
            uow.notify_employee(to.as_str(), notes.map(str::to_string));
            Ok(uow.request.clone())
        })
    }

    /// Reopens a cancelled request for procurement.
    pub fn rollback(
        &self,
        request_id: RequestId,
        user_id: UserId,
        notes: Option<&str>,
    ) -> Result<Request, WorkflowError> {
        let user = self.require_procurement(user_id)?;
        self.with_request(request_id, |uow| {
            let to = StatusTransitions::rollback_target(uow.request.status)?;
            uow.set_status(to);
            uow.log(
                Actor::Human(user.id),
                AuditAction::RequestRolledBack,
                with_notes(format!("{} -> {to}", RequestStatus::Cancelled), notes),
            );
            uow.notify_employee(to.as_str(), notes.map(str::to_string));
            tracing::info!(request_id = %uow.request.id, user_id = %user.id, "Request rolled back");
            Ok(uow.request.clone())
        })
    }
}
