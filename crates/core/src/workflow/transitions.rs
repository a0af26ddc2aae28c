//! Request status transitions.
//!
//! This module holds the status machine the engine enforces whenever it
//! moves a request, including procurement's post-approval actions.

use crate::workflow::error::WorkflowError;
use crate::workflow::types::{ProcurementAction, RequestStatus};

/// Stateless validation of request status transitions.
pub struct StatusTransitions;

impl StatusTransitions {
    /// Statuses reachable from `from` in one step.
    #[must_use]
    pub fn allowed_targets(from: RequestStatus) -> &'static [RequestStatus] {
        use RequestStatus::{
            Approved, Cancelled, Delivered, Ordered, Pending, PendingApproval, PendingProcurement,
            PendingProcurementVerification, Rejected,
        };
        match from {
            Pending => &[PendingProcurementVerification],
            PendingProcurementVerification => &[PendingApproval, Rejected],
            PendingApproval => &[Approved, Rejected, Ordered, Cancelled],
            Approved => &[PendingProcurement, Ordered, Delivered, Cancelled],
            PendingProcurement => &[Ordered, Delivered, Cancelled],
            Ordered => &[Delivered, Cancelled],
            Cancelled => &[PendingProcurement],
            Rejected | Delivered => &[],
        }
    }

    /// Returns true if `from → to` is allowed.
    #[must_use]
    pub fn is_valid(from: RequestStatus, to: RequestStatus) -> bool {
        Self::allowed_targets(from).contains(&to)
    }

    /// Validates a transition.
    ///
    /// # Returns
    /// * `Ok(())` if the transition is allowed
    /// * `Err(WorkflowError::InvalidTransition)` otherwise
    pub fn validate(from: RequestStatus, to: RequestStatus) -> Result<(), WorkflowError> {
        if Self::is_valid(from, to) {
            Ok(())
        } else {
            Err(WorkflowError::InvalidTransition { from, to })
        }
    }

    /// Returns true if a procurement action on a request still awaiting
    /// approval first forces the approval to complete.
    #[must_use]
    pub fn forces_approval(from: RequestStatus, action: ProcurementAction) -> bool {
        from == RequestStatus::PendingApproval
            && matches!(action, ProcurementAction::Ordered | ProcurementAction::Cancelled)
    }

    /// Validates a procurement action and returns the status it leads to.
    ///
    /// When the action forces approval completion the check runs from
    /// `Approved`.
    pub fn procurement_target(
        from: RequestStatus,
        action: ProcurementAction,
    ) -> Result<RequestStatus, WorkflowError> {
        let to = action.target_status();
        let effective_from = if Self::forces_approval(from, action) {
            RequestStatus::Approved
        } else {
            from
        };
        if from == RequestStatus::PendingApproval && !Self::forces_approval(from, action) {
            return Err(WorkflowError::InvalidTransition { from, to });
        }
        Self::validate(effective_from, to)?;
        Ok(to)
    }

    /// Validates a rollback of a cancelled request.
    pub fn rollback_target(from: RequestStatus) -> Result<RequestStatus, WorkflowError> {
        if from == RequestStatus::Cancelled {
            Ok(RequestStatus::PendingProcurement)
        } else {
            Err(WorkflowError::UnexpectedStatus {
                expected: RequestStatus::Cancelled,
                actual: from,
            })
        }
    }
}
