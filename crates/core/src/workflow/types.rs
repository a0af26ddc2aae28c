//! Workflow domain types for request lifecycle management.
//!
//! This module defines the request status machine, procurement outcomes,
//! and the result of a single orchestration step.

use serde::{Deserialize, Serialize};
use std::fmt;

use procura_shared::types::StepId;

/// Request status in the approval workflow.
///
/// The display strings are persisted and shown to users verbatim.
/// Valid transitions:
/// - Pending → Pending Procurement Verification (submit)
/// - Pending Procurement Verification → Pending Approval | Rejected (verify)
/// - Pending Approval → Approved | Rejected (approve / reject)
/// - Pending Approval → Ordered | Cancelled (procurement override)
/// - Approved → Pending Procurement | Ordered | Delivered | Cancelled
/// - Pending Procurement → Ordered | Delivered | Cancelled
/// - Ordered → Delivered | Cancelled
/// - Cancelled → Pending Procurement (rollback)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestStatus {
    /// Request has been created but not yet routed.
    #[serde(rename = "Pending")]
    Pending,
    /// Procurement is checking availability and price.
    #[serde(rename = "Pending Procurement Verification")]
    PendingProcurementVerification,
    /// Request is moving through approval steps.
    #[serde(rename = "Pending Approval")]
    PendingApproval,
    /// All approvals are complete.
    #[serde(rename = "Approved")]
    Approved,
    /// Waiting for procurement to place the order.
    #[serde(rename = "Pending Procurement")]
    PendingProcurement,
    /// Order placed with the supplier.
    #[serde(rename = "Ordered")]
    Ordered,
    /// Goods delivered (terminal).
    #[serde(rename = "Delivered")]
    Delivered,
    /// Order cancelled; reversible by rollback.
    #[serde(rename = "Cancelled")]
    Cancelled,
    /// Request rejected (terminal).
    #[serde(rename = "Rejected")]
    Rejected,
}

impl RequestStatus {
    /// Returns the string representation of the status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::PendingProcurementVerification => "Pending Procurement Verification",
            Self::PendingApproval => "Pending Approval",
            Self::Approved => "Approved",
            Self::PendingProcurement => "Pending Procurement",
            Self::Ordered => "Ordered",
            Self::Delivered => "Delivered",
            Self::Cancelled => "Cancelled",
            Self::Rejected => "Rejected",
        }
    }

    /// Parses a status from its display string (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "pending procurement verification" => Some(Self::PendingProcurementVerification),
            "pending approval" => Some(Self::PendingApproval),
            "approved" => Some(Self::Approved),
            "pending procurement" => Some(Self::PendingProcurement),
            "ordered" => Some(Self::Ordered),
            "delivered" => Some(Self::Delivered),
            "cancelled" => Some(Self::Cancelled),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }

    /// Returns true if no further transition is possible.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Rejected | Self::Delivered)
    }

    /// Returns true while approvers can still act on the request.
    #[must_use]
    pub fn is_awaiting_approval(&self) -> bool {
        matches!(self, Self::PendingApproval)
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of procurement verification, stored on the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProcurementStatus {
    /// Item is available and the price is confirmed.
    #[serde(rename = "Verified")]
    Verified,
    /// Item cannot be sourced.
    #[serde(rename = "Not Available")]
    NotAvailable,
    /// Procurement refused the request.
    #[serde(rename = "Rejected")]
    Rejected,
}

impl ProcurementStatus {
    /// Returns the string representation of the procurement status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Verified => "Verified",
            Self::NotAvailable => "Not Available",
            Self::Rejected => "Rejected",
        }
    }

    /// Returns true if verification failed.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::NotAvailable | Self::Rejected)
    }
}

impl fmt::Display for ProcurementStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Post-approval action taken by procurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProcurementAction {
    /// Queue the request for purchasing.
    #[serde(rename = "Pending Procurement")]
    PendingProcurement,
    /// Order placed.
    #[serde(rename = "Ordered")]
    Ordered,
    /// Goods received.
    #[serde(rename = "Delivered")]
    Delivered,
    /// Order cancelled.
    #[serde(rename = "Cancelled")]
    Cancelled,
}

impl ProcurementAction {
    /// Returns the request status this action moves to.
    #[must_use]
    pub fn target_status(&self) -> RequestStatus {
        match self {
            Self::PendingProcurement => RequestStatus::PendingProcurement,
            Self::Ordered => RequestStatus::Ordered,
            Self::Delivered => RequestStatus::Delivered,
            Self::Cancelled => RequestStatus::Cancelled,
        }
    }
}

/// Result of one call to the orchestration step function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// A step was completed without human input (auto-approve, notification).
    Completed(StepId),
    /// A step was started and its approvers were notified.
    Forwarded(StepId),
    /// A required step is in flight; later steps may not start.
    Waiting(StepId),
    /// Every required step is complete and the request was approved.
    Finished,
    /// Nothing to do: the request is not awaiting approval, or no step can run.
    Idle,
}

impl StepOutcome {
    /// Returns true if the call changed workflow state and another call may
    /// make further progress.
    #[must_use]
    pub fn made_progress(&self) -> bool {
        matches!(self, Self::Completed(_) | Self::Forwarded(_))
    }
}
