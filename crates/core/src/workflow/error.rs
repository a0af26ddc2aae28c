//! Workflow error types for request lifecycle management.
//!
//! This module defines all error types that can occur during
//! workflow operations such as submission, approval, and delegation.

use procura_shared::AppError;
use procura_shared::types::{DelegationId, RequestId, StepId, UserId};
use thiserror::Error;

use crate::store::StoreError;
use crate::workflow::tokens::TokenPurpose;
use crate::workflow::types::RequestStatus;

/// Broad class of a workflow error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Actor may not perform the operation.
    Authorization,
    /// Request is in the wrong state.
    State,
    /// Input rejected.
    Validation,
    /// Referenced entity does not exist.
    NotFound,
    /// Persistence failed.
    Storage,
}

/// Errors that can occur during workflow operations.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// Attempted an invalid status transition.
    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition {
        /// The current status.
        from: RequestStatus,
        /// The attempted target status.
        to: RequestStatus,
    },

    /// Operation requires a different request status.
    #[error("Request is {actual}, expected {expected}")]
    UnexpectedStatus {
        /// The status the operation needs.
        expected: RequestStatus,
        /// The current status.
        actual: RequestStatus,
    },

    /// User is not authorized to act on the request.
    #[error("User {user_id} is not authorized to {action} this request")]
    NotAuthorized {
        /// The user who attempted the action.
        user_id: UserId,
        /// What they attempted.
        action: &'static str,
    },

    /// User's role does not meet the required role.
    #[error("User {user_id} lacks role {required}")]
    InsufficientRole {
        /// The acting user.
        user_id: UserId,
        /// Roles that would be accepted.
        required: &'static str,
    },

    /// Only the delegator or delegate may manage this delegation.
    #[error("User {user_id} may not manage delegation {delegation_id}")]
    NotDelegationParty {
        /// The acting user.
        user_id: UserId,
        /// The delegation.
        delegation_id: DelegationId,
    },

    /// Rejection reason is required but not provided.
    #[error("Rejection reason is required")]
    RejectionReasonRequired,

    /// Amount is not acceptable.
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Request input is malformed.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// A user may not delegate to themselves.
    #[error("Cannot delegate to yourself")]
    SelfDelegation,

    /// Delegation window ends before it starts.
    #[error("Delegation must expire after it starts")]
    InvalidDelegationWindow,

    /// Token is for another kind of action.
    #[error("Token was issued for {actual:?}, not {expected:?}")]
    TokenPurposeMismatch {
        /// Purpose of the attempted action.
        expected: TokenPurpose,
        /// Purpose of the token.
        actual: TokenPurpose,
    },

    /// Token has been redeemed before.
    #[error("Token has already been used")]
    TokenAlreadyUsed,

    /// Token lifetime has passed.
    #[error("Token has expired")]
    TokenExpired,

    /// Request not found.
    #[error("Request {0} not found")]
    RequestNotFound(RequestId),

    /// User not found.
    #[error("User {0} not found")]
    UserNotFound(UserId),

    /// Step not found.
    #[error("Workflow step {0} not found")]
    StepNotFound(StepId),

    /// Delegation not found.
    #[error("Delegation {0} not found")]
    DelegationNotFound(DelegationId),

    /// Token not found.
    #[error("Token not found")]
    TokenNotFound,

    /// Persistence error.
    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),
}

impl WorkflowError {
    /// Returns the class of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotAuthorized { .. }
            | Self::InsufficientRole { .. }
            | Self::NotDelegationParty { .. } => ErrorKind::Authorization,

            Self::InvalidTransition { .. }
            | Self::UnexpectedStatus { .. }
            | Self::TokenAlreadyUsed
            | Self::TokenExpired => ErrorKind::State,

            Self::RejectionReasonRequired
            | Self::InvalidAmount(_)
            | Self::InvalidRequest(_)
            | Self::SelfDelegation
            | Self::InvalidDelegationWindow
            | Self::TokenPurposeMismatch { .. } => ErrorKind::Validation,

            Self::RequestNotFound(_)
            | Self::UserNotFound(_)
            | Self::StepNotFound(_)
            | Self::DelegationNotFound(_)
            | Self::TokenNotFound => ErrorKind::NotFound,

            Self::Storage(_) => ErrorKind::Storage,
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self.kind() {
            ErrorKind::Authorization => 403,
            ErrorKind::State => 422,
            ErrorKind::Validation => 400,
            ErrorKind::NotFound => 404,
            ErrorKind::Storage => 500,
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidTransition { .. } => "INVALID_TRANSITION",
            Self::UnexpectedStatus { .. } => "UNEXPECTED_STATUS",
            Self::NotAuthorized { .. } => "NOT_AUTHORIZED",
            Self::InsufficientRole { .. } => "INSUFFICIENT_ROLE",
            Self::NotDelegationParty { .. } => "NOT_DELEGATION_PARTY",
            Self::RejectionReasonRequired => "REJECTION_REASON_REQUIRED",
            Self::InvalidAmount(_) => "INVALID_AMOUNT",
            Self::InvalidRequest(_) => "INVALID_REQUEST",
            Self::SelfDelegation => "SELF_DELEGATION",
            Self::InvalidDelegationWindow => "INVALID_DELEGATION_WINDOW",
            Self::TokenPurposeMismatch { .. } => "TOKEN_PURPOSE_MISMATCH",
            Self::TokenAlreadyUsed => "TOKEN_ALREADY_USED",
            Self::TokenExpired => "TOKEN_EXPIRED",
            Self::RequestNotFound(_) => "REQUEST_NOT_FOUND",
            Self::UserNotFound(_) => "USER_NOT_FOUND",
            Self::StepNotFound(_) => "STEP_NOT_FOUND",
            Self::DelegationNotFound(_) => "DELEGATION_NOT_FOUND",
            Self::TokenNotFound => "TOKEN_NOT_FOUND",
            Self::Storage(_) => "STORAGE_ERROR",
        }
    }
}

impl From<WorkflowError> for AppError {
    fn from(err: WorkflowError) -> Self {
        let message = err.to_string();
        match err.kind() {
            ErrorKind::Authorization => Self::Forbidden(message),
            ErrorKind::State => Self::InvalidState(message),
            ErrorKind::Validation => Self::Validation(message),
            ErrorKind::NotFound => Self::NotFound(message),
            ErrorKind::Storage => Self::Storage(message),
        }
    }
}
