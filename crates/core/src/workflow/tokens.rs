//! One-shot approval tokens sent with notifications.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use procura_shared::types::{RequestId, StepId, UserId};

use crate::workflow::error::WorkflowError;

/// What a token allows its holder to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenPurpose {
    /// Approve the request at its current step.
    Approval,
    /// Record the procurement verification decision.
    Verification,
}

/// A single-use token bound to one user and one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalToken {
    /// Opaque token value.
    pub token: Uuid,
    /// Request the token acts on.
    pub request_id: RequestId,
    /// User the token was issued to.
    pub user_id: UserId,
    /// Step the token was issued for; `None` for legacy routing and verification.
    pub step_id: Option<StepId>,
    /// Allowed action.
    pub purpose: TokenPurpose,
    /// Issue time.
    pub issued_at: DateTime<Utc>,
    /// Expiry (exclusive).
    pub expires_at: DateTime<Utc>,
    /// Set once the token has been consumed.
    pub used_at: Option<DateTime<Utc>>,
}

impl ApprovalToken {
    /// Issues a fresh token valid for `ttl_hours`.
    #[must_use]
    pub fn issue(
        request_id: RequestId,
        user_id: UserId,
        step_id: Option<StepId>,
        purpose: TokenPurpose,
        now: DateTime<Utc>,
        ttl_hours: u32,
    ) -> Self {
        Self {
            token: Uuid::new_v4(),
            request_id,
            user_id,
            step_id,
            purpose,
            issued_at: now,
            expires_at: now + Duration::hours(i64::from(ttl_hours)),
            used_at: None,
        }
    }

    /// Checks that the token may be redeemed for `purpose` at `now`.
    pub fn redeemable(&self, purpose: TokenPurpose, now: DateTime<Utc>) -> Result<(), WorkflowError> {
        if self.purpose != purpose {
            return Err(WorkflowError::TokenPurposeMismatch {
                expected: purpose,
                actual: self.purpose,
            });
        }
        if self.used_at.is_some() {
            return Err(WorkflowError::TokenAlreadyUsed);
        }
        if now >= self.expires_at {
            return Err(WorkflowError::TokenExpired);
        }
        Ok(())
    }
}
