//! Purchase and leave requests.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use procura_shared::types::{DepartmentId, RequestId, UserId};

use crate::workflow::types::{ProcurementStatus, RequestStatus};

/// Request category. Each category has its own, disjoint set of workflow steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestCategory {
    /// Purchase requests.
    General,
    /// Leave requests.
    Leave,
}

impl RequestCategory {
    /// Returns the string representation of the category.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::General => "general",
            Self::Leave => "leave",
        }
    }
}

/// A request moving through the approval workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// Unique identifier.
    pub id: RequestId,
    /// Which workflow step set applies.
    pub category: RequestCategory,
    /// Requested item (or leave type).
    pub item: String,
    /// Business justification.
    pub reason: String,
    /// Number of units.
    pub quantity: u32,
    /// The employee who created the request.
    pub requester_id: UserId,
    /// Requester's department at submission time.
    pub department_id: Option<DepartmentId>,
    /// Requested amount; overwritten by the verified price.
    pub amount: Decimal,
    /// Cost recorded by procurement after ordering.
    pub final_cost: Option<Decimal>,
    /// Lifecycle status.
    pub status: RequestStatus,
    /// Outcome of procurement verification.
    pub procurement_status: Option<ProcurementStatus>,
    /// Free-form fields available to step conditions as `attributes.<key>`.
    #[serde(default)]
    pub attributes: Map<String, Value>,
    /// When the request was created.
    pub created_at: DateTime<Utc>,
    /// When the request was last changed.
    pub updated_at: DateTime<Utc>,
}

impl Request {
    /// Builds a new request in `Pending` status.
    #[must_use]
    pub fn from_input(
        id: RequestId,
        input: NewRequest,
        requester_id: UserId,
        department_id: Option<DepartmentId>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            category: input.category,
            item: input.item,
            reason: input.reason,
            quantity: input.quantity,
            requester_id,
            department_id,
            amount: input.amount,
            final_cost: None,
            status: RequestStatus::Pending,
            procurement_status: None,
            attributes: input.attributes,
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns true if procurement verified the request.
    #[must_use]
    pub fn is_verified(&self) -> bool {
        self.procurement_status == Some(ProcurementStatus::Verified)
    }
}

/// Caller-supplied data for a new request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewRequest {
    /// Which workflow step set applies.
    pub category: RequestCategory,
    /// Requested item.
    pub item: String,
    /// Business justification.
    pub reason: String,
    /// Number of units.
    pub quantity: u32,
    /// Estimated amount.
    pub amount: Decimal,
    /// Free-form condition inputs.
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

impl NewRequest {
    /// A general purchase request with no extra attributes.
    #[must_use]
    pub fn purchase(item: impl Into<String>, amount: Decimal) -> Self {
        Self {
            category: RequestCategory::General,
            item: item.into(),
            reason: String::new(),
            quantity: 1,
            amount,
            attributes: Map::new(),
        }
    }
}
