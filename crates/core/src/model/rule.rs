//! Legacy per-department approval rules.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use procura_shared::types::{ApprovalRuleId, DepartmentId};

use super::directory::Role;

/// An amount band that routes a department's requests to an approver role.
///
/// The band is half-open: `[min_amount, max_amount)`. A missing
/// `max_amount` means the band has no upper bound.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalRule {
    /// Unique identifier for the rule.
    pub id: ApprovalRuleId,
    /// Department the rule belongs to.
    pub department_id: DepartmentId,
    /// Inclusive lower bound.
    pub min_amount: Decimal,
    /// Exclusive upper bound.
    pub max_amount: Option<Decimal>,
    /// Role that must approve requests in this band.
    pub approver_role: Role,
    /// Evaluation order (ascending).
    pub order: i32,
    /// Inactive rules are ignored.
    pub is_active: bool,
}

impl ApprovalRule {
    /// Returns true if `amount` falls inside the band.
    #[must_use]
    pub fn contains(&self, amount: Decimal) -> bool {
        amount >= self.min_amount && self.max_amount.is_none_or(|max| amount < max)
    }

    /// Returns true if the two bands share at least one amount.
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        let self_below_other_max = other.max_amount.is_none_or(|max| self.min_amount < max);
        let other_below_self_max = self.max_amount.is_none_or(|max| other.min_amount < max);
        self_below_other_max && other_below_self_max
    }
}

/// Two active rules of one department cover the same amounts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Approval rules {first} and {second} overlap in department {department_id}")]
pub struct RuleOverlap {
    /// Department holding both rules.
    pub department_id: DepartmentId,
    /// First rule.
    pub first: ApprovalRuleId,
    /// Second rule.
    pub second: ApprovalRuleId,
}

/// Checks that no two active rules of the same department overlap.
///
/// This is a write-time check; the router itself tolerates overlaps and
/// simply walks every matching rule in order.
pub fn validate_rule_set(rules: &[ApprovalRule]) -> Result<(), RuleOverlap> {
    let active: Vec<_> = rules.iter().filter(|r| r.is_active).collect();
    for (i, first) in active.iter().enumerate() {
        for second in &active[i + 1..] {
            if first.department_id == second.department_id && first.overlaps(second) {
                return Err(RuleOverlap {
                    department_id: first.department_id,
                    first: first.id,
                    second: second.id,
                });
            }
        }
    }
    Ok(())
}
