//! Condition language over a request's fact document.
//!
//! Conditions address fields by dotted path (`amount`, `attributes.nights`,
//! `requester.role`, `items.0.sku`). Operands that both read as numbers are
//! compared as `Decimal`; everything else compares by value.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde_json::{Map, Value, json};

use procura_shared::MissingFieldPolicy;

use crate::model::{Condition, ConditionOperator, Department, Request, User};

/// JSON view of a request used to evaluate conditions.
#[derive(Debug, Clone, PartialEq)]
pub struct FactDocument(Value);

impl FactDocument {
    /// Builds the document for `request`, its requester and their department.
    #[must_use]
    pub fn build(request: &Request, requester: Option<&User>, department: Option<&Department>) -> Self {
        let requester = requester.map_or(Value::Null, |u| {
            json!({
                "id": u.id,
                "name": u.name,
                "email": u.email,
                "role": u.role.as_str(),
                "department_id": u.department_id,
            })
        });
        let department = department.map_or(Value::Null, |d| {
            json!({
                "id": d.id,
                "name": d.name,
                "manager_id": d.manager_id,
            })
        });

        Self(json!({
            "id": request.id,
            "category": request.category.as_str(),
            "item": request.item,
            "reason": request.reason,
            "quantity": request.quantity,
            "requester_id": request.requester_id,
            "department_id": request.department_id,
            "amount": request.amount.to_string(),
            "final_cost": request.final_cost.map(|c| c.to_string()),
            "status": request.status.as_str(),
            "procurement_status": request.procurement_status.map(|s| s.as_str()),
            "attributes": Value::Object(request.attributes.clone()),
            "requester": requester,
            "department": department,
        }))
    }

    /// Wraps an arbitrary JSON document.
    #[must_use]
    pub fn from_value(value: Value) -> Self {
        Self(value)
    }

    /// Reads a dotted path. Unknown top-level names fall back to `attributes`.
    #[must_use]
    pub fn lookup(&self, path: &str) -> Option<&Value> {
        walk(&self.0, path)
            .or_else(|| self.0.get("attributes").and_then(|attrs| walk(attrs, path)))
            .filter(|v| !v.is_null())
    }
}

fn walk<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(root, |node, segment| match node {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// Reads a JSON scalar as a decimal number.
fn as_decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => Decimal::from_str(&n.to_string())
            .ok()
            .or_else(|| Decimal::from_scientific(&n.to_string()).ok()),
        Value::String(s) => Decimal::from_str(s.trim()).ok(),
        _ => None,
    }
}

fn values_equal(left: &Value, right: &Value) -> bool {
    if let (Some(l), Some(r)) = (as_decimal(left), as_decimal(right)) {
        return l == r;
    }
    match (left, right) {
        (Value::String(l), Value::Bool(r)) | (Value::Bool(r), Value::String(l)) => {
            l.eq_ignore_ascii_case(if *r { "true" } else { "false" })
        }
        _ => left == right,
    }
}

fn as_list(value: &Value) -> &[Value] {
    match value {
        Value::Array(items) => items,
        other => std::slice::from_ref(other),
    }
}

fn compare(actual: &Value, operator: ConditionOperator, expected: &Value) -> bool {
    match operator {
        ConditionOperator::Equal => values_equal(actual, expected),
        ConditionOperator::NotEqual => !values_equal(actual, expected),
        ConditionOperator::In => as_list(expected).iter().any(|v| values_equal(actual, v)),
        ConditionOperator::NotIn => !as_list(expected).iter().any(|v| values_equal(actual, v)),
        ConditionOperator::GreaterThan
        | ConditionOperator::GreaterOrEqual
        | ConditionOperator::LessThan
        | ConditionOperator::LessOrEqual => {
            let (Some(l), Some(r)) = (as_decimal(actual), as_decimal(expected)) else {
                return false;
            };
            match operator {
                ConditionOperator::GreaterThan => l > r,
                ConditionOperator::GreaterOrEqual => l >= r,
                ConditionOperator::LessThan => l < r,
                _ => l <= r,
            }
        }
    }
}

/// Evaluates conditions against fact documents.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConditionEvaluator {
    policy: MissingFieldPolicy,
}

impl ConditionEvaluator {
    /// Creates an evaluator with the given missing-field behaviour.
    #[must_use]
    pub fn new(policy: MissingFieldPolicy) -> Self {
        Self { policy }
    }

    /// Evaluates one condition.
    #[must_use]
    pub fn evaluate(&self, condition: &Condition, facts: &FactDocument) -> bool {
        match facts.lookup(&condition.field) {
            Some(actual) => compare(actual, condition.operator, &condition.value),
            None => {
                tracing::trace!(field = %condition.field, policy = ?self.policy, "Condition field missing");
                self.policy == MissingFieldPolicy::Pass
            }
        }
    }

    /// Returns true if every condition holds. An empty list holds.
    #[must_use]
    pub fn evaluate_all(&self, conditions: &[Condition], facts: &FactDocument) -> bool {
        conditions.iter().all(|c| self.evaluate(c, facts))
    }
}

/// Builds a document from a bare attribute map, for callers without a request.
#[must_use]
pub fn facts_from_attributes(attributes: Map<String, Value>) -> FactDocument {
    FactDocument(json!({ "attributes": Value::Object(attributes) }))
}
