//! Step and assignment conditions.
//!
//! A condition is a `{field, operator, value}` predicate over a request's
//! fact document. Evaluation lives in [`crate::workflow::conditions`].

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Comparison operator, serialized with its symbolic form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConditionOperator {
    /// Strictly greater.
    #[serde(rename = ">")]
    GreaterThan,
    /// Greater or equal.
    #[serde(rename = ">=")]
    GreaterOrEqual,
    /// Strictly less.
    #[serde(rename = "<")]
    LessThan,
    /// Less or equal.
    #[serde(rename = "<=")]
    LessOrEqual,
    /// Equality; `=` and `==` are synonyms.
    #[serde(rename = "=", alias = "==")]
    Equal,
    /// Inequality.
    #[serde(rename = "!=")]
    NotEqual,
    /// Membership in a list.
    #[serde(rename = "in")]
    In,
    /// Non-membership in a list.
    #[serde(rename = "not_in")]
    NotIn,
}

impl ConditionOperator {
    /// Parses an operator from its symbolic form.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            ">" => Some(Self::GreaterThan),
            ">=" => Some(Self::GreaterOrEqual),
            "<" => Some(Self::LessThan),
            "<=" => Some(Self::LessOrEqual),
            "=" | "==" => Some(Self::Equal),
            "!=" => Some(Self::NotEqual),
            "in" => Some(Self::In),
            "not_in" => Some(Self::NotIn),
            _ => None,
        }
    }

    /// Returns the symbolic form.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GreaterThan => ">",
            Self::GreaterOrEqual => ">=",
            Self::LessThan => "<",
            Self::LessOrEqual => "<=",
            Self::Equal => "=",
            Self::NotEqual => "!=",
            Self::In => "in",
            Self::NotIn => "not_in",
        }
    }
}

impl fmt::Display for ConditionOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A predicate over a request field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    /// Dotted path into the fact document, e.g. `amount` or `requester.role`.
    pub field: String,
    /// Comparison operator.
    pub operator: ConditionOperator,
    /// Literal or list operand.
    pub value: Value,
}

impl Condition {
    /// Creates a condition.
    #[must_use]
    pub fn new(field: impl Into<String>, operator: ConditionOperator, value: Value) -> Self {
        Self {
            field: field.into(),
            operator,
            value,
        }
    }
}
