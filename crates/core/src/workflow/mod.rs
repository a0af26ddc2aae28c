//! Request approval workflow.
//!
//! This module implements the request status machine, step evaluation,
//! the legacy threshold router and the orchestrating engine.
//!
//! # Modules
//!
//! - `types` - Request statuses, procurement outcomes, step outcomes
//! - `error` - Workflow-specific error types
//! - `transitions` - Status transition table
//! - `conditions` - Condition evaluation over a request fact document
//! - `evaluator` - Step applicability, completion and authorization
//! - `legacy` - Threshold routing for requests without dynamic steps
//! - `tokens` - One-shot approval tokens
//! - `engine` - The orchestrator

pub mod conditions;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod legacy;
pub mod tokens;
pub mod transitions;
pub mod types;

#[cfg(test)]
mod legacy_props;
#[cfg(test)]
mod transitions_props;

pub use conditions::{ConditionEvaluator, FactDocument};
pub use engine::{EngineSettings, OverdueStep, WorkflowEngine};
pub use error::{ErrorKind, WorkflowError};
pub use evaluator::{RequestContext, StepEvaluator};
pub use legacy::{LegacyRoute, LegacyThresholds, ThresholdRouter};
pub use tokens::{ApprovalToken, TokenPurpose};
pub use transitions::StatusTransitions;
pub use types::{ProcurementAction, ProcurementStatus, RequestStatus, StepOutcome};
