//! Entity model read by the workflow engine.
//!
//! Requests, workflow steps and their assignments, legacy approval rules,
//! and the user directory. These are administrator-managed records except
//! for [`Request`], which only the engine mutates.

pub mod condition;
pub mod directory;
pub mod request;
pub mod rule;
pub mod step;

pub use condition::{Condition, ConditionOperator};
pub use directory::{Department, FinanceAssignment, Role, User};
pub use request::{NewRequest, Request, RequestCategory};
pub use rule::{ApprovalRule, RuleOverlap, validate_rule_set};
pub use step::{Assignee, StepType, WorkflowStep, WorkflowStepAssignment};
