//! Append-only audit log and step execution records.
//!
//! Step state is folded from [`StepExecution`] records. The audit log is the
//! human-readable projection of the same events; its notes embed the step
//! name and a `Step ID: N` marker, and rows written that way are still
//! honoured as evidence when folding.
//!
//! # Modules
//!
//! - `types` - Actors, the action vocabulary, log entries, executions
//! - `notes` - Step marker formatting and matching
//! - `ledger` - Per-step state folded from executions and audit rows

pub mod ledger;
pub mod notes;
pub mod types;

pub use ledger::{RecordedApproval, StepLedger, StepState};
pub use types::{Actor, AuditAction, AuditLogEntry, ExecutionStatus, StepExecution};
