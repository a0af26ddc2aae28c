//! Core business logic for Procura.
//!
//! This crate contains the approval workflow engine with ZERO web or
//! database dependencies. Persistence and notification delivery sit behind
//! the traits in [`store`] and [`notify`].
//!
//! # Modules
//!
//! - `model` - Requests, steps, assignments, rules and the user directory
//! - `audit` - Audit log, step executions and folded step state
//! - `delegation` - Delegations and effective approver resolution
//! - `workflow` - Status machine, evaluation, legacy routing, engine
//! - `store` - Persistence traits and the in-memory store
//! - `notify` - Notification channel

pub mod audit;
pub mod delegation;
pub mod model;
pub mod notify;
pub mod store;
pub mod workflow;
