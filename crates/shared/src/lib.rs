//! Shared types, errors, and configuration for Procura.
//!
//! This crate provides common types used across all other crates:
//! - Typed integer IDs for type-safe entity references
//! - Application-wide error types
//! - Configuration management (workflow thresholds, logging)
//! - Tracing subscriber setup

pub mod config;
pub mod error;
pub mod telemetry;
pub mod types;

pub use config::{AppConfig, LoggingConfig, MissingFieldPolicy, WorkflowConfig};
pub use error::{AppError, AppResult};
