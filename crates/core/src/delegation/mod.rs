//! Delegation of approval authority.
//!
//! A delegation lets a delegate act for a delegator on one workflow step,
//! optionally scoped to a department and bounded by a time window.

mod resolver;
mod types;

#[cfg(test)]
mod resolver_props;

pub use resolver::{DelegationResolver, EffectiveApprover};
pub use types::{Delegation, DelegationUpdate, NewDelegation};
pub(crate) use types::valid_window;
