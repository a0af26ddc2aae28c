//! Property-based tests for StatusTransitions.

use proptest::prelude::*;

use crate::workflow::error::WorkflowError;
use crate::workflow::transitions::StatusTransitions;
use crate::workflow::types::{ProcurementAction, RequestStatus};

/// Strategy for generating random RequestStatus values.
fn arb_status() -> impl Strategy<Value = RequestStatus> {
    prop_oneof![
        Just(RequestStatus::Pending),
        Just(RequestStatus::PendingProcurementVerification),
        Just(RequestStatus::PendingApproval),
        Just(RequestStatus::Approved),
        Just(RequestStatus::PendingProcurement),
        Just(RequestStatus::Ordered),
        Just(RequestStatus::Delivered),
        Just(RequestStatus::Cancelled),
        Just(RequestStatus::Rejected),
    ]
}

fn arb_action() -> impl Strategy<Value = ProcurementAction> {
    prop_oneof![
        Just(ProcurementAction::PendingProcurement),
        Just(ProcurementAction::Ordered),
        Just(ProcurementAction::Delivered),
        Just(ProcurementAction::Cancelled),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Terminal statuses have no way out.
    #[test]
    fn prop_terminal_states_are_final(from in arb_status(), to in arb_status()) {
        if from.is_terminal() {
            prop_assert!(!StatusTransitions::is_valid(from, to));
        } else {
            prop_assert!(!StatusTransitions::allowed_targets(from).is_empty());
        }
    }

    /// validate agrees with is_valid and reports the attempted transition.
    #[test]
    fn prop_validate_matches_table(from in arb_status(), to in arb_status()) {
        match StatusTransitions::validate(from, to) {
            Ok(()) => prop_assert!(StatusTransitions::is_valid(from, to)),
            Err(WorkflowError::InvalidTransition { from: f, to: t }) => {
                prop_assert!(!StatusTransitions::is_valid(from, to));
                prop_assert_eq!((f, t), (from, to));
            }
            Err(other) => prop_assert!(false, "unexpected error {other}"),
        }
    }

    /// No status transitions to itself.
    #[test]
    fn prop_no_self_transitions(status in arb_status()) {
        prop_assert!(!StatusTransitions::is_valid(status, status));
    }

    /// A successful procurement action always lands on the action's status.
    #[test]
    fn prop_procurement_lands_on_target(from in arb_status(), action in arb_action()) {
        if let Ok(to) = StatusTransitions::procurement_target(from, action) {
            prop_assert_eq!(to, action.target_status());
            prop_assert!(!from.is_terminal());
        }
    }

    /// Only cancelled requests roll back.
    #[test]
    fn prop_rollback_only_from_cancelled(from in arb_status()) {
        prop_assert_eq!(
            StatusTransitions::rollback_target(from).is_ok(),
            from == RequestStatus::Cancelled
        );
    }
}
