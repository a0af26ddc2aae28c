//! Property-based tests for ThresholdRouter.

use proptest::prelude::*;
use rust_decimal::Decimal;

use procura_shared::types::{ApprovalRuleId, DepartmentId};

use crate::model::{ApprovalRule, Role};
use crate::workflow::legacy::{LegacyRoute, LegacyThresholds, ThresholdRouter};

/// Strategy for generating random positive Decimal amounts.
fn arb_amount() -> impl Strategy<Value = Decimal> {
    (1i64..10_000_000i64).prop_map(|n| Decimal::new(n, 2))
}

/// Ordered thresholds: auto < manager-only < ceo.
fn arb_thresholds() -> impl Strategy<Value = LegacyThresholds> {
    (1i64..1_000, 1i64..10_000, 1i64..100_000).prop_map(|(a, b, c)| LegacyThresholds {
        auto_approval: Decimal::new(a, 0),
        manager_only: Decimal::new(a + b, 0),
        ceo_approval: Decimal::new(a + b + c, 0),
    })
}

fn arb_role() -> impl Strategy<Value = Role> {
    prop_oneof![
        Just(Role::Manager),
        Just(Role::Ceo),
        Just(Role::Admin),
        Just(Role::Finance),
    ]
}

/// Non-overlapping consecutive bands starting at zero.
fn arb_rules() -> impl Strategy<Value = Vec<ApprovalRule>> {
    prop::collection::vec((1i64..50_000, arb_role()), 1..5).prop_map(|bands| {
        let mut min = Decimal::ZERO;
        let last = bands.len() - 1;
        bands
            .into_iter()
            .enumerate()
            .map(|(i, (width, role))| {
                let max = (i != last).then(|| min + Decimal::new(width, 0));
                let rule = ApprovalRule {
                    id: ApprovalRuleId::new(i64::try_from(i).unwrap() + 1),
                    department_id: DepartmentId::new(1),
                    min_amount: min,
                    max_amount: max,
                    approver_role: role,
                    order: i32::try_from(i).unwrap(),
                    is_active: true,
                };
                if let Some(max) = max {
                    min = max;
                }
                rule
            })
            .collect()
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Amounts at or below the auto threshold never need an approver.
    #[test]
    fn prop_auto_threshold_wins(t in arb_thresholds(), rules in arb_rules(), cents in 0i64..100) {
        let amount = t.auto_approval - Decimal::new(cents, 2);
        prop_assert_eq!(ThresholdRouter::route(amount, &rules, &t), LegacyRoute::AutoApproved);
    }

    /// Without rules a manager always approves first, and the CEO only above the CEO threshold.
    #[test]
    fn prop_threshold_stages(t in arb_thresholds(), amount in arb_amount()) {
        match ThresholdRouter::route(amount, &[], &t) {
            LegacyRoute::AutoApproved => prop_assert!(amount <= t.auto_approval),
            LegacyRoute::Stages(stages) => {
                prop_assert_eq!(stages[0], Role::Manager);
                prop_assert!(stages.len() <= 2);
                prop_assert_eq!(stages.contains(&Role::Ceo), amount > t.ceo_approval && amount > t.manager_only);
                prop_assert_eq!(stages.len() == 1, amount <= t.manager_only);
            }
        }
    }

    /// With full-coverage bands exactly one rule routes each amount above auto.
    #[test]
    fn prop_bands_pick_one_rule(t in arb_thresholds(), rules in arb_rules(), amount in arb_amount()) {
        prop_assume!(amount > t.auto_approval);
        let route = ThresholdRouter::route(amount, &rules, &t);
        let expected: Vec<Role> = rules.iter().filter(|r| r.contains(amount)).map(|r| r.approver_role).collect();
        prop_assert_eq!(expected.len(), 1);
        prop_assert_eq!(route, LegacyRoute::Stages(expected));
    }
}
