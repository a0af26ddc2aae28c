//! Property-based tests for DelegationResolver.

use chrono::{DateTime, Duration, Utc};
use proptest::prelude::*;
use rust_decimal_macros::dec;

use procura_shared::types::{DelegationId, DepartmentId, RequestId, StepId, UserId};

use super::{Delegation, DelegationResolver};
use crate::model::{NewRequest, Request, Role, User};
use crate::store::memory::InMemoryStore;

const STEP: StepId = StepId::new(1);

fn user(id: i64) -> User {
    User {
        id: UserId::new(id),
        name: format!("user-{id}"),
        email: format!("user{id}@example.com"),
        role: Role::Manager,
        department_id: Some(DepartmentId::new(1)),
        is_active: true,
    }
}

fn request() -> Request {
    Request::from_input(
        RequestId::new(1),
        NewRequest::purchase("Chair", dec!(300)),
        UserId::new(100),
        Some(DepartmentId::new(1)),
        DateTime::<Utc>::UNIX_EPOCH,
    )
}

/// Grants among users 1..=8, half of them outside their window.
fn arb_grants() -> impl Strategy<Value = Vec<Delegation>> {
    prop::collection::vec((1i64..=8, 1i64..=8, any::<bool>(), 1i64..=2), 0..8).prop_map(|raw| {
        raw.into_iter()
            .enumerate()
            .map(|(i, (delegator, delegate, in_window, step))| {
                let now = DateTime::<Utc>::UNIX_EPOCH + Duration::days(10);
                Delegation {
                    id: DelegationId::new(i64::try_from(i).unwrap() + 1),
                    delegator_id: UserId::new(delegator),
                    delegate_id: UserId::new(delegate),
                    workflow_step_id: StepId::new(step),
                    department_id: None,
                    starts_at: None,
                    expires_at: Some(if in_window { now + Duration::days(1) } else { now - Duration::days(1) }),
                    is_active: true,
                    reason: None,
                    reject_reason: None,
                    can_delegate_further: false,
                    created_at: DateTime::<Utc>::UNIX_EPOCH,
                }
            })
            .collect()
    })
}

fn arb_nominal() -> impl Strategy<Value = Vec<User>> {
    prop::collection::btree_set(1i64..=8, 0..6).prop_map(|ids| ids.into_iter().map(user).collect())
}

fn directory() -> InMemoryStore {
    let store = InMemoryStore::new();
    for id in 1..=8 {
        store.insert_user(user(id));
    }
    store
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// A nominal approver is covered once by themselves, or once by each
    /// distinct delegate of their effective grants.
    #[test]
    fn prop_every_nominal_user_is_covered(nominal in arb_nominal(), grants in arb_grants()) {
        let store = directory();
        let now = DateTime::<Utc>::UNIX_EPOCH + Duration::days(10);
        let resolved = DelegationResolver::effective_approvers(&store, &request(), STEP, &nominal, &grants, now).unwrap();

        for user in &nominal {
            let delegates: std::collections::BTreeSet<_> =
                DelegationResolver::find_effective(&grants, user.id, STEP, &request(), now)
                    .iter()
                    .map(|d| d.delegate_id)
                    .collect();
            let covering = resolved.iter().filter(|a| a.covers(user.id)).count();
            prop_assert_eq!(covering, delegates.len().max(1), "user {} covered {} times", user.id, covering);
        }
    }

    /// The result is sorted and free of duplicate users.
    #[test]
    fn prop_result_is_sorted_and_unique(nominal in arb_nominal(), grants in arb_grants()) {
        let store = directory();
        let now = DateTime::<Utc>::UNIX_EPOCH + Duration::days(10);
        let resolved = DelegationResolver::effective_approvers(&store, &request(), STEP, &nominal, &grants, now).unwrap();

        let ids: Vec<_> = resolved.iter().map(|a| a.user.id).collect();
        let mut sorted = ids.clone();
        sorted.sort();
        sorted.dedup();
        prop_assert_eq!(ids, sorted);
    }

    /// A delegator with an effective grant never acts as a nominal approver.
    #[test]
    fn prop_delegators_are_replaced(nominal in arb_nominal(), grants in arb_grants()) {
        let store = directory();
        let now = DateTime::<Utc>::UNIX_EPOCH + Duration::days(10);
        let resolved = DelegationResolver::effective_approvers(&store, &request(), STEP, &nominal, &grants, now).unwrap();

        for user in &nominal {
            if !DelegationResolver::find_effective(&grants, user.id, STEP, &request(), now).is_empty() {
                let still_nominal = resolved.iter().any(|a| a.user.id == user.id && a.is_nominal);
                prop_assert!(!still_nominal, "delegator {} still nominal", user.id);
            }
        }
    }

    /// Without grants the nominal list comes back unchanged.
    #[test]
    fn prop_no_grants_is_identity(nominal in arb_nominal()) {
        let store = directory();
        let resolved = DelegationResolver::effective_approvers(&store, &request(), STEP, &nominal, &[], Utc::now()).unwrap();
        let ids: Vec<_> = resolved.iter().map(|a| a.user.id).collect();
        let expected: Vec<_> = nominal.iter().map(|u| u.id).collect();
        prop_assert_eq!(ids, expected);
    }
}
