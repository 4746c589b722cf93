// Property-based tests for identity mapping, group filtering and interval arithmetic

use chrono::{Duration, TimeZone, Utc};
use orchestrator::identity::{IdentityStore, InMemoryIdentityStore};
use orchestrator::models::{EntityKind, NativeKey};
use orchestrator::permissions::PermittedGroups;
use orchestrator::schedule::{default_timezone, FireTimeCalculator};
use orchestrator::trigger::{TriggerSchedule, REPEAT_INDEFINITELY};
use proptest::prelude::*;
use std::collections::BTreeSet;

fn key_strategy() -> impl Strategy<Value = NativeKey> {
    ("[A-Za-z][A-Za-z0-9_]{0,12}", "[A-Za-z][A-Za-z0-9_]{0,8}")
        .prop_map(|(name, group)| NativeKey::new(name, group))
}

fn kind_strategy() -> impl Strategy<Value = EntityKind> {
    prop_oneof![Just(EntityKind::Job), Just(EntityKind::Trigger)]
}

proptest! {
    #[test]
    fn prop_identity_round_trip(
        keys in prop::collection::btree_set(key_strategy(), 1..20),
        kind in kind_strategy(),
    ) {
        let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
        rt.block_on(async {
            let store = InMemoryIdentityStore::new();
            for key in &keys {
                let id = store.put(kind, key).await.unwrap();
                let entry = store.resolve(id).await.unwrap();
                prop_assert_eq!(&entry.key, key);
                prop_assert_eq!(entry.kind, kind);
                prop_assert_eq!(store.reverse_resolve(key, kind).await.unwrap(), id);
                prop_assert!(store.put(kind, key).await.is_err());
            }
            prop_assert_eq!(store.len().await, keys.len());
            Ok::<(), TestCaseError>(())
        })?;
    }

    #[test]
    fn prop_removed_identifiers_never_resolve(
        keys in prop::collection::btree_set(key_strategy(), 1..20),
    ) {
        let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
        rt.block_on(async {
            let store = InMemoryIdentityStore::new();
            let mut ids = Vec::new();
            for key in &keys {
                ids.push(store.put(EntityKind::Job, key).await.unwrap());
            }
            for id in &ids {
                store.remove(*id).await.unwrap();
                prop_assert!(store.resolve(*id).await.is_err());
            }
            prop_assert!(store.is_empty().await);
            Ok::<(), TestCaseError>(())
        })?;
    }

    #[test]
    fn prop_filter_groups_is_subset_of_permitted(
        permitted in prop::collection::btree_set("[A-D][0-9]", 0..5),
        candidates in prop::collection::vec("[A-D][0-9]", 0..12),
    ) {
        let groups = PermittedGroups::from_groups(permitted.iter().cloned());
        let filtered = groups.filter_groups(candidates.iter().cloned());

        for group in &filtered {
            prop_assert!(permitted.contains(group));
            prop_assert!(groups.authorize(group));
        }
        let expected: Vec<String> = candidates
            .iter()
            .filter(|c| permitted.contains(*c))
            .cloned()
            .collect();
        prop_assert_eq!(filtered, expected);
    }

    #[test]
    fn prop_wildcard_admits_every_candidate(
        others in prop::collection::btree_set("[A-D][0-9]", 0..5),
        candidates in prop::collection::vec("[A-Z][0-9]{1,3}", 0..12),
    ) {
        let mut permitted: BTreeSet<String> = others;
        permitted.insert("*".to_string());
        let groups = PermittedGroups::from_groups(permitted);
        prop_assert_eq!(groups.filter_groups(candidates.iter().cloned()), candidates);
    }

    #[test]
    fn prop_interval_trigger_fires_repeat_count_plus_one_times(
        repeat_count in 0i32..50,
        interval_secs in 1u64..7200,
    ) {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let schedule = TriggerSchedule::interval(repeat_count, std::time::Duration::from_secs(interval_secs));
        let window_end = start + Duration::days(120);

        let times = schedule
            .fire_times_between(start, start, window_end, None, default_timezone())
            .unwrap();

        prop_assert_eq!(times.len(), repeat_count as usize + 1);
        for (n, fire_time) in times.iter().enumerate() {
            let expected = start + Duration::seconds(interval_secs as i64 * n as i64);
            prop_assert_eq!(*fire_time, expected);
        }
    }

    #[test]
    fn prop_indefinite_interval_next_fire_is_strictly_after(
        interval_secs in 1u64..86_400,
        offset_secs in 0i64..10_000_000,
    ) {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let schedule = TriggerSchedule::interval(
            REPEAT_INDEFINITELY,
            std::time::Duration::from_secs(interval_secs),
        );
        let previous = start + Duration::seconds(offset_secs);

        let next = schedule
            .fire_time_after(start, previous, None, default_timezone())
            .unwrap()
            .unwrap();

        prop_assert!(next > previous);
        prop_assert!(next - previous <= Duration::seconds(interval_secs as i64));
        prop_assert_eq!((next - start).num_seconds() % interval_secs as i64, 0);
    }
}
