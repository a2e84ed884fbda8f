use dash_converge::domain::models::{
    KeySet, RealizedKey, RealizedRecord, RealizedTable, ScenarioContext,
};
use dash_converge::services::{assert_attribute, eliminate};
use dash_converge::HarnessError;
use proptest::prelude::*;
use std::collections::BTreeMap;

fn oid(n: u32) -> RealizedKey {
    RealizedKey::new(format!("oid:0x{n:x}"))
}

proptest! {
    /// Property: elimination succeeds exactly when one unclaimed key remains
    #[test]
    fn prop_eliminate_needs_exactly_one_candidate(
        observed in prop::collection::btree_set(0u32..64, 0..12),
        claimed in prop::collection::btree_set(0u32..64, 0..12),
    ) {
        let observed: KeySet = observed.into_iter().map(oid).collect();
        let claimed: Vec<RealizedKey> = claimed.into_iter().map(oid).collect();
        let unclaimed: Vec<RealizedKey> = observed
            .iter()
            .filter(|k| !claimed.contains(k))
            .cloned()
            .collect();

        match eliminate(RealizedTable::MeterPolicy, &observed, &claimed) {
            Ok(key) => {
                prop_assert_eq!(unclaimed.len(), 1);
                prop_assert_eq!(&key, &unclaimed[0]);
                prop_assert!(!claimed.contains(&key));
            }
            Err(HarnessError::AmbiguousIdentity { candidates, .. }) => {
                prop_assert_ne!(unclaimed.len(), 1);
                if unclaimed.len() > 1 {
                    prop_assert_eq!(candidates, unclaimed);
                } else {
                    prop_assert!(candidates.is_empty());
                }
            }
            Err(other) => prop_assert!(false, "unexpected error: {}", other),
        }
    }

    /// Property: a claimed key never belongs to two intents
    #[test]
    fn prop_context_claims_are_exclusive(
        claims in prop::collection::vec((0usize..4, 0u32..6), 0..24),
    ) {
        let mut ctx = ScenarioContext::new();
        let mut owners: BTreeMap<RealizedKey, String> = BTreeMap::new();

        for (intent, key) in claims {
            let intent = format!("intent-{intent}");
            let key = oid(key);
            let result = ctx.claim(RealizedTable::MeterRule, intent.clone(), key.clone());
            let owner = owners
                .iter()
                .find(|(_, o)| **o == intent)
                .map(|(k, _)| k.clone());

            match owners.get(&key) {
                Some(existing) if *existing != intent => {
                    prop_assert!(
                        matches!(result, Err(HarnessError::IdentityConflict { .. })),
                        "expected conflict"
                    );
                }
                _ => {
                    prop_assert!(result.is_ok());
                    if let Some(previous) = owner {
                        owners.remove(&previous);
                    }
                    owners.insert(key, intent);
                }
            }
        }

        let claimed: Vec<RealizedKey> =
            ctx.claimed(RealizedTable::MeterRule).into_iter().cloned().collect();
        let expected: Vec<RealizedKey> = owners.keys().cloned().collect();
        prop_assert_eq!(claimed, expected);
    }

    /// Property: an attribute assertion passes only on an exact value match
    #[test]
    fn prop_assert_attribute_matches_exact_value(
        actual in "[0-9a-f]{1,8}",
        expected in "[0-9a-f]{1,8}",
    ) {
        let record = RealizedRecord {
            table: RealizedTable::Vnet,
            key: oid(1),
            attributes: [("SAI_VNET_ATTR_VNI".to_string(), actual.clone())].into(),
        };

        let result = assert_attribute(&record, "SAI_VNET_ATTR_VNI", &expected);
        prop_assert_eq!(result.is_ok(), actual == expected);

        let missing = assert_attribute(&record, "SAI_VNET_ATTR_GUID", &expected);
        let is_missing = matches!(missing, Err(HarnessError::MissingAttribute { .. }));
        prop_assert!(is_missing);
    }
}
