//! Property-based tests for hyperhunt
//!
//! - Fingerprint invariants (key order, sensitivity, format, tagged values)
//! - Top-K ordering over leaderboard-style batches
//! - Search-space sampling stays inside its guidelines
//! - Run with ProptestConfig::with_cases(100)

use arrow::array::{Float64Array, Int32Array, RecordBatch};
use arrow::datatypes::{DataType, Field, Schema};
use hyperhunt::fingerprint::{fingerprint, ConfigValue, FINGERPRINT_LEN};
use hyperhunt::optimization::{Dimension, Guideline, SearchSpace};
use hyperhunt::topk::{SortOrder, TopKSelection};
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::BTreeMap;
use std::sync::Arc;

// ============================================================================
// Strategies
// ============================================================================

/// Config entries with unique keys
fn arb_entries() -> impl Strategy<Value = Vec<(String, i64)>> {
    proptest::collection::btree_map("[a-z_]{1,12}", any::<i64>(), 1..12)
        .prop_map(|m| m.into_iter().collect())
}

fn arb_record_batch(rows: usize) -> impl Strategy<Value = RecordBatch> {
    let schema = Arc::new(Schema::new(vec![
        Field::new("id", DataType::Int32, false),
        Field::new("value", DataType::Float64, false),
    ]));

    (
        proptest::collection::vec(0i32..10000, rows),
        proptest::collection::vec(0.0f64..1000.0, rows),
    )
        .prop_map(move |(ids, values)| {
            RecordBatch::try_new(
                schema.clone(),
                vec![Arc::new(Int32Array::from(ids)), Arc::new(Float64Array::from(values))],
            )
            .unwrap()
        })
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property: insertion order never changes the fingerprint
    #[test]
    fn prop_fingerprint_key_order_invariant(entries in arb_entries(), seed in any::<u64>()) {
        use rand::seq::SliceRandom;

        let mut shuffled = entries.clone();
        shuffled.shuffle(&mut StdRng::seed_from_u64(seed));

        let a = ConfigValue::map(entries.iter().cloned());
        let b = ConfigValue::map(shuffled);
        prop_assert_eq!(fingerprint(&a), fingerprint(&b));
    }

    /// Property: JSON text in any key order fingerprints like the typed value
    #[test]
    fn prop_fingerprint_json_matches_typed(entries in arb_entries()) {
        let body: Vec<String> = entries.iter().rev().map(|(k, v)| format!("\"{k}\": {v}")).collect();
        let json: serde_json::Value = serde_json::from_str(&format!("{{{}}}", body.join(", "))).unwrap();
        let typed = ConfigValue::map(entries.iter().cloned());
        prop_assert_eq!(fingerprint(&ConfigValue::from(json)), fingerprint(&typed));
    }

    /// Property: changing any single value changes the fingerprint
    #[test]
    fn prop_fingerprint_sensitive_to_values(entries in arb_entries(), index in any::<prop::sample::Index>()) {
        let original: BTreeMap<String, ConfigValue> =
            entries.iter().map(|(k, v)| (k.clone(), ConfigValue::Int(*v))).collect();
        let mut changed = original.clone();
        let (key, value) = &entries[index.index(entries.len())];
        changed.insert(key.clone(), ConfigValue::Int(value.wrapping_add(1)));

        prop_assert_ne!(
            fingerprint(&ConfigValue::Map(original)),
            fingerprint(&ConfigValue::Map(changed))
        );
    }

    /// Property: no string fingerprints like a callable or a non-finite float
    #[test]
    fn prop_strings_never_collide_with_tagged_values(
        identity in "[a-z_]{1,12}",
        text in prop_oneof![
            Just("NaN".to_string()),
            Just("inf".to_string()),
            Just("-inf".to_string()),
            "[a-z_<>:]{0,20}",
        ]
    ) {
        let as_str = fingerprint(&ConfigValue::from(text.as_str()));
        prop_assert_ne!(&as_str, &fingerprint(&ConfigValue::callable(identity.clone())));
        prop_assert_ne!(
            fingerprint(&ConfigValue::from(format!("<callable:{identity}>"))),
            fingerprint(&ConfigValue::callable(identity.clone()))
        );
        for special in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            prop_assert_ne!(&as_str, &fingerprint(&ConfigValue::Float(special)));
        }
        let forged = ConfigValue::map([("$callable", identity.as_str())]);
        prop_assert_ne!(fingerprint(&forged), fingerprint(&ConfigValue::callable(identity)));
    }

    /// Property: every fingerprint has the same length
    #[test]
    fn prop_fingerprint_fixed_length(entries in arb_entries()) {
        prop_assert_eq!(fingerprint(&ConfigValue::map(entries)).len(), FINGERPRINT_LEN);
    }

    /// Property: Top-K descending is monotonically decreasing and bounded by k
    #[test]
    fn prop_topk_descending_monotonic(batch in arb_record_batch(50), k in 1usize..60) {
        let result = batch.top_k(1, k, SortOrder::Descending).unwrap();
        prop_assert_eq!(result.num_rows(), k.min(batch.num_rows()));
        let values = result.column(1).as_any().downcast_ref::<Float64Array>().unwrap();
        for i in 0..values.len().saturating_sub(1) {
            prop_assert!(values.value(i) >= values.value(i + 1));
        }
    }

    /// Property: Top-1 ascending returns the minimum
    #[test]
    fn prop_top1_is_minimum(batch in arb_record_batch(50)) {
        let result = batch.top_k(1, 1, SortOrder::Ascending).unwrap();
        let best = result.column(1).as_any().downcast_ref::<Float64Array>().unwrap().value(0);
        let original = batch.column(1).as_any().downcast_ref::<Float64Array>().unwrap();
        for i in 0..original.len() {
            prop_assert!(best <= original.value(i));
        }
    }

    /// Property: sampled hyperparameters satisfy their guidelines and encode into the unit cube
    #[test]
    fn prop_space_samples_are_contained(
        low in -100.0f64..100.0,
        width in 0.001f64..50.0,
        int_low in -50i64..50,
        int_width in 0i64..20,
        seed in any::<u64>()
    ) {
        let space = SearchSpace::new([
            ("alpha", Guideline::from(Dimension::real(low, low + width).unwrap())),
            ("depth", Dimension::integer(int_low, int_low + int_width).unwrap().into()),
            ("kind", Dimension::categorical(vec!["a", "b", "c"]).unwrap().into()),
            ("fixed", Guideline::fixed(1)),
        ])
        .unwrap();
        let mut rng = StdRng::seed_from_u64(seed);
        for _ in 0..10 {
            let sample = space.sample(&mut rng);
            prop_assert!(space.contains(&sample));
            prop_assert!(space.encode(&sample).iter().all(|x| (0.0..=1.0).contains(x)));
        }
    }
}
