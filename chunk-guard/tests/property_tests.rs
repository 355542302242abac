//! Property-based tests for the engine's determinism guarantees.
//!
//! - Outcomes do not depend on how the file is cut into batches.
//! - Sample lists respect the cap and stay in scan order.
//! - Pass-one aggregates are reproducible across runs and partitionings.

mod common;

use arrow::array::{ArrayRef, Float64Array, StringArray};
use arrow::record_batch::RecordBatch;
use chunk_guard::batch::Batch;
use chunk_guard::condition::RowMask;
use chunk_guard::config::{RuleDescriptor, Settings};
use chunk_guard::core::{AggregateState, RuleContext, RuleKind, RuleOutcome, RuleRegistry};
use common::*;
use proptest::prelude::*;
use std::sync::Arc;

fn rules() -> Vec<RuleDescriptor> {
    vec![
        mandatory("status"),
        regex("status", "^[A-Z]+$"),
        unique("age"),
        outlier("score", "zscore"),
        outlier("score", "iqr"),
        RuleDescriptor::new("RangeCheck")
            .with_param("field", "age")
            .with_param("min", 18)
            .with_condition("status IS NOT NULL"),
        RuleDescriptor::new("RowCountRangeCheck")
            .with_param("max_rows", 100)
            .with_condition("NOT (status == 'ACTIVE') AND age < 40"),
    ]
}

fn rule_outcomes(batches: Vec<RecordBatch>, chunk_size: usize) -> Vec<RuleOutcome> {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let outcome = rt.block_on(run(batches, rules(), chunk_size));
    outcome.files[0].rules.clone()
}

/// Drives pass one of a statistical rule by hand.
fn aggregate(descriptor: &RuleDescriptor, batches: &[RecordBatch]) -> AggregateState {
    let registry = RuleRegistry::with_builtin();
    let RuleKind::Statistical(mut rule) = registry
        .create(descriptor, &RuleContext::new(10))
        .unwrap()
    else {
        panic!("{} is not statistical", descriptor.rule_type);
    };
    let columns: Vec<String> = batches[0]
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().clone())
        .collect();
    rule.init(&columns).unwrap();
    let mut offset = 0;
    for (sequence, data) in batches.iter().enumerate() {
        let batch = Batch::new(data.clone(), offset, sequence as u64);
        rule.pass_one_observe(&batch, &RowMask::all(batch.num_rows()))
            .unwrap();
        offset += data.num_rows() as u64;
    }
    rule.pass_one_finish().unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    /// Any partitioning and any chunk size give identical rule outcomes.
    #[test]
    fn test_batch_partition_invariance(
        rows in 1usize..400,
        lengths in prop::collection::vec(1usize..60, 0..12),
        chunk_size in 1usize..128,
    ) {
        let data = people(rows);
        let baseline = rule_outcomes(vec![data.clone()], rows);
        let partitioned = rule_outcomes(partition(&data, &lengths), chunk_size);
        prop_assert_eq!(baseline, partitioned);
    }

    /// Samples never exceed the cap, are strictly ascending and are the
    /// first failures in scan order.
    #[test]
    fn test_sample_cap_and_order(
        values in prop::collection::vec(prop::option::of("[a-z@.]{0,6}"), 1..300),
        cap in 0usize..8,
        chunk_size in 1usize..50,
    ) {
        let expected: Vec<u64> = values
            .iter()
            .enumerate()
            .filter(|(_, v)| v.as_deref().is_some_and(|v| !v.contains('@')))
            .map(|(i, _)| i as u64)
            .collect();

        let array: ArrayRef = Arc::new(StringArray::from(values.clone()));
        let data = RecordBatch::try_from_iter(vec![("email", array)]).unwrap();
        let settings = Settings::default()
            .with_chunk_size(chunk_size)
            .with_max_sample_failures(cap);
        let rt = tokio::runtime::Runtime::new().unwrap();
        let outcome = rt
            .block_on(
                memory_engine("data", vec![data])
                    .run(&job("data", vec![regex("email", "@")], settings)),
            )
            .unwrap();
        let rule = &outcome.files[0].rules[0];

        prop_assert_eq!(rule.failed_count, expected.len() as u64);
        prop_assert!(rule.samples.len() <= cap);
        let offsets: Vec<u64> = rule.samples.iter().map(|s| s.row_offset).collect();
        prop_assert!(offsets.windows(2).all(|w| w[0] < w[1]));
        prop_assert_eq!(&offsets[..], &expected[..expected.len().min(cap)]);
    }

    /// Pass one yields the same aggregate for the same data, however it is
    /// batched.
    #[test]
    fn test_statistical_aggregate_idempotence(
        values in prop::collection::vec(prop::option::of(-1e6f64..1e6), 1..600),
        lengths in prop::collection::vec(1usize..80, 0..10),
    ) {
        let array: ArrayRef = Arc::new(Float64Array::from(values));
        let data = RecordBatch::try_from_iter(vec![("amount", array)]).unwrap();
        let whole = vec![data.clone()];
        let parts = partition(&data, &lengths);

        for descriptor in [
            outlier("amount", "zscore"),
            outlier("amount", "iqr"),
            unique("amount"),
        ] {
            let first = aggregate(&descriptor, &whole);
            prop_assert_eq!(&first, &aggregate(&descriptor, &whole));
            prop_assert_eq!(&first, &aggregate(&descriptor, &parts));
        }
    }
}

#[test]
fn test_repeated_runs_are_identical() {
    let data = people(250);
    let first = rule_outcomes(partition(&data, &[33, 1, 90]), 17);
    let second = rule_outcomes(partition(&data, &[33, 1, 90]), 17);
    assert_eq!(first, second);
    assert!(first.iter().any(|r| !r.passed));
}
