//! Shared fixtures for integration tests.
#![allow(dead_code)]

use arrow::array::{ArrayRef, Float64Array, Int64Array, StringArray};
use arrow::record_batch::RecordBatch;
use chunk_guard::config::{FileSpec, JobSpec, RuleDescriptor, Settings};
use chunk_guard::core::{JobOutcome, ValidationEngine};
use chunk_guard::sources::{MemoryLoader, MemorySource};
use std::sync::Arc;

pub const EMAIL_PATTERN: &str = r"^[^@]+@[^@]+\.[^@]+$";

/// The five-row customer file: one null email, one malformed email and a
/// repeated id.
pub fn customers() -> RecordBatch {
    RecordBatch::try_from_iter(vec![
        (
            "id",
            Arc::new(Int64Array::from(vec![1, 2, 3, 1, 5])) as ArrayRef,
        ),
        (
            "email",
            Arc::new(StringArray::from(vec![
                Some("a@b.com"),
                None,
                Some("bad"),
                Some("a@b.com"),
                Some("c@d.com"),
            ])) as ArrayRef,
        ),
    ])
    .unwrap()
}

/// People with an age, a status (sometimes null) and a score.
pub fn people(rows: usize) -> RecordBatch {
    let statuses = ["ACTIVE", "INACTIVE", "active"];
    let ages: Vec<i64> = (0..rows).map(|i| (i as i64 * 7) % 90).collect();
    let status: Vec<Option<&str>> = (0..rows)
        .map(|i| (i % 5 != 4).then(|| statuses[i % statuses.len()]))
        .collect();
    let score: Vec<Option<f64>> = (0..rows)
        .map(|i| match i {
            i if i % 11 == 10 => None,
            i if i % 97 == 50 => Some(1_000.0),
            i => Some(50.0 + (i % 13) as f64),
        })
        .collect();
    RecordBatch::try_from_iter(vec![
        ("age", Arc::new(Int64Array::from(ages)) as ArrayRef),
        ("status", Arc::new(StringArray::from(status)) as ArrayRef),
        ("score", Arc::new(Float64Array::from(score)) as ArrayRef),
    ])
    .unwrap()
}

/// Cuts `batch` into consecutive slices of the given lengths, then the rest.
pub fn partition(batch: &RecordBatch, lengths: &[usize]) -> Vec<RecordBatch> {
    let mut parts = Vec::new();
    let mut start = 0;
    for &len in lengths {
        if start >= batch.num_rows() {
            break;
        }
        let len = len.min(batch.num_rows() - start);
        parts.push(batch.slice(start, len));
        start += len;
    }
    if start < batch.num_rows() {
        parts.push(batch.slice(start, batch.num_rows() - start));
    }
    parts
}

/// An engine reading `batches` from memory under `path`.
pub fn memory_engine(path: &str, batches: Vec<RecordBatch>) -> ValidationEngine {
    let loader = MemoryLoader::new().with_source(
        path,
        MemorySource::try_from_batches(path, batches).unwrap(),
    );
    ValidationEngine::new(Arc::new(loader))
}

/// A one-file job.
pub fn job(path: &str, rules: Vec<RuleDescriptor>, settings: Settings) -> JobSpec {
    let file = rules
        .into_iter()
        .fold(FileSpec::new(path), |file, rule| file.with_rule(rule));
    JobSpec::new("test").with_file(file).with_settings(settings)
}

/// Runs `rules` over `batches` with the given chunk size.
pub async fn run(
    batches: Vec<RecordBatch>,
    rules: Vec<RuleDescriptor>,
    chunk_size: usize,
) -> JobOutcome {
    let settings = Settings::default().with_chunk_size(chunk_size);
    memory_engine("data", batches)
        .run(&job("data", rules, settings))
        .await
        .unwrap()
}

pub fn mandatory(field: &str) -> RuleDescriptor {
    RuleDescriptor::new("MandatoryFieldCheck").with_param("field", field)
}

pub fn regex(field: &str, pattern: &str) -> RuleDescriptor {
    RuleDescriptor::new("RegexCheck")
        .with_param("field", field)
        .with_param("pattern", pattern)
}

pub fn unique(field: &str) -> RuleDescriptor {
    RuleDescriptor::new("UniqueKeyCheck").with_param("field", field)
}

pub fn outlier(field: &str, method: &str) -> RuleDescriptor {
    RuleDescriptor::new("StatisticalOutlierCheck")
        .with_param("field", field)
        .with_param("method", method)
}
