//! The contract every validation rule implements.
//!
//! Rules come in two shapes:
//!
//! - [`StreamingRule`]s decide row by row in a single pass.
//! - [`StatisticalRule`]s need a global aggregate first. Pass one builds an
//!   [`AggregateState`]; pass two re-reads the data and flags rows against it.
//!
//! Rules receive each batch by reference together with the row mask of their
//! condition. They must not hold on to the batch after the call returns, and
//! their own state must stay bounded (counters, samples, sketches), never
//! proportional to the number of rows in the file.

use super::outcome::RuleOutcome;
use crate::batch::Batch;
use crate::condition::RowMask;
use crate::error::Result;
use crate::stats::Moments;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A single-pass rule.
pub trait StreamingRule: Send {
    /// Called once with the file's columns before any batch.
    fn init(&mut self, columns: &[String]) -> Result<()>;

    /// Looks at the selected rows of one batch.
    fn observe(&mut self, batch: &Batch, mask: &RowMask) -> Result<()>;

    /// Produces the terminal outcome.
    fn finish(self: Box<Self>) -> RuleOutcome;
}

/// A two-pass rule.
pub trait StatisticalRule: Send {
    /// Called once with the file's columns before any batch.
    fn init(&mut self, columns: &[String]) -> Result<()>;

    /// Accumulates one batch into the aggregate.
    fn pass_one_observe(&mut self, batch: &Batch, mask: &RowMask) -> Result<()>;

    /// Seals the aggregate after the last batch of pass one.
    fn pass_one_finish(&mut self) -> Result<AggregateState>;

    /// Flags rows of one batch against the sealed aggregate.
    fn pass_two_observe(
        &mut self,
        batch: &Batch,
        mask: &RowMask,
        aggregate: &AggregateState,
    ) -> Result<()>;

    /// Produces the terminal outcome.
    fn pass_two_finish(self: Box<Self>) -> RuleOutcome;
}

/// A constructed rule, ready to run.
pub enum RuleKind {
    Streaming(Box<dyn StreamingRule>),
    Statistical(Box<dyn StatisticalRule>),
}

impl RuleKind {
    /// Returns true for two-pass rules.
    pub fn is_statistical(&self) -> bool {
        matches!(self, RuleKind::Statistical(_))
    }
}

impl std::fmt::Debug for RuleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RuleKind::Streaming(_) => f.write_str("RuleKind::Streaming"),
            RuleKind::Statistical(_) => f.write_str("RuleKind::Statistical"),
        }
    }
}

/// Quantile edges read off a sketch at the end of pass one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuantileSummary {
    /// Values that went into the sketch
    pub count: u64,
    /// `(phi, value)` pairs in ascending `phi`
    pub edges: Vec<(f64, f64)>,
}

impl QuantileSummary {
    /// The value recorded for `phi`, if it was requested from the sketch.
    pub fn quantile(&self, phi: f64) -> Option<f64> {
        self.edges
            .iter()
            .find(|(p, _)| (*p - phi).abs() < f64::EPSILON)
            .map(|(_, v)| *v)
    }
}

/// Keys seen more than once, stored as 128-bit digests.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DuplicateKeys {
    /// Rows with a complete key
    pub keyed_rows: u64,
    /// Distinct complete keys
    pub distinct_keys: u64,
    /// Digests of keys with more than one occurrence
    pub duplicates: BTreeSet<u128>,
}

impl DuplicateKeys {
    /// Returns true if `digest` belongs to a repeated key.
    pub fn contains(&self, digest: u128) -> bool {
        self.duplicates.contains(&digest)
    }
}

/// The global aggregate handed from pass one to pass two.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AggregateState {
    Moments(Moments),
    Quantiles(QuantileSummary),
    DuplicateKeys(DuplicateKeys),
}

impl AggregateState {
    /// Number of values the aggregate was built from.
    pub fn count(&self) -> u64 {
        match self {
            AggregateState::Moments(m) => m.count,
            AggregateState::Quantiles(q) => q.count,
            AggregateState::DuplicateKeys(d) => d.keyed_rows,
        }
    }
}
