//! `StatisticalOutlierCheck`: numeric values far from the bulk of the column.
//!
//! Two methods are supported:
//!
//! - `zscore` flags values outside `mean ± threshold·σ` (population σ,
//!   default threshold 3.0).
//! - `iqr` flags values outside `[Q1 − threshold·IQR, Q3 + threshold·IQR]`
//!   with quartiles from a [`KllSketch`] (default threshold 1.5).
//!
//! Nulls and values that are not numbers are ignored in both passes. A column
//! with no numeric values passes unless `fail_on_empty` is set.

use super::{missing_column, require_columns, summary};
use crate::batch::Batch;
use crate::condition::RowMask;
use crate::config::RuleDescriptor;
use crate::core::{
    AggregateState, FailureSampler, QuantileSummary, RuleContext, RuleKind, RuleOutcome,
    StatisticalRule,
};
use crate::error::{ErrorLocation, GuardError, Result};
use crate::stats::{kll_sketch::DEFAULT_K, KllSketch, Moments};
use std::fmt;

const LOWER_QUARTILE: f64 = 0.25;
const UPPER_QUARTILE: f64 = 0.75;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutlierMethod {
    ZScore,
    Iqr,
}

impl OutlierMethod {
    fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "zscore" | "z-score" | "z_score" => Some(OutlierMethod::ZScore),
            "iqr" => Some(OutlierMethod::Iqr),
            _ => None,
        }
    }

    fn default_threshold(&self) -> f64 {
        match self {
            OutlierMethod::ZScore => 3.0,
            OutlierMethod::Iqr => 1.5,
        }
    }
}

impl fmt::Display for OutlierMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutlierMethod::ZScore => f.write_str("zscore"),
            OutlierMethod::Iqr => f.write_str("iqr"),
        }
    }
}

/// Inclusive acceptance interval plus the spread it was derived from.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Fences {
    low: f64,
    high: f64,
    spread: f64,
}

#[derive(Debug)]
pub struct OutlierRule {
    field: String,
    method: OutlierMethod,
    threshold: f64,
    fail_on_empty: bool,
    location: ErrorLocation,
    moments: Moments,
    sketch: Option<KllSketch>,
    fences: Option<Fences>,
    sampler: FailureSampler,
}

impl OutlierRule {
    pub fn new(
        field: impl Into<String>,
        method: OutlierMethod,
        threshold: f64,
        location: ErrorLocation,
        context: &RuleContext,
    ) -> Self {
        let field = field.into();
        Self {
            sampler: FailureSampler::new(context.max_sample_failures).with_field(&field),
            sketch: (method == OutlierMethod::Iqr).then(|| KllSketch::new(DEFAULT_K)),
            field,
            method,
            threshold,
            fail_on_empty: false,
            location,
            moments: Moments::new(),
            fences: None,
        }
    }

    pub fn with_fail_on_empty(mut self, enabled: bool) -> Self {
        self.fail_on_empty = enabled;
        self
    }

    fn fences(&self, aggregate: &AggregateState) -> Result<Option<Fences>> {
        match (self.method, aggregate) {
            (OutlierMethod::ZScore, AggregateState::Moments(moments)) => {
                Ok(moments.population_std_dev().map(|sigma| Fences {
                    low: moments.mean - self.threshold * sigma,
                    high: moments.mean + self.threshold * sigma,
                    spread: sigma,
                }))
            }
            (OutlierMethod::Iqr, AggregateState::Quantiles(summary)) => {
                let (Some(q1), Some(q3)) = (
                    summary.quantile(LOWER_QUARTILE),
                    summary.quantile(UPPER_QUARTILE),
                ) else {
                    return Ok(None);
                };
                let iqr = q3 - q1;
                Ok(Some(Fences {
                    low: q1 - self.threshold * iqr,
                    high: q3 + self.threshold * iqr,
                    spread: iqr,
                }))
            }
            (method, other) => Err(GuardError::Internal(format!(
                "StatisticalOutlierCheck ({method}) cannot use aggregate {other:?}"
            ))),
        }
    }
}

impl StatisticalRule for OutlierRule {
    fn init(&mut self, columns: &[String]) -> Result<()> {
        require_columns(columns, [self.field.as_str()], &self.location)
    }

    fn pass_one_observe(&mut self, batch: &Batch, mask: &RowMask) -> Result<()> {
        let column = batch
            .column(&self.field)
            .ok_or_else(|| missing_column(&self.field, batch, &self.location))?;
        for row in mask.iter_selected() {
            match column.value(row).parse_f64() {
                Some(value) if value.is_finite() => {
                    self.moments.update(value);
                    if let Some(sketch) = self.sketch.as_mut() {
                        sketch.update(value);
                    }
                }
                _ => self.moments.update_null(),
            }
        }
        Ok(())
    }

    fn pass_one_finish(&mut self) -> Result<AggregateState> {
        match self.sketch.take() {
            None => Ok(AggregateState::Moments(self.moments.clone())),
            Some(sketch) => {
                let edges = if sketch.is_empty() {
                    Vec::new()
                } else {
                    vec![
                        (LOWER_QUARTILE, sketch.quantile(LOWER_QUARTILE)?),
                        (UPPER_QUARTILE, sketch.quantile(UPPER_QUARTILE)?),
                    ]
                };
                Ok(AggregateState::Quantiles(QuantileSummary {
                    count: sketch.count(),
                    edges,
                }))
            }
        }
    }

    fn pass_two_observe(
        &mut self,
        batch: &Batch,
        mask: &RowMask,
        aggregate: &AggregateState,
    ) -> Result<()> {
        if self.fences.is_none() {
            self.fences = self.fences(aggregate)?;
        }
        let Some(fences) = self.fences else {
            return Ok(());
        };
        let column = batch
            .column(&self.field)
            .ok_or_else(|| missing_column(&self.field, batch, &self.location))?;
        for row in mask.iter_selected() {
            let cell = column.value(row);
            let Some(value) = cell.parse_f64().filter(|v| v.is_finite()) else {
                continue;
            };
            if value < fences.low || value > fences.high {
                self.sampler.fail(batch.absolute_row(row), &cell, || {
                    format!(
                        "{value} is outside [{:.4}, {:.4}] ({} threshold {})",
                        fences.low, fences.high, self.method, self.threshold
                    )
                });
            } else {
                self.sampler.pass();
            }
        }
        Ok(())
    }

    fn pass_two_finish(mut self: Box<Self>) -> RuleOutcome {
        if self.moments.count == 0 {
            let message = format!("No numeric values in '{}'", self.field);
            if self.fail_on_empty {
                self.sampler.fail_file(message.clone());
            }
            return RuleOutcome::from_tally(self.sampler.finish(), message)
                .with_field(self.field);
        }

        let expectation = match self.fences {
            Some(fences) => format!("a value within [{:.4}, {:.4}]", fences.low, fences.high),
            None => "a value within the fences".to_string(),
        };
        let spread = self.fences.map(|f| f.spread);
        let tally = self.sampler.finish();
        let message = summary(&self.field, tally.failed_count, tally.total_count, &expectation);
        let outcome = RuleOutcome::from_tally(tally, message).with_field(self.field);
        match spread {
            Some(spread) => outcome.with_metric(spread),
            None => outcome,
        }
    }
}

pub fn create(descriptor: &RuleDescriptor, context: &RuleContext) -> Result<RuleKind> {
    let field = descriptor.required_field()?;
    let method = match descriptor.opt_str("method")? {
        None => OutlierMethod::ZScore,
        Some(name) => OutlierMethod::parse(name).ok_or_else(|| {
            GuardError::configuration(
                descriptor.location(),
                format!("unknown outlier method '{name}' (expected zscore or iqr)"),
            )
        })?,
    };
    let threshold = descriptor
        .opt_f64("threshold")?
        .unwrap_or_else(|| method.default_threshold());
    if !threshold.is_finite() || threshold <= 0.0 {
        return Err(GuardError::configuration(
            descriptor.location(),
            format!("threshold must be a positive number, got {threshold}"),
        ));
    }
    let rule = OutlierRule::new(field, method, threshold, descriptor.location(), context)
        .with_fail_on_empty(descriptor.param_bool_or("fail_on_empty", false)?);
    Ok(RuleKind::Statistical(Box::new(rule)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::test_support::{context, run_statistical};
    use arrow::array::{ArrayRef, Float64Array};
    use arrow::record_batch::RecordBatch;
    use std::sync::Arc;

    fn values(chunks: &[&[Option<f64>]]) -> Vec<RecordBatch> {
        chunks
            .iter()
            .map(|chunk| {
                let array: ArrayRef = Arc::new(Float64Array::from(chunk.to_vec()));
                RecordBatch::try_from_iter(vec![("amount", array)]).unwrap()
            })
            .collect()
    }

    fn readings() -> Vec<RecordBatch> {
        let mut first: Vec<Option<f64>> = (0..20).map(|i| Some(10.0 + (i % 3) as f64)).collect();
        first.push(None);
        let second = vec![Some(11.0), Some(500.0), Some(10.0)];
        values(&[&first, &second])
    }

    #[test]
    fn test_zscore_flags_far_values() {
        let descriptor = RuleDescriptor::new("StatisticalOutlierCheck")
            .with_param("field", "amount")
            .with_param("threshold", 3.0);
        let (aggregate, outcome) =
            run_statistical(create(&descriptor, &context()).unwrap(), &readings());

        let AggregateState::Moments(moments) = aggregate else {
            panic!("expected moments");
        };
        assert_eq!(moments.count, 23);
        assert_eq!(moments.null_count, 1);

        assert_eq!(outcome.failed_count, 1);
        assert_eq!(outcome.total_count, 23);
        assert_eq!(outcome.samples[0].row_offset, 22);
        assert!(outcome.metric.is_some());
    }

    #[test]
    fn test_iqr_uses_quartiles() {
        let descriptor = RuleDescriptor::new("StatisticalOutlierCheck")
            .with_param("field", "amount")
            .with_param("method", "iqr");
        let (aggregate, outcome) =
            run_statistical(create(&descriptor, &context()).unwrap(), &readings());

        let AggregateState::Quantiles(summary) = aggregate else {
            panic!("expected quantiles");
        };
        assert_eq!(summary.count, 23);
        assert_eq!(summary.quantile(0.25), Some(10.0));
        assert_eq!(summary.quantile(0.75), Some(12.0));

        // Fences are [7, 15].
        assert_eq!(outcome.failed_count, 1);
        assert_eq!(outcome.samples[0].value.as_deref(), Some("500"));
        assert_eq!(outcome.metric, Some(2.0));
    }

    #[test]
    fn test_empty_column() {
        let batches = values(&[&[None, None]]);
        let descriptor = RuleDescriptor::new("StatisticalOutlierCheck").with_param("field", "amount");
        let (_, outcome) = run_statistical(create(&descriptor, &context()).unwrap(), &batches);
        assert!(outcome.passed);
        assert_eq!(outcome.total_count, 0);

        let strict = descriptor.with_param("fail_on_empty", true);
        let (_, outcome) = run_statistical(create(&strict, &context()).unwrap(), &batches);
        assert!(!outcome.passed);
        assert_eq!(outcome.failed_count, 1);
    }

    #[test]
    fn test_invalid_parameters() {
        let base = RuleDescriptor::new("StatisticalOutlierCheck").with_param("field", "amount");
        assert!(create(&base.clone().with_param("method", "mad"), &context()).is_err());
        assert!(create(&base.with_param("threshold", -1.0), &context()).is_err());
    }
}
