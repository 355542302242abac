//! File-level row count rules: `EmptyFileCheck` and `RowCountRangeCheck`.
//!
//! Both count the rows their condition selects and decide once, at the end
//! of the scan. The failure is recorded against the file rather than a row,
//! and the row count is reported as the outcome's metric.

use crate::batch::Batch;
use crate::condition::RowMask;
use crate::config::RuleDescriptor;
use crate::core::{FailureSampler, RuleContext, RuleKind, RuleOutcome, StreamingRule};
use crate::error::{GuardError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RowBounds {
    NotEmpty,
    Range { min: Option<u64>, max: Option<u64> },
}

impl RowBounds {
    fn violation(&self, rows: u64) -> Option<String> {
        match *self {
            RowBounds::NotEmpty if rows == 0 => Some("file contains no rows".to_string()),
            RowBounds::NotEmpty => None,
            RowBounds::Range { min: Some(min), .. } if rows < min => {
                Some(format!("{rows} rows is fewer than the minimum {min}"))
            }
            RowBounds::Range { max: Some(max), .. } if rows > max => {
                Some(format!("{rows} rows is more than the maximum {max}"))
            }
            RowBounds::Range { .. } => None,
        }
    }
}

/// Counts selected rows and checks the total against bounds.
#[derive(Debug)]
pub struct RowCountRule {
    bounds: RowBounds,
    rows: u64,
    sampler: FailureSampler,
}

impl RowCountRule {
    fn new(bounds: RowBounds, context: &RuleContext) -> Self {
        Self {
            bounds,
            rows: 0,
            sampler: FailureSampler::new(context.max_sample_failures),
        }
    }
}

impl StreamingRule for RowCountRule {
    fn init(&mut self, _columns: &[String]) -> Result<()> {
        Ok(())
    }

    fn observe(&mut self, _batch: &Batch, mask: &RowMask) -> Result<()> {
        let selected = mask.selected_count() as u64;
        self.rows += selected;
        self.sampler.pass_many(selected);
        Ok(())
    }

    fn finish(mut self: Box<Self>) -> RuleOutcome {
        let rows = self.rows;
        let message = match self.bounds.violation(rows) {
            Some(reason) => {
                self.sampler.fail_file(reason.clone());
                reason
            }
            None => format!("File has {rows} rows"),
        };
        RuleOutcome::from_tally(self.sampler.finish(), message).with_metric(rows as f64)
    }
}

/// Factory for `EmptyFileCheck`.
pub fn empty_file(_descriptor: &RuleDescriptor, context: &RuleContext) -> Result<RuleKind> {
    Ok(RuleKind::Streaming(Box::new(RowCountRule::new(
        RowBounds::NotEmpty,
        context,
    ))))
}

/// Factory for `RowCountRangeCheck`.
pub fn row_count_range(descriptor: &RuleDescriptor, context: &RuleContext) -> Result<RuleKind> {
    let min = descriptor.opt_u64("min_rows")?;
    let max = descriptor.opt_u64("max_rows")?;
    match (min, max) {
        (None, None) => {
            return Err(GuardError::configuration(
                descriptor.location(),
                "RowCountRangeCheck needs 'min_rows', 'max_rows' or both",
            ))
        }
        (Some(min), Some(max)) if min > max => {
            return Err(GuardError::configuration(
                descriptor.location(),
                format!("min_rows {min} is greater than max_rows {max}"),
            ))
        }
        _ => {}
    }
    Ok(RuleKind::Streaming(Box::new(RowCountRule::new(
        RowBounds::Range { min, max },
        context,
    ))))
}
