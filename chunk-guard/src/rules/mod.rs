//! Built-in rules.
//!
//! Most rules look at one field, one cell at a time. They implement
//! [`CellCheck`] and run inside [`CellRule`], which handles column lookup,
//! the condition mask, null skipping and sampling. File-level and two-pass
//! rules implement the rule traits directly.

pub mod date_format;
pub mod length;
pub mod mandatory;
pub mod outlier;
pub mod pattern;
pub mod range;
pub mod reference;
pub mod row_count;
pub mod uniqueness;
pub mod values;

use crate::batch::{Batch, CellValue};
use crate::condition::RowMask;
use crate::config::RuleDescriptor;
use crate::core::{
    FailureSampler, RuleContext, RuleKind, RuleOutcome, RuleRegistry, StreamingRule,
};
use crate::error::{ErrorLocation, GuardError, Result};
use std::borrow::Cow;

/// Adds every built-in rule type to `registry`.
pub fn register_builtin(registry: &mut RuleRegistry) {
    registry
        .register("MandatoryFieldCheck", mandatory::create)
        .register("RegexCheck", pattern::create)
        .register("RangeCheck", range::create)
        .register("ValidValuesCheck", values::create)
        .register("StringLengthCheck", length::create)
        .register("DateFormatCheck", date_format::create)
        .register("EmptyFileCheck", row_count::empty_file)
        .register("RowCountRangeCheck", row_count::row_count_range)
        .register("ReferentialIntegrityCheck", reference::referential_integrity)
        .register("CrossFileDuplicateCheck", reference::cross_file_duplicate)
        .register("UniqueKeyCheck", uniqueness::create)
        .register("StatisticalOutlierCheck", outlier::create);
}

/// A per-cell predicate.
pub trait CellCheck: Send {
    /// What a rejected value violated. Built for every failing row, so it
    /// should not allocate.
    type Violation;

    /// Returns the violation, or `None` if the value is acceptable.
    fn check(&self, value: &CellValue<'_>) -> Option<Self::Violation>;

    /// Failure reason for a sampled row.
    fn reason(&self, violation: Self::Violation, value: &CellValue<'_>) -> String;

    /// Whether null cells are checked. When false they are skipped and not
    /// counted.
    fn checks_nulls(&self) -> bool {
        false
    }

    /// What the check expects, for outcome messages.
    fn describe(&self) -> String;
}

/// Runs a [`CellCheck`] over one field as a streaming rule.
pub struct CellRule<C> {
    field: String,
    check: C,
    sampler: FailureSampler,
    location: ErrorLocation,
}

impl<C: CellCheck> CellRule<C> {
    /// Wraps `check` for the descriptor's field.
    pub fn new(descriptor: &RuleDescriptor, context: &RuleContext, check: C) -> Result<Self> {
        let field = descriptor.required_field()?.to_string();
        Ok(Self {
            sampler: FailureSampler::new(context.max_sample_failures).with_field(&field),
            location: descriptor.location(),
            field,
            check,
        })
    }

    /// Boxes the rule for the registry.
    pub fn into_kind(self) -> RuleKind
    where
        C: 'static,
    {
        RuleKind::Streaming(Box::new(self))
    }
}

impl<C: CellCheck> StreamingRule for CellRule<C> {
    fn init(&mut self, columns: &[String]) -> Result<()> {
        require_columns(columns, [self.field.as_str()], &self.location)
    }

    fn observe(&mut self, batch: &Batch, mask: &RowMask) -> Result<()> {
        let column = batch
            .column(&self.field)
            .ok_or_else(|| missing_column(&self.field, batch, &self.location))?;
        for row in mask.iter_selected() {
            let value = column.value(row);
            if value.is_null() && !self.check.checks_nulls() {
                continue;
            }
            match self.check.check(&value) {
                None => self.sampler.pass(),
                Some(violation) => {
                    let check = &self.check;
                    self.sampler.fail(batch.absolute_row(row), &value, || {
                        check.reason(violation, &value)
                    })
                }
            }
        }
        Ok(())
    }

    fn finish(self: Box<Self>) -> RuleOutcome {
        let expectation = self.check.describe();
        let tally = self.sampler.finish();
        let message = summary(&self.field, tally.failed_count, tally.total_count, &expectation);
        RuleOutcome::from_tally(tally, message).with_field(self.field)
    }
}

/// Fails with a data-shape error unless every field is among `columns`.
pub(crate) fn require_columns<'a>(
    columns: &[String],
    fields: impl IntoIterator<Item = &'a str>,
    location: &ErrorLocation,
) -> Result<()> {
    for field in fields {
        if !columns.iter().any(|c| c == field) {
            return Err(GuardError::data_shape(
                location.clone().with_field(field),
                format!("column '{field}' not found"),
            ));
        }
    }
    Ok(())
}

pub(crate) fn missing_column(field: &str, batch: &Batch, location: &ErrorLocation) -> GuardError {
    GuardError::data_shape(
        location.clone().with_field(field),
        format!(
            "column '{field}' missing from batch {} (row offset {})",
            batch.sequence(),
            batch.row_offset()
        ),
    )
}

/// Text of a cell, borrowed for text cells; `None` for nulls.
pub(crate) fn cell_text<'v>(value: &'v CellValue<'_>) -> Option<Cow<'v, str>> {
    match value {
        CellValue::Null => None,
        CellValue::Text(text) => Some(Cow::Borrowed(text.as_ref())),
        other => Some(Cow::Owned(other.to_string())),
    }
}

pub(crate) fn summary(field: &str, failed: u64, total: u64, expectation: &str) -> String {
    if failed == 0 {
        format!("All {total} checked values of '{field}' passed (expected {expectation})")
    } else {
        format!("{failed} of {total} values of '{field}' failed: expected {expectation}")
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Helpers for driving rules without the engine.

    use super::*;
    use crate::core::{AggregateState, StatisticalRule};
    use arrow::record_batch::RecordBatch;

    pub fn context() -> RuleContext {
        RuleContext::new(100)
    }

    pub fn streaming(kind: RuleKind) -> Box<dyn StreamingRule> {
        match kind {
            RuleKind::Streaming(rule) => rule,
            other => panic!("expected a streaming rule, got {other:?}"),
        }
    }

    pub fn statistical(kind: RuleKind) -> Box<dyn StatisticalRule> {
        match kind {
            RuleKind::Statistical(rule) => rule,
            other => panic!("expected a statistical rule, got {other:?}"),
        }
    }

    /// Runs a streaming rule over `batches`, every row selected.
    pub fn run_streaming(kind: RuleKind, batches: &[RecordBatch]) -> RuleOutcome {
        let mut rule = streaming(kind);
        let columns = column_names(batches);
        rule.init(&columns).unwrap();
        for batch in positioned(batches) {
            rule.observe(&batch, &RowMask::all(batch.num_rows())).unwrap();
        }
        rule.finish()
    }

    /// Runs both passes of a statistical rule over `batches`.
    pub fn run_statistical(kind: RuleKind, batches: &[RecordBatch]) -> (AggregateState, RuleOutcome) {
        let mut rule = statistical(kind);
        let columns = column_names(batches);
        rule.init(&columns).unwrap();
        for batch in positioned(batches) {
            rule.pass_one_observe(&batch, &RowMask::all(batch.num_rows()))
                .unwrap();
        }
        let aggregate = rule.pass_one_finish().unwrap();
        for batch in positioned(batches) {
            rule.pass_two_observe(&batch, &RowMask::all(batch.num_rows()), &aggregate)
                .unwrap();
        }
        (aggregate, rule.pass_two_finish())
    }

    fn column_names(batches: &[RecordBatch]) -> Vec<String> {
        batches
            .first()
            .map(|b| b.schema().fields().iter().map(|f| f.name().clone()).collect())
            .unwrap_or_default()
    }

    fn positioned(batches: &[RecordBatch]) -> Vec<Batch> {
        let mut offset = 0;
        batches
            .iter()
            .enumerate()
            .map(|(i, b)| {
                let batch = Batch::new(b.clone(), offset, i as u64);
                offset += b.num_rows() as u64;
                batch
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::run_streaming;
    use super::*;
    use arrow::array::{ArrayRef, Int64Array};
    use arrow::record_batch::RecordBatch;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Rejects every value and counts how often a reason is rendered.
    struct RejectAll {
        reasons: Arc<AtomicUsize>,
    }

    impl CellCheck for RejectAll {
        type Violation = ();

        fn check(&self, _value: &CellValue<'_>) -> Option<()> {
            Some(())
        }

        fn reason(&self, _violation: (), value: &CellValue<'_>) -> String {
            self.reasons.fetch_add(1, Ordering::SeqCst);
            format!("'{value}' rejected")
        }

        fn describe(&self) -> String {
            "nothing".to_string()
        }
    }

    #[test]
    fn test_reasons_are_built_only_for_kept_samples() {
        let reasons = Arc::new(AtomicUsize::new(0));
        let descriptor = RuleDescriptor::new("RejectAll").with_param("field", "id");
        let rule = CellRule::new(
            &descriptor,
            &RuleContext::new(3),
            RejectAll {
                reasons: Arc::clone(&reasons),
            },
        )
        .unwrap();
        let ids: ArrayRef = Arc::new(Int64Array::from((0..50).collect::<Vec<i64>>()));
        let batches = vec![
            RecordBatch::try_from_iter(vec![("id", ids.clone())]).unwrap(),
            RecordBatch::try_from_iter(vec![("id", ids)]).unwrap(),
        ];

        let outcome = run_streaming(rule.into_kind(), &batches);
        assert_eq!(outcome.failed_count, 100);
        assert_eq!(outcome.samples.len(), 3);
        assert_eq!(outcome.samples[2].reason, "'2' rejected");
        assert_eq!(reasons.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_cell_text_borrows_text_cells() {
        let text = CellValue::Text(Cow::Borrowed("abc"));
        assert!(matches!(cell_text(&text), Some(Cow::Borrowed("abc"))));
        assert_eq!(cell_text(&CellValue::Float(1.0)).as_deref(), Some("1"));
        assert_eq!(cell_text(&CellValue::Null), None);
    }
}
