//! Bounded collection of failing rows.

use super::outcome::SampleFailure;
use crate::batch::CellValue;

/// Counts checked and failing rows, keeping the first `cap` failures.
///
/// Rows must be reported in scan order. The retained samples are then the
/// first failures encountered and are strictly ascending by row offset.
///
/// # Examples
///
/// ```rust
/// use chunk_guard::batch::CellValue;
/// use chunk_guard::core::FailureSampler;
///
/// let mut sampler = FailureSampler::new(2).with_field("email");
/// sampler.pass();
/// for row in 1..5 {
///     sampler.fail(row, &CellValue::Null, || "value is null".to_string());
/// }
///
/// let tally = sampler.finish();
/// assert_eq!(tally.failed_count, 4);
/// assert_eq!(tally.total_count, 5);
/// assert_eq!(tally.samples.len(), 2);
/// assert_eq!(tally.samples[1].row_offset, 2);
/// ```
#[derive(Debug, Clone)]
pub struct FailureSampler {
    cap: usize,
    field: Option<String>,
    samples: Vec<SampleFailure>,
    failed_count: u64,
    total_count: u64,
}

impl FailureSampler {
    /// Creates a sampler that keeps at most `cap` samples.
    pub fn new(cap: usize) -> Self {
        Self {
            cap,
            field: None,
            samples: Vec::with_capacity(cap.min(128)),
            failed_count: 0,
            total_count: 0,
        }
    }

    /// Sets the field name recorded on every sample.
    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    /// Records a row that passed.
    pub fn pass(&mut self) {
        self.total_count += 1;
    }

    /// Records `rows` checked rows that all passed.
    pub fn pass_many(&mut self, rows: u64) {
        self.total_count += rows;
    }

    /// Records a failing row. `reason` is only called while there is room
    /// for another sample.
    pub fn fail<F>(&mut self, row_offset: u64, value: &CellValue<'_>, reason: F)
    where
        F: FnOnce() -> String,
    {
        self.total_count += 1;
        self.failed_count += 1;
        if self.samples.len() < self.cap {
            debug_assert!(
                self.samples
                    .last()
                    .is_none_or(|last| last.row_offset < row_offset),
                "failures must be reported in scan order"
            );
            self.samples.push(SampleFailure {
                row_offset,
                field: self.field.clone(),
                value: value.key_string(),
                reason: reason(),
            });
        }
    }

    /// Records a failure that is not tied to a row, such as an empty file.
    pub fn fail_file(&mut self, reason: impl Into<String>) {
        self.failed_count += 1;
        if self.samples.len() < self.cap {
            self.samples.push(SampleFailure {
                row_offset: 0,
                field: self.field.clone(),
                value: None,
                reason: reason.into(),
            });
        }
    }

    /// Failures recorded so far.
    pub fn failed_count(&self) -> u64 {
        self.failed_count
    }

    /// Rows checked so far.
    pub fn total_count(&self) -> u64 {
        self.total_count
    }

    /// Stops sampling and returns the counts.
    pub fn finish(self) -> FailureTally {
        FailureTally {
            failed_count: self.failed_count,
            total_count: self.total_count,
            samples: self.samples,
        }
    }
}

/// The counts and samples collected by a [`FailureSampler`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FailureTally {
    /// Failing rows
    pub failed_count: u64,
    /// Checked rows
    pub total_count: u64,
    /// First failures in scan order
    pub samples: Vec<SampleFailure>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::borrow::Cow;

    #[test]
    fn test_reason_not_built_once_full() {
        let mut sampler = FailureSampler::new(1);
        sampler.fail(3, &CellValue::Int(7), || "first".to_string());
        sampler.fail(9, &CellValue::Int(8), || panic!("reason built past the cap"));

        let tally = sampler.finish();
        assert_eq!(tally.failed_count, 2);
        assert_eq!(tally.samples.len(), 1);
        assert_eq!(tally.samples[0].value.as_deref(), Some("7"));
        assert_eq!(tally.samples[0].field, None);
    }

    #[test]
    fn test_zero_cap_still_counts() {
        let mut sampler = FailureSampler::new(0).with_field("name");
        sampler.fail(0, &CellValue::Text(Cow::Borrowed("x")), || "bad".to_string());
        sampler.pass_many(4);

        let tally = sampler.finish();
        assert_eq!(tally.failed_count, 1);
        assert_eq!(tally.total_count, 5);
        assert!(tally.samples.is_empty());
    }

    #[test]
    fn test_file_level_failure_is_not_a_row() {
        let mut sampler = FailureSampler::new(10);
        sampler.fail_file("file contains no rows");
        let tally = sampler.finish();
        assert_eq!(tally.failed_count, 1);
        assert_eq!(tally.total_count, 0);
        assert_eq!(tally.samples[0].value, None);
    }
}
