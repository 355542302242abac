//! `RangeCheck`: numeric values within inclusive bounds.

use super::{CellCheck, CellRule};
use crate::batch::CellValue;
use crate::config::RuleDescriptor;
use crate::core::{RuleContext, RuleKind};
use crate::error::{GuardError, Result};

/// Inclusive numeric bounds; at least one side is set.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeCheck {
    min: Option<f64>,
    max: Option<f64>,
}

impl RangeCheck {
    pub fn new(min: Option<f64>, max: Option<f64>) -> Self {
        Self { min, max }
    }
}

/// Why a value is outside the range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RangeViolation {
    /// Not parseable as a number
    NotNumber,
    /// NaN
    NaN,
    /// Below the minimum
    Below(f64),
    /// Above the maximum
    Above(f64),
}

impl CellCheck for RangeCheck {
    type Violation = RangeViolation;

    fn check(&self, value: &CellValue<'_>) -> Option<RangeViolation> {
        let Some(number) = value.parse_f64() else {
            return Some(RangeViolation::NotNumber);
        };
        if number.is_nan() {
            return Some(RangeViolation::NaN);
        }
        match (self.min, self.max) {
            (Some(min), _) if number < min => Some(RangeViolation::Below(min)),
            (_, Some(max)) if number > max => Some(RangeViolation::Above(max)),
            _ => None,
        }
    }

    fn reason(&self, violation: RangeViolation, value: &CellValue<'_>) -> String {
        match violation {
            RangeViolation::NotNumber => format!("'{value}' is not a number"),
            RangeViolation::NaN => "value is NaN".to_string(),
            RangeViolation::Below(min) => format!("{value} is below minimum {min}"),
            RangeViolation::Above(max) => format!("{value} is above maximum {max}"),
        }
    }

    fn describe(&self) -> String {
        match (self.min, self.max) {
            (Some(min), Some(max)) => format!("a number between {min} and {max}"),
            (Some(min), None) => format!("a number of at least {min}"),
            (None, Some(max)) => format!("a number of at most {max}"),
            (None, None) => "a number".to_string(),
        }
    }
}

pub fn create(descriptor: &RuleDescriptor, context: &RuleContext) -> Result<RuleKind> {
    let min = descriptor.opt_f64("min")?;
    let max = descriptor.opt_f64("max")?;
    match (min, max) {
        (None, None) => {
            return Err(GuardError::configuration(
                descriptor.location(),
                "RangeCheck needs 'min', 'max' or both",
            ))
        }
        (Some(min), Some(max)) if min > max => {
            return Err(GuardError::configuration(
                descriptor.location(),
                format!("min {min} is greater than max {max}"),
            ))
        }
        _ => {}
    }
    Ok(CellRule::new(descriptor, context, RangeCheck::new(min, max))?.into_kind())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::test_support::{context, run_streaming};
    use arrow::array::{ArrayRef, Float64Array, StringArray};
    use arrow::record_batch::RecordBatch;
    use std::sync::Arc;

    #[test]
    fn test_inclusive_bounds() {
        let array: ArrayRef = Arc::new(Float64Array::from(vec![
            Some(0.0),
            Some(-0.5),
            Some(100.0),
            None,
            Some(100.5),
        ]));
        let batches = vec![RecordBatch::try_from_iter(vec![("score", array)]).unwrap()];
        let descriptor = RuleDescriptor::new("RangeCheck")
            .with_param("field", "score")
            .with_param("min", 0)
            .with_param("max", 100);

        let outcome = run_streaming(create(&descriptor, &context()).unwrap(), &batches);
        assert_eq!(outcome.failed_count, 2);
        assert_eq!(outcome.total_count, 4);
        assert_eq!(outcome.samples[0].reason, "-0.5 is below minimum 0");
        assert_eq!(outcome.samples[1].row_offset, 4);
    }

    #[test]
    fn test_text_values_are_parsed() {
        let array: ArrayRef = Arc::new(StringArray::from(vec!["12", " 7 ", "n/a"]));
        let batches = vec![RecordBatch::try_from_iter(vec![("qty", array)]).unwrap()];
        let descriptor = RuleDescriptor::new("RangeCheck")
            .with_param("field", "qty")
            .with_param("max", 10);

        let outcome = run_streaming(create(&descriptor, &context()).unwrap(), &batches);
        assert_eq!(outcome.failed_count, 2);
        assert_eq!(outcome.samples[1].reason, "'n/a' is not a number");
    }

    #[test]
    fn test_bounds_are_validated() {
        let none = RuleDescriptor::new("RangeCheck").with_param("field", "x");
        assert!(create(&none, &context()).is_err());

        let inverted = none.with_param("min", 5).with_param("max", 1);
        assert!(create(&inverted, &context()).is_err());
    }
}
