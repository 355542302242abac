//! `StringLengthCheck`: text length in characters within bounds.

use super::{cell_text, CellCheck, CellRule};
use crate::batch::CellValue;
use crate::config::RuleDescriptor;
use crate::core::{RuleContext, RuleKind};
use crate::error::{GuardError, Result};

/// The kind of length assertion to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthBounds {
    /// At least this many characters
    Min(usize),
    /// At most this many characters
    Max(usize),
    /// Between min and max characters (inclusive)
    Between(usize, usize),
}

impl LengthBounds {
    /// Builds bounds from optional limits; `None` when neither is set.
    pub fn from_limits(min: Option<usize>, max: Option<usize>) -> Option<Self> {
        match (min, max) {
            (Some(min), Some(max)) => Some(LengthBounds::Between(min, max)),
            (Some(min), None) => Some(LengthBounds::Min(min)),
            (None, Some(max)) => Some(LengthBounds::Max(max)),
            (None, None) => None,
        }
    }

    fn admits(&self, length: usize) -> bool {
        match *self {
            LengthBounds::Min(min) => length >= min,
            LengthBounds::Max(max) => length <= max,
            LengthBounds::Between(min, max) => (min..=max).contains(&length),
        }
    }

    fn description(&self) -> String {
        match self {
            LengthBounds::Min(min) => format!("at least {min} characters"),
            LengthBounds::Max(max) => format!("at most {max} characters"),
            LengthBounds::Between(min, max) => format!("between {min} and {max} characters"),
        }
    }
}

impl CellCheck for LengthBounds {
    type Violation = usize;

    fn check(&self, value: &CellValue<'_>) -> Option<usize> {
        let length = cell_text(value)?.chars().count();
        (!self.admits(length)).then_some(length)
    }

    fn reason(&self, length: usize, _value: &CellValue<'_>) -> String {
        format!("length {length} is not {}", self.description())
    }

    fn describe(&self) -> String {
        self.description()
    }
}

pub fn create(descriptor: &RuleDescriptor, context: &RuleContext) -> Result<RuleKind> {
    let min = descriptor.opt_u64("min_length")?.map(|v| v as usize);
    let max = descriptor.opt_u64("max_length")?.map(|v| v as usize);
    let bounds = LengthBounds::from_limits(min, max).ok_or_else(|| {
        GuardError::configuration(
            descriptor.location(),
            "StringLengthCheck needs 'min_length', 'max_length' or both",
        )
    })?;
    if let LengthBounds::Between(min, max) = bounds {
        if min > max {
            return Err(GuardError::configuration(
                descriptor.location(),
                format!("min_length {min} is greater than max_length {max}"),
            ));
        }
    }
    Ok(CellRule::new(descriptor, context, bounds)?.into_kind())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::test_support::{context, run_streaming};
    use arrow::array::{ArrayRef, StringArray};
    use arrow::record_batch::RecordBatch;
    use std::sync::Arc;

    #[test]
    fn test_counts_characters_not_bytes() {
        let array: ArrayRef = Arc::new(StringArray::from(vec![
            Some("abc"),
            Some("ünï"),
            Some("ab"),
            None,
            Some("abcdef"),
        ]));
        let batches = vec![RecordBatch::try_from_iter(vec![("code", array)]).unwrap()];
        let descriptor = RuleDescriptor::new("StringLengthCheck")
            .with_param("field", "code")
            .with_param("min_length", 3)
            .with_param("max_length", 5);

        let outcome = run_streaming(create(&descriptor, &context()).unwrap(), &batches);
        assert_eq!(outcome.failed_count, 2);
        assert_eq!(outcome.total_count, 4);
        assert_eq!(
            outcome.samples[0].reason,
            "length 2 is not between 3 and 5 characters"
        );
        assert_eq!(outcome.samples[1].row_offset, 4);
    }

    #[test]
    fn test_bounds() {
        assert_eq!(LengthBounds::from_limits(None, None), None);
        assert!(LengthBounds::Max(2).admits(0));
        assert!(!LengthBounds::Min(1).admits(0));

        let descriptor = RuleDescriptor::new("StringLengthCheck").with_param("field", "code");
        assert!(create(&descriptor, &context()).is_err());
    }
}
