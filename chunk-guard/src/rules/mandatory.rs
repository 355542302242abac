//! `MandatoryFieldCheck`: every selected row must carry a value.

use super::{CellCheck, CellRule};
use crate::batch::CellValue;
use crate::config::RuleDescriptor;
use crate::core::{RuleContext, RuleKind};
use crate::error::Result;

/// Flags nulls and, unless `allow_blank` is set, whitespace-only strings.
#[derive(Debug, Clone)]
pub struct MandatoryCheck {
    allow_blank: bool,
}

impl MandatoryCheck {
    pub fn new(allow_blank: bool) -> Self {
        Self { allow_blank }
    }
}

impl CellCheck for MandatoryCheck {
    type Violation = &'static str;

    fn check(&self, value: &CellValue<'_>) -> Option<&'static str> {
        match value {
            CellValue::Null => Some("value is null"),
            CellValue::Text(text) if !self.allow_blank && text.trim().is_empty() => {
                Some("value is blank")
            }
            _ => None,
        }
    }

    fn reason(&self, violation: &'static str, _value: &CellValue<'_>) -> String {
        violation.to_string()
    }

    fn checks_nulls(&self) -> bool {
        true
    }

    fn describe(&self) -> String {
        if self.allow_blank {
            "a non-null value".to_string()
        } else {
            "a non-blank value".to_string()
        }
    }
}

pub fn create(descriptor: &RuleDescriptor, context: &RuleContext) -> Result<RuleKind> {
    let check = MandatoryCheck::new(descriptor.param_bool_or("allow_blank", false)?);
    Ok(CellRule::new(descriptor, context, check)?.into_kind())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::test_support::{context, run_streaming};
    use arrow::array::{ArrayRef, StringArray};
    use arrow::record_batch::RecordBatch;
    use std::sync::Arc;

    fn names() -> Vec<RecordBatch> {
        let first: ArrayRef = Arc::new(StringArray::from(vec![Some("ann"), None, Some("  ")]));
        let second: ArrayRef = Arc::new(StringArray::from(vec![Some("bo"), None]));
        vec![
            RecordBatch::try_from_iter(vec![("name", first)]).unwrap(),
            RecordBatch::try_from_iter(vec![("name", second)]).unwrap(),
        ]
    }

    #[test]
    fn test_nulls_and_blanks_fail() {
        let descriptor = RuleDescriptor::new("MandatoryFieldCheck").with_param("field", "name");
        let outcome = run_streaming(create(&descriptor, &context()).unwrap(), &names());

        assert_eq!(outcome.failed_count, 3);
        assert_eq!(outcome.total_count, 5);
        let offsets: Vec<u64> = outcome.samples.iter().map(|s| s.row_offset).collect();
        assert_eq!(offsets, vec![1, 2, 4]);
        assert_eq!(outcome.samples[0].value, None);
        assert_eq!(outcome.samples[1].reason, "value is blank");
    }

    #[test]
    fn test_allow_blank() {
        let descriptor = RuleDescriptor::new("MandatoryFieldCheck")
            .with_param("field", "name")
            .with_param("allow_blank", true);
        let outcome = run_streaming(create(&descriptor, &context()).unwrap(), &names());
        assert_eq!(outcome.failed_count, 2);
    }

    #[test]
    fn test_field_is_required() {
        let err = create(&RuleDescriptor::new("MandatoryFieldCheck"), &context())
            .err()
            .unwrap();
        assert_eq!(err.kind(), crate::error::ErrorKind::Configuration);
    }
}
