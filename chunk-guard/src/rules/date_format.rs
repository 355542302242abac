//! `DateFormatCheck`: text parseable with a chrono format string.

use super::{cell_text, CellCheck, CellRule};
use crate::batch::CellValue;
use crate::config::RuleDescriptor;
use crate::core::{RuleContext, RuleKind};
use crate::error::{GuardError, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};

/// Accepts a value if it parses as a date, a date-time or a zoned date-time
/// under `format`.
#[derive(Debug, Clone)]
pub struct DateFormatCheck {
    format: String,
}

impl DateFormatCheck {
    pub fn new(format: impl Into<String>) -> Self {
        Self {
            format: format.into(),
        }
    }

    fn parses(&self, text: &str) -> bool {
        NaiveDate::parse_from_str(text, &self.format).is_ok()
            || NaiveDateTime::parse_from_str(text, &self.format).is_ok()
            || DateTime::parse_from_str(text, &self.format).is_ok()
            || NaiveTime::parse_from_str(text, &self.format).is_ok()
    }
}

impl CellCheck for DateFormatCheck {
    type Violation = ();

    fn check(&self, value: &CellValue<'_>) -> Option<()> {
        let text = cell_text(value)?;
        (!self.parses(text.trim())).then_some(())
    }

    fn reason(&self, _violation: (), value: &CellValue<'_>) -> String {
        format!("'{value}' does not match {}", self.format)
    }

    fn describe(&self) -> String {
        format!("a date in format '{}'", self.format)
    }
}

pub fn create(descriptor: &RuleDescriptor, context: &RuleContext) -> Result<RuleKind> {
    let format = descriptor.param_str("format")?;
    if !format.contains('%') {
        return Err(GuardError::configuration(
            descriptor.location(),
            format!("format '{format}' has no strftime specifiers"),
        ));
    }
    Ok(CellRule::new(descriptor, context, DateFormatCheck::new(format))?.into_kind())
}
