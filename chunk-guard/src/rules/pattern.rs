//! `RegexCheck`: values must (or must not) match a regular expression.
//!
//! The pattern is searched for anywhere in the value; anchor it with `^` and
//! `$` to require a full match. Non-text cells are matched by their display
//! form.

use super::{cell_text, CellCheck, CellRule};
use crate::batch::CellValue;
use crate::config::RuleDescriptor;
use crate::core::{RuleContext, RuleKind};
use crate::error::{GuardError, Result};
use regex::Regex;

#[derive(Debug, Clone)]
pub struct PatternCheck {
    regex: Regex,
    invert: bool,
}

impl PatternCheck {
    pub fn new(regex: Regex, invert: bool) -> Self {
        Self { regex, invert }
    }
}

impl CellCheck for PatternCheck {
    type Violation = ();

    fn check(&self, value: &CellValue<'_>) -> Option<()> {
        let text = cell_text(value)?;
        (self.regex.is_match(&text) == self.invert).then_some(())
    }

    fn reason(&self, _violation: (), value: &CellValue<'_>) -> String {
        if self.invert {
            format!("'{value}' matches forbidden pattern")
        } else {
            format!("'{value}' does not match pattern")
        }
    }

    fn describe(&self) -> String {
        if self.invert {
            format!("no match for /{}/", self.regex.as_str())
        } else {
            format!("a match for /{}/", self.regex.as_str())
        }
    }
}

pub fn create(descriptor: &RuleDescriptor, context: &RuleContext) -> Result<RuleKind> {
    let pattern = descriptor.param_str("pattern")?;
    let regex = Regex::new(pattern).map_err(|e| {
        GuardError::configuration(
            descriptor.location(),
            format!("invalid pattern '{pattern}': {e}"),
        )
    })?;
    let check = PatternCheck::new(regex, descriptor.param_bool_or("invert", false)?);
    Ok(CellRule::new(descriptor, context, check)?.into_kind())
}
