//! `ValidValuesCheck`: values drawn from a fixed list.

use super::{cell_text, CellCheck, CellRule};
use crate::batch::CellValue;
use crate::config::RuleDescriptor;
use crate::core::{RuleContext, RuleKind};
use crate::error::{GuardError, Result};
use std::collections::HashSet;

/// Membership in an allowed set, compared on the cell's display text.
///
/// Numeric cells match their canonical text, so `values: [1, 2]` accepts an
/// integer column holding 1 and a float column holding 2.0 alike.
#[derive(Debug, Clone)]
pub struct ValuesCheck {
    allowed: HashSet<String>,
    listing: String,
    case_sensitive: bool,
}

impl ValuesCheck {
    pub fn new(values: Vec<String>, case_sensitive: bool) -> Self {
        let listing = values.join(", ");
        let allowed = values
            .into_iter()
            .map(|v| if case_sensitive { v } else { v.to_lowercase() })
            .collect();
        Self {
            allowed,
            listing,
            case_sensitive,
        }
    }
}

impl CellCheck for ValuesCheck {
    type Violation = ();

    fn check(&self, value: &CellValue<'_>) -> Option<()> {
        let text = cell_text(value)?;
        let found = if self.case_sensitive {
            self.allowed.contains(text.as_ref())
        } else {
            self.allowed.contains(&text.to_lowercase())
        };
        (!found).then_some(())
    }

    fn reason(&self, _violation: (), value: &CellValue<'_>) -> String {
        format!("'{value}' is not an allowed value")
    }

    fn describe(&self) -> String {
        format!("one of [{}]", self.listing)
    }
}

pub fn create(descriptor: &RuleDescriptor, context: &RuleContext) -> Result<RuleKind> {
    let values = descriptor.param_str_list("values")?;
    if values.is_empty() {
        return Err(GuardError::configuration(
            descriptor.location(),
            "parameter 'values' must not be empty",
        ));
    }
    let check = ValuesCheck::new(values, descriptor.param_bool_or("case_sensitive", true)?);
    Ok(CellRule::new(descriptor, context, check)?.into_kind())
}
