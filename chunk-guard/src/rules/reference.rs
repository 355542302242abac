//! Cross-file key rules: `ReferentialIntegrityCheck` and
//! `CrossFileDuplicateCheck`.
//!
//! The engine resolves the descriptor's `reference_file` before the rule is
//! built and passes the index in through the [`RuleContext`]. Keys are
//! compared on their canonical text (see [`CellValue::key_string`]).

use super::{cell_text, CellCheck, CellRule};
use crate::batch::CellValue;
use crate::config::RuleDescriptor;
use crate::core::{RuleContext, RuleKind};
use crate::error::Result;
use crate::resolver::ReferenceIndex;
use std::sync::Arc;

/// Whether a key must be present in, or absent from, the reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyExpectation {
    Present,
    Absent,
}

#[derive(Debug, Clone)]
pub struct ReferenceCheck {
    index: Arc<ReferenceIndex>,
    expectation: KeyExpectation,
}

impl ReferenceCheck {
    pub fn new(index: Arc<ReferenceIndex>, expectation: KeyExpectation) -> Self {
        Self { index, expectation }
    }
}

impl CellCheck for ReferenceCheck {
    type Violation = ();

    fn check(&self, value: &CellValue<'_>) -> Option<()> {
        let key = cell_text(value)?;
        let found = self.index.contains(&key);
        (found == (self.expectation == KeyExpectation::Absent)).then_some(())
    }

    fn reason(&self, _violation: (), value: &CellValue<'_>) -> String {
        let relation = match self.expectation {
            KeyExpectation::Present => "not found in",
            KeyExpectation::Absent => "also appears in",
        };
        format!(
            "'{value}' {relation} {}.{}",
            self.index.path(),
            self.index.key()
        )
    }

    fn describe(&self) -> String {
        let relation = match self.expectation {
            KeyExpectation::Present => "a key present in",
            KeyExpectation::Absent => "a key absent from",
        };
        format!("{relation} {}.{}", self.index.path(), self.index.key())
    }
}

fn create(
    descriptor: &RuleDescriptor,
    context: &RuleContext,
    expectation: KeyExpectation,
) -> Result<RuleKind> {
    let index = context.require_reference(descriptor)?;
    let check = ReferenceCheck::new(index, expectation);
    Ok(CellRule::new(descriptor, context, check)?.into_kind())
}

/// Factory for `ReferentialIntegrityCheck`.
pub fn referential_integrity(
    descriptor: &RuleDescriptor,
    context: &RuleContext,
) -> Result<RuleKind> {
    create(descriptor, context, KeyExpectation::Present)
}

/// Factory for `CrossFileDuplicateCheck`.
pub fn cross_file_duplicate(
    descriptor: &RuleDescriptor,
    context: &RuleContext,
) -> Result<RuleKind> {
    create(descriptor, context, KeyExpectation::Absent)
}
