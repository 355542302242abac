//! Row filters that scope a rule to a subset of rows.
//!
//! A condition is a small boolean expression over column values:
//!
//! ```text
//! age >= 18 AND age < 65
//! status IN ('ACTIVE', 'PENDING') OR owner IS NULL
//! NOT (region == 'EU')
//! ```
//!
//! Conditions are parsed once per rule and evaluated against every batch.
//! Evaluation is a pure function of the batch, so the same rows are selected
//! whatever the batch boundaries are.
//!
//! ## Null handling
//!
//! A null value satisfies no comparison, `!=` and `IN` included. Only
//! `IS NULL` matches it. Such a comparison is unknown rather than false, and
//! `NOT` of an unknown stays unknown, so `NOT (status == 'ACTIVE')` selects
//! the same rows as `status != 'ACTIVE'`. Rows whose condition ends up unknown
//! are excluded.

mod ast;
mod eval;
mod lexer;
mod parser;

pub use ast::{Comparator, Expr, Literal};
pub use eval::RowMask;

use crate::batch::Batch;
use crate::error::{ErrorLocation, GuardError, Result};

/// A parsed row filter.
///
/// # Examples
///
/// ```rust
/// use chunk_guard::condition::Condition;
///
/// let condition = Condition::parse("age >= 18 AND age < 65").unwrap();
/// assert_eq!(condition.fields(), vec!["age"]);
/// assert!(Condition::parse("age >=").is_err());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    text: String,
    expr: Expr,
    case_insensitive: bool,
}

impl Condition {
    /// Parses a condition with case-sensitive string comparison.
    pub fn parse(text: &str) -> Result<Self> {
        Self::parse_with(text, false)
    }

    /// Parses a condition, optionally comparing strings without regard to case.
    pub fn parse_with(text: &str, case_insensitive: bool) -> Result<Self> {
        let expr = parser::parse(text)?;
        Ok(Self {
            text: text.to_string(),
            expr,
            case_insensitive,
        })
    }

    /// The expression as written.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The parsed expression.
    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    /// Whether string comparisons ignore case.
    pub fn is_case_insensitive(&self) -> bool {
        self.case_insensitive
    }

    /// Fields referenced by the expression, in order of first appearance.
    pub fn fields(&self) -> Vec<&str> {
        let mut fields = Vec::new();
        self.expr.collect_fields(&mut fields);
        fields
    }

    /// Checks that every referenced field is among `columns`.
    pub fn check_fields(&self, columns: &[String]) -> Result<()> {
        match self
            .fields()
            .into_iter()
            .find(|field| !columns.iter().any(|c| c == field))
        {
            Some(missing) => Err(GuardError::configuration(
                ErrorLocation::new().with_field(missing),
                format!(
                    "condition '{}' references unknown field '{missing}'",
                    self.text
                ),
            )),
            None => Ok(()),
        }
    }

    /// Referenced fields absent from `batch`.
    pub fn missing_fields(&self, batch: &Batch) -> Vec<&str> {
        self.fields()
            .into_iter()
            .filter(|field| !batch.has_column(field))
            .collect()
    }

    /// Selects the rows of `batch` the condition holds for.
    ///
    /// A batch missing any referenced field gets an all-excluded mask.
    pub fn evaluate(&self, batch: &Batch) -> RowMask {
        if !self.missing_fields(batch).is_empty() {
            return RowMask::none(batch.num_rows());
        }
        RowMask::from_vec(eval::evaluate(&self.expr, batch, self.case_insensitive))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{ArrayRef, Int64Array};
    use arrow::record_batch::RecordBatch;
    use std::sync::Arc;

    fn ages() -> Batch {
        let array: ArrayRef = Arc::new(Int64Array::from(vec![10, 20, 30]));
        Batch::new(RecordBatch::try_from_iter(vec![("age", array)]).unwrap(), 0, 0)
    }

    #[test]
    fn test_check_fields_names_the_unknown_field() {
        let condition = Condition::parse("age > 1 AND region == 'EU'").unwrap();
        let err = condition
            .check_fields(&["age".to_string()])
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Configuration);
        assert_eq!(
            err.location().and_then(|l| l.field.as_deref()),
            Some("region")
        );
        assert!(condition
            .check_fields(&["age".to_string(), "region".to_string()])
            .is_ok());
    }

    #[test]
    fn test_schema_drift_excludes_every_row() {
        let condition = Condition::parse("region == 'EU' OR age > 1").unwrap();
        let mask = condition.evaluate(&ages());
        assert_eq!(mask.len(), 3);
        assert_eq!(mask.selected_count(), 0);
        assert_eq!(condition.missing_fields(&ages()), vec!["region"]);
    }

    #[test]
    fn test_evaluate_selects_rows() {
        let condition = Condition::parse("age >= 20").unwrap();
        let mask = condition.evaluate(&ages());
        assert_eq!(mask.iter_selected().collect::<Vec<_>>(), vec![1, 2]);
    }
}
