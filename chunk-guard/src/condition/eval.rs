//! Row-wise evaluation of parsed conditions.

use super::ast::{Comparator, Expr, Literal};
use crate::batch::{Batch, CellValue};
use std::cmp::Ordering;

/// Which rows of a batch a rule should look at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowMask {
    selected: Vec<bool>,
    count: usize,
}

impl RowMask {
    /// Selects every row.
    pub fn all(len: usize) -> Self {
        Self {
            selected: vec![true; len],
            count: len,
        }
    }

    /// Selects no row.
    pub fn none(len: usize) -> Self {
        Self {
            selected: vec![false; len],
            count: 0,
        }
    }

    /// Builds a mask from per-row flags.
    pub fn from_vec(selected: Vec<bool>) -> Self {
        let count = selected.iter().filter(|s| **s).count();
        Self { selected, count }
    }

    /// Number of rows covered by the mask.
    pub fn len(&self) -> usize {
        self.selected.len()
    }

    /// Returns true if the mask covers no rows.
    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    /// Returns true if `row` is selected.
    pub fn is_selected(&self, row: usize) -> bool {
        self.selected.get(row).copied().unwrap_or(false)
    }

    /// Number of selected rows.
    pub fn selected_count(&self) -> usize {
        self.count
    }

    /// Indices of the selected rows in ascending order.
    pub fn iter_selected(&self) -> impl Iterator<Item = usize> + '_ {
        self.selected
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.then_some(i))
    }
}

/// Evaluates `expr` for every row of `batch` and keeps the rows it holds for.
///
/// A row whose result is unknown is excluded.
pub(crate) fn evaluate(expr: &Expr, batch: &Batch, case_insensitive: bool) -> Vec<bool> {
    evaluate_rows(expr, batch, case_insensitive)
        .into_iter()
        .map(|v| v == Some(true))
        .collect()
}

/// Three-valued evaluation. `None` is unknown: a comparison against a null,
/// a type mismatch or NaN.
///
/// Callers must have checked that every referenced field exists in the batch;
/// a missing column evaluates as null for all rows.
fn evaluate_rows(expr: &Expr, batch: &Batch, case_insensitive: bool) -> Vec<Option<bool>> {
    let rows = batch.num_rows();
    match expr {
        Expr::Compare { field, op, value } => match batch.column(field) {
            Some(column) => (0..rows)
                .map(|row| compare(&column.value(row), *op, value, case_insensitive))
                .collect(),
            None => vec![None; rows],
        },
        Expr::InList {
            field,
            values,
            negated,
        } => match batch.column(field) {
            Some(column) => (0..rows)
                .map(|row| {
                    let cell = column.value(row);
                    in_list(&cell, values, case_insensitive).map(|found| found != *negated)
                })
                .collect(),
            None => vec![None; rows],
        },
        Expr::IsNull { field, negated } => match batch.column(field) {
            Some(column) => (0..rows)
                .map(|row| Some(column.is_null(row) != *negated))
                .collect(),
            None => vec![Some(!*negated); rows],
        },
        Expr::And(left, right) => {
            let mut out = evaluate_rows(left, batch, case_insensitive);
            let right = evaluate_rows(right, batch, case_insensitive);
            out.iter_mut().zip(right).for_each(|(l, r)| {
                *l = match (*l, r) {
                    (Some(false), _) | (_, Some(false)) => Some(false),
                    (Some(true), Some(true)) => Some(true),
                    _ => None,
                }
            });
            out
        }
        Expr::Or(left, right) => {
            let mut out = evaluate_rows(left, batch, case_insensitive);
            let right = evaluate_rows(right, batch, case_insensitive);
            out.iter_mut().zip(right).for_each(|(l, r)| {
                *l = match (*l, r) {
                    (Some(true), _) | (_, Some(true)) => Some(true),
                    (Some(false), Some(false)) => Some(false),
                    _ => None,
                }
            });
            out
        }
        Expr::Not(inner) => evaluate_rows(inner, batch, case_insensitive)
            .into_iter()
            .map(|v| v.map(|b| !b))
            .collect(),
    }
}

/// Whether `cell` equals one of `values`. Unknown when the cell is null, or
/// when nothing matched and some literal could not be compared.
fn in_list(cell: &CellValue<'_>, values: &[Literal], case_insensitive: bool) -> Option<bool> {
    if cell.is_null() {
        return None;
    }
    let mut unknown = false;
    for value in values {
        match compare(cell, Comparator::Eq, value, case_insensitive) {
            Some(true) => return Some(true),
            Some(false) => {}
            None => unknown = true,
        }
    }
    (!unknown).then_some(false)
}

/// Compares one cell to a literal. Nulls and type mismatches are unknown.
fn compare(
    cell: &CellValue<'_>,
    op: Comparator,
    literal: &Literal,
    case_insensitive: bool,
) -> Option<bool> {
    let ordering = order(cell, literal, case_insensitive)?;
    Some(match op {
        Comparator::Eq => ordering == Ordering::Equal,
        Comparator::NotEq => ordering != Ordering::Equal,
        Comparator::Gt => ordering == Ordering::Greater,
        Comparator::GtEq => ordering != Ordering::Less,
        Comparator::Lt => ordering == Ordering::Less,
        Comparator::LtEq => ordering != Ordering::Greater,
    })
}

fn order(cell: &CellValue<'_>, literal: &Literal, case_insensitive: bool) -> Option<Ordering> {
    match (cell, literal) {
        (CellValue::Null, _) => None,
        (CellValue::Int(a), Literal::Int(b)) => Some(a.cmp(b)),
        (CellValue::UInt(a), Literal::Int(b)) => Some((*a as i128).cmp(&(*b as i128))),
        (CellValue::Float(_), Literal::Int(_))
        | (CellValue::Int(_) | CellValue::UInt(_) | CellValue::Float(_), Literal::Float(_)) => {
            cell.as_f64()?.partial_cmp(&literal_f64(literal)?)
        }
        // Text columns holding numbers still compare numerically against numeric literals.
        (CellValue::Text(_), Literal::Int(_) | Literal::Float(_)) => {
            cell.parse_f64()?.partial_cmp(&literal_f64(literal)?)
        }
        (CellValue::Text(a), Literal::Str(b)) => {
            if case_insensitive {
                Some(a.to_lowercase().cmp(&b.to_lowercase()))
            } else {
                Some(a.as_ref().cmp(b.as_str()))
            }
        }
        (CellValue::Bool(a), Literal::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

fn literal_f64(literal: &Literal) -> Option<f64> {
    match literal {
        Literal::Int(v) => Some(*v as f64),
        Literal::Float(v) => Some(*v),
        _ => None,
    }
}
