//! `UniqueKeyCheck`: a (possibly composite) key must not repeat.
//!
//! Pass one digests every complete key and remembers which digests occur
//! more than once. Pass two flags every row whose key is in that set, so the
//! first occurrence is reported along with the later ones. Rows with a null
//! key part are not checked.
//!
//! Keys are kept as 128-bit SHA-256 prefixes, so memory grows with the number
//! of distinct keys rather than with their width.

use super::{missing_column, require_columns, summary};
use crate::batch::{Batch, CellValue, Column};
use crate::condition::RowMask;
use crate::config::RuleDescriptor;
use crate::core::{
    AggregateState, DuplicateKeys, FailureSampler, RuleContext, RuleKind, RuleOutcome,
    StatisticalRule,
};
use crate::error::{ErrorLocation, GuardError, Result};
use sha2::{Digest, Sha256};
use std::borrow::Cow;
use std::collections::{BTreeSet, HashSet};

/// Digest of a key, or `None` if any part is null.
///
/// Each part is length-prefixed so `("ab", "c")` and `("a", "bc")` differ.
pub fn key_digest(parts: &[CellValue<'_>]) -> Option<u128> {
    let mut hasher = Sha256::new();
    for part in parts {
        let text = part.key_string()?;
        hasher.update((text.len() as u64).to_le_bytes());
        hasher.update(text.as_bytes());
    }
    let digest = hasher.finalize();
    let mut prefix = [0u8; 16];
    prefix.copy_from_slice(&digest[..16]);
    Some(u128::from_be_bytes(prefix))
}

#[derive(Debug)]
pub struct UniqueKeyRule {
    fields: Vec<String>,
    location: ErrorLocation,
    seen: HashSet<u128>,
    duplicates: BTreeSet<u128>,
    keyed_rows: u64,
    sampler: FailureSampler,
}

impl UniqueKeyRule {
    pub fn new(fields: Vec<String>, location: ErrorLocation, context: &RuleContext) -> Self {
        let label = fields.join(",");
        Self {
            fields,
            location,
            seen: HashSet::new(),
            duplicates: BTreeSet::new(),
            keyed_rows: 0,
            sampler: FailureSampler::new(context.max_sample_failures).with_field(label),
        }
    }

    fn label(&self) -> String {
        self.fields.join(",")
    }

    fn columns<'b>(&self, batch: &'b Batch) -> Result<Vec<Column<'b>>> {
        self.fields
            .iter()
            .map(|field| {
                batch
                    .column(field)
                    .ok_or_else(|| missing_column(field, batch, &self.location))
            })
            .collect()
    }
}

fn row_key<'b>(columns: &[Column<'b>], row: usize) -> Vec<CellValue<'b>> {
    columns.iter().map(|c| c.value(row)).collect()
}

impl StatisticalRule for UniqueKeyRule {
    fn init(&mut self, columns: &[String]) -> Result<()> {
        require_columns(columns, self.fields.iter().map(String::as_str), &self.location)
    }

    fn pass_one_observe(&mut self, batch: &Batch, mask: &RowMask) -> Result<()> {
        let columns = self.columns(batch)?;
        for row in mask.iter_selected() {
            if let Some(digest) = key_digest(&row_key(&columns, row)) {
                self.keyed_rows += 1;
                if !self.seen.insert(digest) {
                    self.duplicates.insert(digest);
                }
            }
        }
        Ok(())
    }

    fn pass_one_finish(&mut self) -> Result<AggregateState> {
        let distinct_keys = self.seen.len() as u64;
        self.seen = HashSet::new();
        Ok(AggregateState::DuplicateKeys(DuplicateKeys {
            keyed_rows: self.keyed_rows,
            distinct_keys,
            duplicates: std::mem::take(&mut self.duplicates),
        }))
    }

    fn pass_two_observe(
        &mut self,
        batch: &Batch,
        mask: &RowMask,
        aggregate: &AggregateState,
    ) -> Result<()> {
        let AggregateState::DuplicateKeys(keys) = aggregate else {
            return Err(GuardError::Internal(format!(
                "UniqueKeyCheck expected duplicate keys, got {aggregate:?}"
            )));
        };
        let columns = self.columns(batch)?;
        for row in mask.iter_selected() {
            let parts = row_key(&columns, row);
            let Some(digest) = key_digest(&parts) else {
                continue;
            };
            if keys.contains(digest) {
                let shown = match parts.as_slice() {
                    [single] => single.clone(),
                    many => CellValue::Text(Cow::Owned(
                        many.iter()
                            .map(ToString::to_string)
                            .collect::<Vec<_>>()
                            .join(","),
                    )),
                };
                self.sampler
                    .fail(batch.absolute_row(row), &shown, || "duplicate key".to_string());
            } else {
                self.sampler.pass();
            }
        }
        Ok(())
    }

    fn pass_two_finish(self: Box<Self>) -> RuleOutcome {
        let label = self.label();
        let tally = self.sampler.finish();
        let message = summary(&label, tally.failed_count, tally.total_count, "a unique key");
        RuleOutcome::from_tally(tally, message).with_field(label)
    }
}

pub fn create(descriptor: &RuleDescriptor, context: &RuleContext) -> Result<RuleKind> {
    let fields = if descriptor.params.contains_key("fields") {
        descriptor.param_str_list("fields")?
    } else {
        vec![descriptor.required_field()?.to_string()]
    };
    if fields.is_empty() {
        return Err(GuardError::configuration(
            descriptor.location(),
            "parameter 'fields' must not be empty",
        ));
    }
    Ok(RuleKind::Statistical(Box::new(UniqueKeyRule::new(
        fields,
        descriptor.location(),
        context,
    ))))
}
