//! Reference datasets for cross-file rules.
//!
//! A rule such as `ReferentialIntegrityCheck` compares a field of the primary
//! file against the key column of another file. The resolver loads each
//! (file, format, key) combination once per job into a [`ReferenceIndex`] and
//! hands the same index to every rule that asks for it.
//!
//! Failures are cached as well. If a reference file is missing, every rule
//! that depends on it fails with the same error rather than silently passing.

use crate::config::{FileFormat, RuleDescriptor};
use crate::error::{ErrorKind, ErrorLocation, GuardError, Result};
use crate::sources::{BatchCursor, SourceLoader};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Which reference dataset a rule needs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReferenceSpec {
    /// Path handed to the loader
    pub path: String,
    /// Explicit format, inferred from the path when absent
    pub format: Option<FileFormat>,
    /// Key column in the reference file
    pub key: String,
}

impl ReferenceSpec {
    /// Creates a spec.
    pub fn new(path: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            format: None,
            key: key.into(),
        }
    }

    /// Sets the format explicitly.
    pub fn with_format(mut self, format: FileFormat) -> Self {
        self.format = Some(format);
        self
    }

    /// Reads `reference_file`, `reference_key` and `reference_format` from a
    /// descriptor. Returns `None` when the rule names no reference file.
    ///
    /// `reference_key` defaults to the rule's own field.
    pub fn from_descriptor(descriptor: &RuleDescriptor) -> Result<Option<Self>> {
        let Some(path) = descriptor.opt_str("reference_file")? else {
            return Ok(None);
        };
        let key = match descriptor.opt_str("reference_key")? {
            Some(key) => key,
            None => descriptor.required_field()?,
        };
        let format = match descriptor.opt_str("reference_format")? {
            Some(name) => Some(parse_format(name).ok_or_else(|| {
                GuardError::configuration(
                    descriptor.location(),
                    format!("unsupported reference_format '{name}'"),
                )
            })?),
            None => None,
        };
        Ok(Some(Self {
            path: path.to_string(),
            format,
            key: key.to_string(),
        }))
    }
}

fn parse_format(name: &str) -> Option<FileFormat> {
    match name.to_ascii_lowercase().as_str() {
        "csv" => Some(FileFormat::Csv),
        "parquet" => Some(FileFormat::Parquet),
        "json" | "ndjson" | "jsonl" => Some(FileFormat::Json),
        _ => None,
    }
}

/// The key multiset of a reference file.
#[derive(Debug, Clone, Default)]
pub struct ReferenceIndex {
    path: String,
    key: String,
    counts: HashMap<String, u32>,
    rows: u64,
}

impl ReferenceIndex {
    /// Creates an empty index.
    pub fn new(path: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            key: key.into(),
            counts: HashMap::new(),
            rows: 0,
        }
    }

    /// Adds one occurrence of `key`.
    pub fn insert(&mut self, key: String) {
        *self.counts.entry(key).or_insert(0) += 1;
    }

    /// Returns true if `key` occurs in the reference.
    pub fn contains(&self, key: &str) -> bool {
        self.counts.contains_key(key)
    }

    /// Occurrences of `key`.
    pub fn count(&self, key: &str) -> u32 {
        self.counts.get(key).copied().unwrap_or(0)
    }

    /// Number of distinct keys.
    pub fn distinct_keys(&self) -> usize {
        self.counts.len()
    }

    /// Rows read from the reference file, nulls included.
    pub fn rows(&self) -> u64 {
        self.rows
    }

    /// The reference file path.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The key column.
    pub fn key(&self) -> &str {
        &self.key
    }
}

#[derive(Debug, Clone)]
struct CachedFailure {
    kind: ErrorKind,
    location: ErrorLocation,
    message: String,
}

impl CachedFailure {
    fn capture(error: &GuardError, location: &ErrorLocation) -> Self {
        Self {
            kind: error.kind(),
            location: error.location().cloned().unwrap_or_default().or(location),
            message: error.detail(),
        }
    }

    fn to_error(&self) -> GuardError {
        match self.kind {
            ErrorKind::Configuration => {
                GuardError::configuration(self.location.clone(), self.message.clone())
            }
            _ => GuardError::resource(self.location.clone(), self.message.clone()),
        }
    }
}

/// Loads and caches reference indexes for one job run.
#[derive(Debug)]
pub struct ReferenceResolver {
    loader: Arc<dyn SourceLoader>,
    chunk_size: usize,
    cache: HashMap<ReferenceSpec, std::result::Result<Arc<ReferenceIndex>, CachedFailure>>,
}

impl ReferenceResolver {
    /// Creates a resolver reading through `loader`.
    pub fn new(loader: Arc<dyn SourceLoader>, chunk_size: usize) -> Self {
        Self {
            loader,
            chunk_size,
            cache: HashMap::new(),
        }
    }

    /// Number of cached entries, failures included.
    pub fn cached(&self) -> usize {
        self.cache.len()
    }

    /// Returns the index for `spec`, loading it on first use.
    ///
    /// A missing or unreadable file is a `Resource` error; a key column the
    /// file lacks is a `Configuration` error.
    pub async fn resolve(&mut self, spec: &ReferenceSpec) -> Result<Arc<ReferenceIndex>> {
        if let Some(cached) = self.cache.get(spec) {
            debug!(reference.path = %spec.path, reference.key = %spec.key, "Reference cache hit");
            return cached.clone().map_err(|failure| failure.to_error());
        }

        let location = ErrorLocation::new()
            .with_file(&spec.path)
            .with_field(&spec.key);
        let loaded = self.load(spec).await;
        let entry = match &loaded {
            Ok(index) => Ok(Arc::clone(index)),
            Err(e) => {
                warn!(
                    reference.path = %spec.path,
                    reference.key = %spec.key,
                    error = %e,
                    "Failed to load reference dataset"
                );
                Err(CachedFailure::capture(e, &location))
            }
        };
        self.cache.insert(spec.clone(), entry.clone());
        entry.map_err(|failure| failure.to_error())
    }

    #[instrument(skip(self), fields(reference.path = %spec.path, reference.key = %spec.key))]
    async fn load(&self, spec: &ReferenceSpec) -> Result<Arc<ReferenceIndex>> {
        let location = ErrorLocation::new()
            .with_file(&spec.path)
            .with_field(&spec.key);
        let resource = |message: &str, e: GuardError| {
            GuardError::resource_with_source(location.clone(), message, Box::new(e))
        };

        let source = self
            .loader
            .open(&spec.path, spec.format, self.chunk_size)
            .await
            .map_err(|e| resource("cannot open reference file", e))?;
        let metadata = source
            .metadata()
            .await
            .map_err(|e| resource("cannot read reference schema", e))?;
        if !metadata.has_column(&spec.key) {
            return Err(GuardError::configuration(
                location.clone(),
                format!(
                    "reference key column '{}' not found in '{}'",
                    spec.key, spec.path
                ),
            ));
        }

        let stream = source
            .open_batches()
            .await
            .map_err(|e| resource("cannot read reference file", e))?;
        let mut cursor = BatchCursor::new(stream, self.chunk_size);
        let mut index = ReferenceIndex::new(&spec.path, &spec.key);

        while let Some(batch) = cursor.next_batch().await {
            let batch = batch.map_err(|e| resource("cannot read reference file", e))?;
            let column = batch.column(&spec.key).ok_or_else(|| {
                GuardError::resource(
                    location.clone(),
                    format!("key column '{}' vanished mid-file", spec.key),
                )
            })?;
            for row in 0..batch.num_rows() {
                if let Some(key) = column.value(row).key_string() {
                    index.insert(key);
                }
            }
            index.rows += batch.num_rows() as u64;
        }

        info!(
            reference.path = %spec.path,
            reference.key = %spec.key,
            reference.rows = index.rows(),
            reference.distinct_keys = index.distinct_keys(),
            "Loaded reference dataset"
        );
        Ok(Arc::new(index))
    }
}
