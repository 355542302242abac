//! In-memory batch sources.

use super::{BatchSource, RecordBatchStream, SourceLoader, SourceMetadata};
use crate::config::FileFormat;
use crate::error::{ErrorLocation, GuardError, Result};
use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use futures::StreamExt;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A source backed by record batches already in memory.
///
/// Replayable by default. [`MemorySource::non_replayable`] turns it into a
/// read-once source, the way a pipe or network stream behaves.
///
/// # Examples
///
/// ```rust
/// use arrow::array::{ArrayRef, Int64Array};
/// use arrow::record_batch::RecordBatch;
/// use chunk_guard::sources::MemorySource;
/// use std::sync::Arc;
///
/// let batch = RecordBatch::try_from_iter(vec![
///     ("id", Arc::new(Int64Array::from(vec![1, 2, 3])) as ArrayRef),
/// ]).unwrap();
/// let source = MemorySource::try_from_batches("ids", vec![batch]).unwrap();
/// ```
#[derive(Debug)]
pub struct MemorySource {
    name: String,
    schema: SchemaRef,
    batches: Vec<RecordBatch>,
    replayable: bool,
    opened: AtomicBool,
}

impl MemorySource {
    /// Creates a source with an explicit schema.
    pub fn new(name: impl Into<String>, schema: SchemaRef, batches: Vec<RecordBatch>) -> Self {
        Self {
            name: name.into(),
            schema,
            batches,
            replayable: true,
            opened: AtomicBool::new(false),
        }
    }

    /// Creates a source taking the schema from the first batch.
    pub fn try_from_batches(name: impl Into<String>, batches: Vec<RecordBatch>) -> Result<Self> {
        let name = name.into();
        let schema = batches
            .first()
            .map(|b| b.schema())
            .ok_or_else(|| GuardError::source(&name, "cannot infer a schema from zero batches"))?;
        Ok(Self::new(name, schema, batches))
    }

    /// Creates a source with a schema and no rows.
    pub fn empty(name: impl Into<String>, schema: SchemaRef) -> Self {
        Self::new(name, schema, Vec::new())
    }

    /// Makes the source readable only once.
    pub fn non_replayable(mut self) -> Self {
        self.replayable = false;
        self
    }
}

#[async_trait]
impl BatchSource for MemorySource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn metadata(&self) -> Result<SourceMetadata> {
        Ok(SourceMetadata {
            columns: self
                .schema
                .fields()
                .iter()
                .map(|f| f.name().clone())
                .collect(),
            row_count: Some(self.batches.iter().map(|b| b.num_rows() as u64).sum()),
            format: "memory".to_string(),
        })
    }

    async fn open_batches(&self) -> Result<RecordBatchStream> {
        if !self.replayable && self.opened.swap(true, Ordering::SeqCst) {
            return Err(GuardError::source_replay(
                ErrorLocation::new().with_file(&self.name),
                "source can only be read once",
            ));
        }
        let batches = self.batches.clone();
        Ok(futures::stream::iter(batches.into_iter().map(Ok)).boxed())
    }

    fn is_replayable(&self) -> bool {
        self.replayable
    }
}

/// A loader that hands out pre-registered sources by path.
#[derive(Debug, Default)]
pub struct MemoryLoader {
    sources: HashMap<String, Arc<dyn BatchSource>>,
}

impl MemoryLoader {
    /// Creates an empty loader.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a source under `path`.
    pub fn register(&mut self, path: impl Into<String>, source: Arc<dyn BatchSource>) {
        self.sources.insert(path.into(), source);
    }

    /// Builder-style [`register`](Self::register).
    pub fn with_source(mut self, path: impl Into<String>, source: impl BatchSource + 'static) -> Self {
        self.register(path, Arc::new(source));
        self
    }
}

#[async_trait]
impl SourceLoader for MemoryLoader {
    async fn open(
        &self,
        path: &str,
        _format: Option<FileFormat>,
        _chunk_size: usize,
    ) -> Result<Arc<dyn BatchSource>> {
        self.sources
            .get(path)
            .cloned()
            .ok_or_else(|| GuardError::source(path, "no source registered under this path"))
    }
}
