//! Batch sources consumed by the engine.
//!
//! Format-specific loading is an external concern: anything that can produce
//! a stream of Arrow record batches can implement [`BatchSource`]. The engine
//! re-slices whatever it receives into bounded [`Batch`]es through a
//! [`BatchCursor`], so sources are free to emit larger or smaller record
//! batches than the configured chunk size.
//!
//! Two implementations ship with the crate:
//!
//! - [`MemorySource`] / [`MemoryLoader`] for embedding and tests
//! - [`FileSource`] / [`DataFusionLoader`] for CSV, Parquet and NDJSON files,
//!   streamed through DataFusion

mod cursor;
mod file;
mod memory;

pub use cursor::BatchCursor;
pub use file::{DataFusionLoader, FileSource};
pub use memory::{MemoryLoader, MemorySource};

use crate::config::FileFormat;
use crate::error::Result;
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::sync::Arc;

/// A stream of raw record batches from a source.
pub type RecordBatchStream = BoxStream<'static, Result<RecordBatch>>;

/// What a loader knows about a file without scanning it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceMetadata {
    /// Column names in schema order
    pub columns: Vec<String>,
    /// Row count, when it is cheap to know
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row_count: Option<u64>,
    /// Format label
    pub format: String,
}

impl SourceMetadata {
    /// Returns true if the schema has a column with this name.
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }
}

/// A replayable producer of record batches for one file.
///
/// Every call to [`open_batches`](BatchSource::open_batches) must yield the
/// same rows in the same order; two-pass rules rely on it. Sources that
/// cannot guarantee this return `false` from
/// [`is_replayable`](BatchSource::is_replayable).
#[async_trait]
pub trait BatchSource: Debug + Send + Sync {
    /// Name used in logs and errors.
    fn name(&self) -> &str;

    /// Schema and cheap facts about the data.
    async fn metadata(&self) -> Result<SourceMetadata>;

    /// Starts a fresh scan from the first row.
    async fn open_batches(&self) -> Result<RecordBatchStream>;

    /// Whether a second scan yields identical rows in identical order.
    fn is_replayable(&self) -> bool {
        true
    }
}

/// Opens batch sources for file paths.
#[async_trait]
pub trait SourceLoader: Debug + Send + Sync {
    /// Opens the file at `path`.
    ///
    /// `chunk_size` is a hint for sources that can size their own batches.
    async fn open(
        &self,
        path: &str,
        format: Option<FileFormat>,
        chunk_size: usize,
    ) -> Result<Arc<dyn BatchSource>>;
}
