//! File sources streamed through DataFusion.
//!
//! DataFusion does the parsing; this module only opens a streaming scan with
//! the configured batch size, so a file is never materialized in memory.
//!
//! Scans run as a single partition without file-range splitting. Row offsets
//! are counted in emission order, so rows must come out in file order and in
//! the same order on every pass.

use super::{BatchSource, RecordBatchStream, SourceLoader, SourceMetadata};
use crate::config::FileFormat;
use crate::error::{GuardError, Result};
use async_trait::async_trait;
use datafusion::prelude::*;
use futures::StreamExt;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, instrument};

/// A CSV, Parquet or NDJSON file read through DataFusion.
///
/// Every call to `open_batches` starts an independent scan of the file, so
/// the source is replayable as long as the file does not change between
/// passes.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: String,
    format: FileFormat,
    chunk_size: usize,
}

impl FileSource {
    /// Creates a source for `path`.
    pub fn new(path: impl Into<String>, format: FileFormat, chunk_size: usize) -> Self {
        Self {
            path: path.into(),
            format,
            chunk_size: chunk_size.max(1),
        }
    }

    /// The file format.
    pub fn format(&self) -> FileFormat {
        self.format
    }

    fn session(&self) -> SessionContext {
        SessionContext::new_with_config(scan_config(self.chunk_size))
    }

    fn extension(&self) -> String {
        Path::new(&self.path)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{e}"))
            .unwrap_or_default()
    }

    async fn data_frame(&self, ctx: &SessionContext) -> Result<DataFrame> {
        let extension = self.extension();
        let df = match self.format {
            FileFormat::Csv => {
                let options = CsvReadOptions::new()
                    .has_header(true)
                    .file_extension(&extension);
                ctx.read_csv(self.path.as_str(), options).await
            }
            FileFormat::Parquet => {
                ctx.read_parquet(self.path.as_str(), ParquetReadOptions::default())
                    .await
            }
            FileFormat::Json => {
                let options = NdJsonReadOptions::default().file_extension(&extension);
                ctx.read_json(self.path.as_str(), options).await
            }
        };
        df.map_err(|e| {
            GuardError::source_with_source(&self.path, "failed to open file", Box::new(e))
        })
    }

    /// Starts a scan of the file within `ctx`.
    async fn stream(&self, ctx: &SessionContext) -> Result<RecordBatchStream> {
        let df = self.data_frame(ctx).await?;
        let stream = df.execute_stream().await.map_err(|e| {
            GuardError::source_with_source(&self.path, "failed to start scan", Box::new(e))
        })?;
        Ok(stream.map(|batch| batch.map_err(GuardError::from)).boxed())
    }
}

#[async_trait]
impl BatchSource for FileSource {
    fn name(&self) -> &str {
        &self.path
    }

    #[instrument(skip(self), fields(file = %self.path, format = %self.format))]
    async fn metadata(&self) -> Result<SourceMetadata> {
        let ctx = self.session();
        let df = self.data_frame(&ctx).await?;
        let columns = df
            .schema()
            .fields()
            .iter()
            .map(|f| f.name().clone())
            .collect();
        Ok(SourceMetadata {
            columns,
            row_count: None,
            format: self.format.to_string(),
        })
    }

    async fn open_batches(&self) -> Result<RecordBatchStream> {
        debug!(file = %self.path, chunk_size = self.chunk_size, "Opening file scan");
        self.stream(&self.session()).await
    }
}

/// Session settings for an order-preserving scan.
fn scan_config(chunk_size: usize) -> SessionConfig {
    SessionConfig::new()
        .with_batch_size(chunk_size)
        .with_target_partitions(1)
        .with_repartition_file_scans(false)
        .with_round_robin_repartition(false)
}

/// Opens [`FileSource`]s, inferring the format from the extension when needed.
#[derive(Debug, Default, Clone)]
pub struct DataFusionLoader;

impl DataFusionLoader {
    /// Creates a loader.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SourceLoader for DataFusionLoader {
    async fn open(
        &self,
        path: &str,
        format: Option<FileFormat>,
        chunk_size: usize,
    ) -> Result<Arc<dyn BatchSource>> {
        let format = format
            .or_else(|| FileFormat::from_path(path))
            .ok_or_else(|| GuardError::source(path, "cannot infer file format from extension"))?;
        if !Path::new(path).exists() {
            return Err(GuardError::source(path, "file does not exist"));
        }
        Ok(Arc::new(FileSource::new(path, format, chunk_size)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::BatchCursor;
    use arrow::array::AsArray;
    use arrow::datatypes::Int64Type;
    use std::io::{BufWriter, Write};

    fn write_csv(rows: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        file.write_all(rows.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[tokio::test]
    async fn test_csv_source_streams_bounded_batches() {
        let mut body = String::from("id,name\n");
        for i in 0..25 {
            body.push_str(&format!("{i},name{i}\n"));
        }
        let file = write_csv(&body);
        let path = file.path().to_str().unwrap().to_string();

        let source = DataFusionLoader::new()
            .open(&path, None, 10)
            .await
            .unwrap();
        let metadata = source.metadata().await.unwrap();
        assert_eq!(metadata.columns, vec!["id", "name"]);
        assert_eq!(metadata.format, "csv");

        let mut cursor = BatchCursor::new(source.open_batches().await.unwrap(), 10);
        let mut total = 0;
        while let Some(batch) = cursor.next_batch().await {
            let batch = batch.unwrap();
            assert!(batch.num_rows() <= 10);
            total += batch.num_rows();
        }
        assert_eq!(total, 25);
    }

    #[tokio::test]
    async fn test_large_csv_streams_in_file_order() {
        // Large enough for DataFusion to split the file into byte ranges.
        let file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        {
            let mut writer = BufWriter::new(file.as_file());
            writeln!(writer, "id,payload").unwrap();
            for i in 0..500_000i64 {
                writeln!(writer, "{i},row-payload-padding-{i:08}").unwrap();
            }
            writer.flush().unwrap();
        }
        assert!(file.as_file().metadata().unwrap().len() > 10 * 1024 * 1024);

        let source = FileSource::new(file.path().to_str().unwrap(), FileFormat::Csv, 4096);
        let ctx = SessionContext::new_with_config(scan_config(4096).with_target_partitions(4));
        let mut cursor = BatchCursor::new(source.stream(&ctx).await.unwrap(), 4096);
        let mut expected = 0i64;
        while let Some(batch) = cursor.next_batch().await {
            let batch = batch.unwrap();
            let ids = batch.record_batch().column(0).as_primitive::<Int64Type>();
            for id in ids.values().iter() {
                assert_eq!(*id, expected, "row {expected} emitted out of file order");
                expected += 1;
            }
        }
        assert_eq!(expected, 500_000);
        assert_eq!(cursor.rows_emitted(), 500_000);
    }

    #[tokio::test]
    async fn test_missing_file_is_a_source_error() {
        let err = DataFusionLoader::new()
            .open("/definitely/not/here.csv", None, 10)
            .await
            .err()
            .unwrap();
        assert_eq!(err.kind(), crate::error::ErrorKind::Source);
    }

    #[tokio::test]
    async fn test_unknown_extension_needs_explicit_format() {
        let err = DataFusionLoader::new()
            .open("workbook.xlsx", None, 10)
            .await
            .err()
            .unwrap();
        assert!(err.to_string().contains("cannot infer file format"));
    }
}
