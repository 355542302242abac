//! Re-slicing of raw record batches into bounded, positioned batches.

use super::RecordBatchStream;
use crate::batch::Batch;
use crate::error::Result;
use arrow::record_batch::RecordBatch;
use futures::StreamExt;

/// Walks a record batch stream and yields [`Batch`]es of at most
/// `chunk_size` rows, numbering them and tracking absolute row offsets.
///
/// Empty record batches are skipped and never produce a [`Batch`].
pub struct BatchCursor {
    inner: RecordBatchStream,
    chunk_size: usize,
    pending: Option<(RecordBatch, usize)>,
    next_offset: u64,
    next_sequence: u64,
}

impl BatchCursor {
    /// Creates a cursor over `inner`. A `chunk_size` of zero is treated as one.
    pub fn new(inner: RecordBatchStream, chunk_size: usize) -> Self {
        Self {
            inner,
            chunk_size: chunk_size.max(1),
            pending: None,
            next_offset: 0,
            next_sequence: 0,
        }
    }

    /// Returns the next batch, `None` at end of data.
    pub async fn next_batch(&mut self) -> Option<Result<Batch>> {
        loop {
            if let Some((data, start)) = self.pending.take() {
                let len = (data.num_rows() - start).min(self.chunk_size);
                let slice = data.slice(start, len);
                if start + len < data.num_rows() {
                    self.pending = Some((data, start + len));
                }
                let batch = Batch::new(slice, self.next_offset, self.next_sequence);
                self.next_offset += len as u64;
                self.next_sequence += 1;
                return Some(Ok(batch));
            }

            match self.inner.next().await? {
                Err(e) => return Some(Err(e)),
                Ok(data) if data.num_rows() == 0 => continue,
                Ok(data) => self.pending = Some((data, 0)),
            }
        }
    }

    /// Rows handed out so far.
    pub fn rows_emitted(&self) -> u64 {
        self.next_offset
    }

    /// Batches handed out so far.
    pub fn batches_emitted(&self) -> u64 {
        self.next_sequence
    }
}

impl std::fmt::Debug for BatchCursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchCursor")
            .field("chunk_size", &self.chunk_size)
            .field("next_offset", &self.next_offset)
            .field("next_sequence", &self.next_sequence)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{ArrayRef, Int64Array};
    use std::sync::Arc;

    fn ints(values: std::ops::Range<i64>) -> RecordBatch {
        let array: ArrayRef = Arc::new(Int64Array::from_iter_values(values));
        RecordBatch::try_from_iter(vec![("v", array)]).unwrap()
    }

    #[tokio::test]
    async fn test_cursor_slices_and_numbers_batches() {
        let raw = vec![Ok(ints(0..5)), Ok(ints(5..5)), Ok(ints(5..7))];
        let stream = futures::stream::iter(raw).boxed();
        let mut cursor = BatchCursor::new(stream, 2);

        let mut seen = Vec::new();
        while let Some(batch) = cursor.next_batch().await {
            let batch = batch.unwrap();
            seen.push((batch.sequence(), batch.row_offset(), batch.num_rows()));
        }

        assert_eq!(
            seen,
            vec![(0, 0, 2), (1, 2, 2), (2, 4, 1), (3, 5, 2)]
        );
        assert_eq!(cursor.rows_emitted(), 7);
        assert_eq!(cursor.batches_emitted(), 4);
    }

    #[tokio::test]
    async fn test_cursor_propagates_errors() {
        let raw = vec![
            Ok(ints(0..1)),
            Err(crate::error::GuardError::Internal("disk gone".to_string())),
        ];
        let mut cursor = BatchCursor::new(futures::stream::iter(raw).boxed(), 10);
        assert!(cursor.next_batch().await.unwrap().is_ok());
        assert!(cursor.next_batch().await.unwrap().is_err());
    }
}
