//! The unit of streaming work: a bounded slice of rows.
//!
//! A [`Batch`] wraps an Arrow [`RecordBatch`] together with its position in the
//! file. Rules only ever see `&Batch` and must not keep it past their
//! `observe` call, which is what lets the engine drop each batch as soon as
//! every rule has looked at it.

use arrow::array::{Array, ArrayRef, AsArray};
use arrow::datatypes::{
    DataType, Int16Type, Int32Type, Int64Type, Int8Type, SchemaRef, UInt16Type, UInt32Type,
    UInt64Type, UInt8Type,
};
use arrow::record_batch::RecordBatch;
use std::borrow::Cow;
use std::fmt;

/// A bounded, read-only slice of rows.
#[derive(Debug, Clone)]
pub struct Batch {
    data: RecordBatch,
    row_offset: u64,
    sequence: u64,
}

impl Batch {
    /// Wraps a record batch whose first row sits at `row_offset` in the file.
    pub fn new(data: RecordBatch, row_offset: u64, sequence: u64) -> Self {
        Self {
            data,
            row_offset,
            sequence,
        }
    }

    /// Number of rows in the batch.
    pub fn num_rows(&self) -> usize {
        self.data.num_rows()
    }

    /// Absolute zero-based offset of the first row.
    pub fn row_offset(&self) -> u64 {
        self.row_offset
    }

    /// Zero-based position of this batch in the scan.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// The underlying Arrow data.
    pub fn record_batch(&self) -> &RecordBatch {
        &self.data
    }

    /// The batch schema.
    pub fn schema(&self) -> SchemaRef {
        self.data.schema()
    }

    /// Column names in schema order.
    pub fn column_names(&self) -> Vec<String> {
        self.data
            .schema()
            .fields()
            .iter()
            .map(|f| f.name().clone())
            .collect()
    }

    /// Returns true if the batch has a column with this name.
    pub fn has_column(&self, name: &str) -> bool {
        self.data.schema().index_of(name).is_ok()
    }

    /// Looks up a column by name.
    pub fn column(&self, name: &str) -> Option<Column<'_>> {
        let index = self.data.schema().index_of(name).ok()?;
        Some(Column {
            array: self.data.column(index),
        })
    }

    /// Absolute offset of a row given its index within the batch.
    pub fn absolute_row(&self, row: usize) -> u64 {
        self.row_offset + row as u64
    }
}

/// A borrowed view of one column of a [`Batch`].
#[derive(Debug, Clone, Copy)]
pub struct Column<'a> {
    array: &'a ArrayRef,
}

impl<'a> Column<'a> {
    /// Number of values in the column.
    pub fn len(&self) -> usize {
        self.array.len()
    }

    /// Returns true if the column holds no values.
    pub fn is_empty(&self) -> bool {
        self.array.is_empty()
    }

    /// The Arrow type of the column.
    pub fn data_type(&self) -> &DataType {
        self.array.data_type()
    }

    /// Returns true if the value at `row` is null.
    pub fn is_null(&self, row: usize) -> bool {
        self.array.is_null(row)
    }

    /// Reads the value at `row`.
    pub fn value(&self, row: usize) -> CellValue<'a> {
        let array = self.array;
        if array.is_null(row) {
            return CellValue::Null;
        }
        match array.data_type() {
            DataType::Boolean => CellValue::Bool(array.as_boolean().value(row)),
            DataType::Int8 => CellValue::Int(array.as_primitive::<Int8Type>().value(row) as i64),
            DataType::Int16 => CellValue::Int(array.as_primitive::<Int16Type>().value(row) as i64),
            DataType::Int32 => CellValue::Int(array.as_primitive::<Int32Type>().value(row) as i64),
            DataType::Int64 => CellValue::Int(array.as_primitive::<Int64Type>().value(row)),
            DataType::UInt8 => {
                CellValue::UInt(array.as_primitive::<UInt8Type>().value(row) as u64)
            }
            DataType::UInt16 => {
                CellValue::UInt(array.as_primitive::<UInt16Type>().value(row) as u64)
            }
            DataType::UInt32 => {
                CellValue::UInt(array.as_primitive::<UInt32Type>().value(row) as u64)
            }
            DataType::UInt64 => CellValue::UInt(array.as_primitive::<UInt64Type>().value(row)),
            DataType::Float32 => CellValue::Float(
                array
                    .as_primitive::<arrow::datatypes::Float32Type>()
                    .value(row) as f64,
            ),
            DataType::Float64 => CellValue::Float(
                array
                    .as_primitive::<arrow::datatypes::Float64Type>()
                    .value(row),
            ),
            DataType::Utf8 => CellValue::Text(Cow::Borrowed(array.as_string::<i32>().value(row))),
            DataType::LargeUtf8 => {
                CellValue::Text(Cow::Borrowed(array.as_string::<i64>().value(row)))
            }
            DataType::Utf8View => CellValue::Text(Cow::Borrowed(array.as_string_view().value(row))),
            // Dates, timestamps, decimals and friends are compared by their display form.
            _ => match arrow::util::display::array_value_to_string(array.as_ref(), row) {
                Ok(text) => CellValue::Text(Cow::Owned(text)),
                Err(_) => CellValue::Null,
            },
        }
    }
}

/// A single cell read out of a batch.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue<'a> {
    /// Null or missing
    Null,
    /// Boolean value
    Bool(bool),
    /// Signed integer
    Int(i64),
    /// Unsigned integer
    UInt(u64),
    /// Floating point number
    Float(f64),
    /// Text, borrowed from the batch where possible
    Text(Cow<'a, str>),
}

impl CellValue<'_> {
    /// Returns true for [`CellValue::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    /// Numeric value for numeric cells; text and booleans yield `None`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Int(v) => Some(*v as f64),
            CellValue::UInt(v) => Some(*v as f64),
            CellValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Numeric value, parsing text cells when necessary.
    pub fn parse_f64(&self) -> Option<f64> {
        match self {
            CellValue::Text(text) => text.trim().parse::<f64>().ok(),
            other => other.as_f64(),
        }
    }

    /// The text of a text cell.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            CellValue::Text(text) => Some(text.as_ref()),
            _ => None,
        }
    }

    /// Canonical text used for key matching across files; `None` for nulls.
    ///
    /// Integral floats render without a fraction (`1.0` → `"1"`), so an
    /// integer key in one file matches a float-typed key in another.
    pub fn key_string(&self) -> Option<String> {
        match self {
            CellValue::Null => None,
            other => Some(other.to_string()),
        }
    }
}

impl fmt::Display for CellValue<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Null => f.write_str("null"),
            CellValue::Bool(v) => write!(f, "{v}"),
            CellValue::Int(v) => write!(f, "{v}"),
            CellValue::UInt(v) => write!(f, "{v}"),
            CellValue::Float(v) => write!(f, "{v}"),
            CellValue::Text(v) => f.write_str(v),
        }
    }
}
