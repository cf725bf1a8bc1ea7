//! Reading a resolved document as a sequence of record batches.

mod array_rows;
mod column_object;
mod object_rows;
mod rows;

use std::io;
use std::sync::Arc;

use arrow_array::{RecordBatch, RecordBatchOptions, RecordBatchReader};
use arrow_schema::{ArrowError, SchemaRef};
pub use column_object::ColumnReader;
use jsontab_error::{JsonTabError, JsonTabResult, jsontab_bail, jsontab_err};
use jsontab_io::ReadAt;
use log::{debug, trace};

use self::array_rows::ArrayRowsReader;
use self::column_object::ColumnObjectReader;
use self::object_rows::ObjectRowsReader;
use crate::coerce::ColumnBuilder;
use crate::table_type::{TableShape, TableType, nullable_schema};

/// Number of rows per batch unless configured otherwise.
pub const DEFAULT_BATCH_SIZE: usize = 1024;

/// A shared handle to the bytes of a document.
pub type SourceRef = Arc<dyn ReadAt>;

/// One strategy for turning the rows of a document into column values.
pub(crate) trait ShapeScan {
    /// Open the cursor(s) over `source`.
    fn prepare(&mut self, source: &SourceRef, table_type: &TableType) -> JsonTabResult<()>;

    /// Move back to the first row.
    fn rewind(&mut self) -> JsonTabResult<()>;

    /// Append up to `max_rows` rows to `columns`, returning how many were appended.
    fn read_rows(&mut self, max_rows: usize, columns: &mut [ColumnBuilder])
    -> JsonTabResult<usize>;
}

pub(crate) enum ShapeReader {
    ArrayOfObjects(ObjectRowsReader),
    ArrayOfArrays(ArrayRowsReader),
    ObjectOfArrays(ColumnObjectReader),
}

impl ShapeReader {
    fn try_new(table_type: &TableType, schema: &SchemaRef) -> JsonTabResult<Self> {
        Ok(match table_type.shape() {
            TableShape::ArrayOfObjects => Self::ArrayOfObjects(ObjectRowsReader::new(schema)),
            TableShape::ArrayOfArrays => Self::ArrayOfArrays(ArrayRowsReader::new()),
            TableShape::ObjectOfArrays => {
                Self::ObjectOfArrays(ColumnObjectReader::new(schema.fields().clone()))
            }
            TableShape::Unrecognized => {
                jsontab_bail!("cannot read a document of unrecognized shape")
            }
        })
    }

    fn as_scan(&mut self) -> &mut dyn ShapeScan {
        match self {
            Self::ArrayOfObjects(reader) => reader,
            Self::ArrayOfArrays(reader) => reader,
            Self::ObjectOfArrays(reader) => reader,
        }
    }
}

/// Where a [`TableReader`] is in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReaderState {
    /// Constructed; [`TableReader::prepare`] has not been called.
    Resolved,
    /// Batches can be pulled.
    Ready,
    /// A positioning or read error occurred. No further calls succeed.
    Unusable,
}

/// Reads a JSON document of a resolved [`TableType`] as Arrow record batches.
///
/// Construct one with [`TableReader::resolve`] or
/// [`TableReaderOptions`][crate::TableReaderOptions], call [`TableReader::prepare`], then pull
/// batches with [`TableReader::next_batch`] or by iterating. [`TableReader::rewind`] restarts
/// from the first row at any point after preparing.
pub struct TableReader {
    source: SourceRef,
    source_len: u64,
    table_type: TableType,
    schema: SchemaRef,
    batch_size: usize,
    shape: ShapeReader,
    columns: Vec<ColumnBuilder>,
    state: ReaderState,
}

impl TableReader {
    /// Resolve the table type of `source`, or take it from `hint`, and build a reader for it.
    pub fn resolve(
        source: SourceRef,
        hint: Option<TableType>,
        batch_size: usize,
    ) -> JsonTabResult<Self> {
        let options = crate::TableReaderOptions::from_arc(source).with_batch_size(batch_size);
        match hint {
            Some(hint) => options.with_table_type(hint),
            None => options,
        }
        .resolve()
    }

    pub(crate) fn try_new(
        source: SourceRef,
        table_type: TableType,
        batch_size: usize,
    ) -> JsonTabResult<Self> {
        if batch_size == 0 {
            jsontab_bail!("batch size must be positive");
        }
        let schema = match table_type.schema() {
            Some(schema) => nullable_schema(schema),
            None => jsontab_bail!("cannot read a document of unrecognized shape"),
        };
        let shape = ShapeReader::try_new(&table_type, &schema)?;
        let columns = schema
            .fields()
            .iter()
            .map(|field| {
                ColumnBuilder::try_new(field.data_type(), batch_size)
                    .map_err(|err| err.with_context(format!("column \"{}\"", field.name())))
            })
            .collect::<JsonTabResult<Vec<_>>>()?;
        let source_len = source.size()?;

        Ok(Self {
            source,
            source_len,
            table_type,
            schema,
            batch_size,
            shape,
            columns,
            state: ReaderState::Resolved,
        })
    }

    /// The schema of every batch this reader produces.
    #[allow(clippy::same_name_method)]
    pub fn schema(&self) -> SchemaRef {
        self.schema.clone()
    }

    pub fn table_type(&self) -> &TableType {
        &self.table_type
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn state(&self) -> ReaderState {
        self.state
    }

    /// Open the reader's cursors. Calling it again once it succeeded does nothing.
    pub fn prepare(&mut self) -> JsonTabResult<()> {
        match self.state {
            ReaderState::Ready => return Ok(()),
            ReaderState::Unusable => jsontab_bail!(InvalidState: "reader failed earlier"),
            ReaderState::Resolved => {}
        }

        let result = self.check_source().and_then(|()| {
            self.shape
                .as_scan()
                .prepare(&self.source, &self.table_type)
        });
        self.guard(result)?;
        debug!("prepared {} reader", self.table_type.shape());
        self.state = ReaderState::Ready;
        Ok(())
    }

    /// Restart from the first row. Schema and column boundaries are kept.
    pub fn rewind(&mut self) -> JsonTabResult<()> {
        self.ensure_ready("rewind")?;
        let result = self
            .check_source()
            .and_then(|()| self.shape.as_scan().rewind());
        self.guard(result)?;
        debug!("rewound {} reader", self.table_type.shape());
        Ok(())
    }

    /// The next batch of at most [`TableReader::batch_size`] rows, or `None` once every row has
    /// been read.
    pub fn next_batch(&mut self) -> JsonTabResult<Option<RecordBatch>> {
        self.ensure_ready("read a batch")?;
        let result = self.read_batch();
        self.guard(result)
    }

    /// Number of cells written as null because their value could not be coerced.
    pub fn coercion_failures(&self) -> u64 {
        self.columns
            .iter()
            .map(ColumnBuilder::coercion_failures)
            .sum()
    }

    /// An independent cursor over one column of a column-major document.
    ///
    /// The cursor shares nothing with this reader or with other column cursors besides the
    /// underlying source, so it can be advanced and rewound on its own.
    pub fn column(&self, name: &str) -> JsonTabResult<ColumnReader> {
        self.ensure_ready("open a column")?;
        match &self.shape {
            ShapeReader::ObjectOfArrays(reader) => reader.column_reader(name, self.batch_size),
            _ => jsontab_bail!(
                "column cursors require a {} document, not {}",
                TableShape::ObjectOfArrays,
                self.table_type.shape()
            ),
        }
    }

    fn read_batch(&mut self) -> JsonTabResult<Option<RecordBatch>> {
        let rows = self
            .shape
            .as_scan()
            .read_rows(self.batch_size, &mut self.columns)?;
        if rows == 0 {
            return Ok(None);
        }

        let arrays = self
            .columns
            .iter_mut()
            .map(ColumnBuilder::finish)
            .collect::<JsonTabResult<Vec<_>>>()?;
        let batch = RecordBatch::try_new_with_options(
            self.schema.clone(),
            arrays,
            &RecordBatchOptions::new().with_row_count(Some(rows)),
        )?;
        trace!("read a batch of {rows} rows");
        Ok(Some(batch))
    }

    fn ensure_ready(&self, action: &str) -> JsonTabResult<()> {
        match self.state {
            ReaderState::Ready => Ok(()),
            ReaderState::Resolved => {
                jsontab_bail!(InvalidState: "cannot {action} before the reader is prepared")
            }
            ReaderState::Unusable => {
                jsontab_bail!(InvalidState: "cannot {action}, the reader failed earlier")
            }
        }
    }

    /// Fail if the source is shorter than it was when the reader was built.
    fn check_source(&self) -> JsonTabResult<()> {
        let len = self.source.size()?;
        if len < self.source_len {
            return Err(JsonTabError::from(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                jsontab_err!(
                    "source shrank from {} to {len} bytes since it was resolved",
                    self.source_len
                ),
            )));
        }
        Ok(())
    }

    fn guard<T>(&mut self, result: JsonTabResult<T>) -> JsonTabResult<T> {
        if result.is_err() {
            self.state = ReaderState::Unusable;
        }
        result
    }
}

/// Iterating prepares the reader if needed and stops after the first error.
impl Iterator for TableReader {
    type Item = Result<RecordBatch, ArrowError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.state {
            ReaderState::Unusable => return None,
            ReaderState::Resolved => {
                if let Err(err) = self.prepare() {
                    return Some(Err(err.into()));
                }
            }
            ReaderState::Ready => {}
        }
        self.next_batch().map_err(ArrowError::from).transpose()
    }
}

impl RecordBatchReader for TableReader {
    fn schema(&self) -> SchemaRef {
        self.schema.clone()
    }
}
