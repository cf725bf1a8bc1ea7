use std::collections::HashMap;
use std::io;

use arrow_array::ArrayRef;
use arrow_schema::{FieldRef, Fields};
use jsontab_error::{JsonTabError, JsonTabResult, jsontab_bail, jsontab_err};
use jsontab_io::{FileRange, ReadAt, SliceReadAt};
use log::{debug, warn};

use super::{ShapeScan, SourceRef};
use crate::coerce::ColumnBuilder;
use crate::resolve::locate_columns;
use crate::scan::JsonScanner;
use crate::table_type::TableType;

/// A forward cursor over the elements of one column's array literal.
struct ColumnCursor {
    source: SourceRef,
    range: FileRange,
    scanner: JsonScanner<SliceReadAt<SourceRef>>,
    first: bool,
    exhausted: bool,
    position: u64,
}

impl ColumnCursor {
    fn open(source: &SourceRef, range: FileRange) -> JsonTabResult<Self> {
        let window = SliceReadAt::try_new(source.clone(), range)?;
        let mut cursor = Self {
            source: source.clone(),
            range,
            scanner: JsonScanner::new(window).with_base_offset(range.offset),
            first: true,
            exhausted: false,
            position: 0,
        };
        cursor.rewind()?;
        Ok(cursor)
    }

    fn rewind(&mut self) -> JsonTabResult<()> {
        let len = self.source.size()?;
        if self.range.end() > len {
            return Err(JsonTabError::from(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                jsontab_err!("column range {} is past the end of a {len}-byte source", self.range),
            )));
        }
        self.scanner.seek(0)?;
        self.scanner.begin_array()?;
        self.first = true;
        self.exhausted = false;
        self.position = 0;
        Ok(())
    }

    /// Append up to `max` elements to `builder`, returning how many were appended.
    fn read_into(&mut self, max: usize, builder: &mut ColumnBuilder) -> JsonTabResult<usize> {
        let mut read = 0;
        while read < max && !self.exhausted {
            if !self.scanner.next_element(&mut self.first)? {
                self.exhausted = true;
                break;
            }
            builder.append_value(&self.scanner.read_value()?);
            read += 1;
        }
        self.position += read as u64;
        Ok(read)
    }
}

/// An independent cursor over one column of a column-major document, yielding arrays of up to
/// `batch_size` values.
pub struct ColumnReader {
    field: FieldRef,
    cursor: ColumnCursor,
    builder: ColumnBuilder,
    batch_size: usize,
}

impl ColumnReader {
    fn try_new(
        source: &SourceRef,
        field: FieldRef,
        range: FileRange,
        batch_size: usize,
    ) -> JsonTabResult<Self> {
        Ok(Self {
            cursor: ColumnCursor::open(source, range)?,
            builder: ColumnBuilder::try_new(field.data_type(), batch_size)?,
            field,
            batch_size,
        })
    }

    pub fn field(&self) -> &FieldRef {
        &self.field
    }

    /// The next array of at most `batch_size` values, or `None` at the end of the column.
    pub fn next_array(&mut self) -> JsonTabResult<Option<ArrayRef>> {
        if self.cursor.read_into(self.batch_size, &mut self.builder)? == 0 {
            return Ok(None);
        }
        self.builder.finish().map(Some)
    }

    /// Move back to the first value of the column.
    pub fn rewind(&mut self) -> JsonTabResult<()> {
        self.cursor.rewind()
    }

    /// Number of values read since the cursor was opened or last rewound.
    pub fn position(&self) -> u64 {
        self.cursor.position
    }

    pub fn coercion_failures(&self) -> u64 {
        self.builder.coercion_failures()
    }
}

impl Iterator for ColumnReader {
    type Item = JsonTabResult<ArrayRef>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_array().transpose()
    }
}

/// Reads `{"a": [1, 3], "b": [2, 4]}` with one cursor per column, zipping equal-length runs of
/// values into rows.
///
/// Columns of the schema that the document does not contain are filled with nulls.
pub(crate) struct ColumnObjectReader {
    fields: Fields,
    source: Option<SourceRef>,
    boundaries: HashMap<String, FileRange>,
    cursors: Vec<Option<ColumnCursor>>,
}

impl ColumnObjectReader {
    pub(super) fn new(fields: Fields) -> Self {
        Self {
            fields,
            source: None,
            boundaries: HashMap::new(),
            cursors: Vec::new(),
        }
    }

    pub(super) fn column_reader(
        &self,
        name: &str,
        batch_size: usize,
    ) -> JsonTabResult<ColumnReader> {
        let Some(source) = &self.source else {
            jsontab_bail!(InvalidState: "column cursors are available once the reader is prepared");
        };
        let Some(field) = self.fields.iter().find(|field| field.name() == name) else {
            jsontab_bail!("no column named \"{name}\"");
        };
        let Some(range) = self.boundaries.get(name) else {
            jsontab_bail!("column \"{name}\" does not appear in the document");
        };
        ColumnReader::try_new(source, field.clone(), *range, batch_size)
    }
}

impl ShapeScan for ColumnObjectReader {
    fn prepare(&mut self, source: &SourceRef, table_type: &TableType) -> JsonTabResult<()> {
        self.boundaries = if table_type.column_boundaries().is_empty() && !self.fields.is_empty() {
            debug!("locating columns of a hinted document");
            locate_columns(&mut JsonScanner::new(source.clone()))?
        } else {
            table_type.column_boundaries().clone()
        };

        self.cursors = self
            .fields
            .iter()
            .map(|field| match self.boundaries.get(field.name()) {
                Some(range) => ColumnCursor::open(source, *range).map(Some),
                None => {
                    warn!("column \"{}\" is not in the document, reading nulls", field.name());
                    Ok(None)
                }
            })
            .collect::<JsonTabResult<_>>()?;
        self.source = Some(source.clone());
        Ok(())
    }

    fn rewind(&mut self) -> JsonTabResult<()> {
        if self.source.is_none() {
            jsontab_bail!(InvalidState: "rewind before the cursors were opened");
        }
        self.cursors
            .iter_mut()
            .flatten()
            .try_for_each(ColumnCursor::rewind)
    }

    fn read_rows(
        &mut self,
        max_rows: usize,
        columns: &mut [ColumnBuilder],
    ) -> JsonTabResult<usize> {
        if self.source.is_none() {
            jsontab_bail!(InvalidState: "rows read before the cursors were opened");
        }

        let mut rows: Option<usize> = None;
        let cursors = self.fields.iter().zip(&mut self.cursors);
        for ((field, cursor), column) in cursors.zip(columns.iter_mut()) {
            let Some(cursor) = cursor else {
                continue;
            };
            let read = cursor.read_into(max_rows, column)?;
            match rows {
                None => rows = Some(read),
                Some(rows) if rows != read => jsontab_bail!(
                    UnrecognizedShape: "column \"{}\" yielded {read} values, others {rows}",
                    field.name()
                ),
                Some(_) => {}
            }
        }

        let rows = rows.unwrap_or(0);
        for (cursor, column) in self.cursors.iter().zip(columns.iter_mut()) {
            if cursor.is_none() {
                column.append_nulls(rows);
            }
        }
        Ok(rows)
    }
}
