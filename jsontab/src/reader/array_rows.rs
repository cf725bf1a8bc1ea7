use jsontab_error::{JsonTabResult, jsontab_bail};
use serde_json::Value;

use super::rows::{RowCursor, read_rows_with};
use super::{ShapeScan, SourceRef};
use crate::coerce::ColumnBuilder;
use crate::table_type::TableType;

/// Reads `[[1, 2], [3, 4], ...]`, matching array positions to columns.
///
/// Short rows are padded with nulls. Positions past the last column are ignored.
pub(crate) struct ArrayRowsReader {
    cursor: Option<RowCursor>,
}

impl ArrayRowsReader {
    pub(super) fn new() -> Self {
        Self { cursor: None }
    }
}

impl ShapeScan for ArrayRowsReader {
    fn prepare(&mut self, source: &SourceRef, _table_type: &TableType) -> JsonTabResult<()> {
        self.cursor = Some(RowCursor::open(source.clone())?);
        Ok(())
    }

    fn rewind(&mut self) -> JsonTabResult<()> {
        match self.cursor.as_mut() {
            Some(cursor) => cursor.rewind(),
            None => jsontab_bail!(InvalidState: "rewind before the cursor was opened"),
        }
    }

    fn read_rows(
        &mut self,
        max_rows: usize,
        columns: &mut [ColumnBuilder],
    ) -> JsonTabResult<usize> {
        read_rows_with(self.cursor.as_mut(), max_rows, columns, |row, columns| {
            match row {
                Value::Array(items) => {
                    for (idx, column) in columns.iter_mut().enumerate() {
                        match items.get(idx) {
                            Some(value) => column.append_value(value),
                            None => column.append_null(),
                        }
                    }
                }
                Value::Null => columns.iter_mut().for_each(ColumnBuilder::append_null),
                _ => columns
                    .iter_mut()
                    .for_each(ColumnBuilder::append_uncoercible),
            }
        })
    }
}
