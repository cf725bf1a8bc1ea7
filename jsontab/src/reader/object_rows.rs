use arrow_schema::SchemaRef;
use jsontab_error::{JsonTabResult, jsontab_bail};
use serde_json::Value;

use super::rows::{RowCursor, read_rows_with};
use super::{ShapeScan, SourceRef};
use crate::coerce::ColumnBuilder;
use crate::table_type::TableType;

/// Reads `[{"a": 1, "b": 2}, ...]`, matching object fields to columns by name.
pub(crate) struct ObjectRowsReader {
    names: Vec<String>,
    cursor: Option<RowCursor>,
}

impl ObjectRowsReader {
    pub(super) fn new(schema: &SchemaRef) -> Self {
        Self {
            names: schema.fields().iter().map(|f| f.name().clone()).collect(),
            cursor: None,
        }
    }
}

impl ShapeScan for ObjectRowsReader {
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
        let names = &self.names;
        read_rows_with(self.cursor.as_mut(), max_rows, columns, |row, columns| {
            match row {
                Value::Object(fields) => {
                    for (name, column) in names.iter().zip(columns.iter_mut()) {
                        match fields.get(name) {
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
