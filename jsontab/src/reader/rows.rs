use jsontab_error::{JsonTabResult, jsontab_bail};
use serde_json::Value;

use super::SourceRef;
use crate::coerce::ColumnBuilder;
use crate::scan::JsonScanner;

/// A forward cursor over the elements of a top-level array.
pub(super) struct RowCursor {
    scanner: JsonScanner<SourceRef>,
    first: bool,
    exhausted: bool,
}

impl RowCursor {
    pub(super) fn open(source: SourceRef) -> JsonTabResult<Self> {
        let mut cursor = Self {
            scanner: JsonScanner::new(source),
            first: true,
            exhausted: false,
        };
        cursor.rewind()?;
        Ok(cursor)
    }

    pub(super) fn rewind(&mut self) -> JsonTabResult<()> {
        self.scanner.seek(0)?;
        self.scanner.begin_array()?;
        self.first = true;
        self.exhausted = false;
        Ok(())
    }

    pub(super) fn next_row(&mut self) -> JsonTabResult<Option<Value>> {
        if self.exhausted {
            return Ok(None);
        }
        if !self.scanner.next_element(&mut self.first)? {
            self.exhausted = true;
            return Ok(None);
        }
        self.scanner.read_value().map(Some)
    }
}

/// Read rows from `cursor` until `max_rows` have been appended or the rows run out.
pub(super) fn read_rows_with(
    cursor: Option<&mut RowCursor>,
    max_rows: usize,
    columns: &mut [ColumnBuilder],
    mut append_row: impl FnMut(Value, &mut [ColumnBuilder]),
) -> JsonTabResult<usize> {
    let Some(cursor) = cursor else {
        jsontab_bail!(InvalidState: "rows read before the cursor was opened");
    };
    let mut rows = 0;
    while rows < max_rows {
        match cursor.next_row()? {
            Some(row) => append_row(row, columns),
            None => break,
        }
        rows += 1;
    }
    Ok(rows)
}
