//! The first pass over a document: classify its shape, infer a schema and locate columns.

use std::collections::HashMap;
use std::mem;
use std::sync::Arc;

use arrow_schema::{Field, Fields, Schema};
use jsontab_error::{JsonTabResult, jsontab_bail, jsontab_err};
use jsontab_io::{FileRange, ReadAt};
use log::{debug, warn};
use serde_json::Value;

use crate::infer::{ColumnTypes, JsonType};
use crate::scan::{JsonScanner, ValueKind};
use crate::table_type::{TableShape, TableType};

/// The outcome of resolving a document.
#[derive(Debug)]
pub struct Resolution {
    pub table_type: TableType,
    /// Number of rows in the table. Zero for unrecognized documents.
    pub rows: u64,
    /// Why the document was not recognized, if it wasn't.
    pub reason: Option<String>,
}

impl Resolution {
    fn recognized(shape: TableShape, fields: Fields, rows: u64) -> JsonTabResult<Self> {
        Ok(Self {
            table_type: TableType::try_new(shape, Arc::new(Schema::new(fields)))?,
            rows,
            reason: None,
        })
    }

    fn unrecognized(reason: String) -> Self {
        Self {
            table_type: TableType::unrecognized(),
            rows: 0,
            reason: Some(reason),
        }
    }
}

/// Infers the [`TableType`] of a document in one forward scan.
///
/// Every byte of the document is validated, but only the first `inference_row_limit` rows (or
/// column elements) are decoded to infer types. The rest are checked structurally.
#[derive(Clone, Debug, Default)]
pub struct Resolver {
    inference_row_limit: Option<u64>,
    column_names: Option<Vec<String>>,
}

/// How the rows of a row-major document look so far.
enum RowLayout {
    Empty,
    Objects(ColumnTypes),
    Arrays { arity: u64, types: Vec<JsonType> },
    Unrecognized(String),
}

impl Resolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_inference_row_limit(mut self, limit: Option<u64>) -> Self {
        self.inference_row_limit = limit;
        self
    }

    /// Names for the columns of an array-of-arrays document, in position order.
    pub fn with_column_names(mut self, names: Option<Vec<String>>) -> Self {
        self.column_names = names;
        self
    }

    pub fn resolve<R: ReadAt>(&self, source: R) -> JsonTabResult<Resolution> {
        let mut scanner = JsonScanner::new(source);
        let resolution = match scanner.peek_kind()? {
            None => jsontab_bail!(InvalidJson: 0, "empty document"),
            Some(ValueKind::Array) => self.resolve_rows(&mut scanner)?,
            Some(ValueKind::Object) => self.resolve_columns(&mut scanner)?,
            Some(kind) => {
                scanner.skip_value()?;
                Resolution::unrecognized(format!("top-level value is a {kind}"))
            }
        };
        scanner.finish()?;

        match &resolution.reason {
            None => debug!(
                "resolved {} table with {} columns and {} rows",
                resolution.table_type.shape(),
                resolution
                    .table_type
                    .schema()
                    .map_or(0, |schema| schema.fields().len()),
                resolution.rows
            ),
            Some(reason) => debug!("document is not a table: {reason}"),
        }
        Ok(resolution)
    }

    fn infers(&self, index: u64) -> bool {
        self.inference_row_limit.is_none_or(|limit| index < limit)
    }

    fn resolve_rows<R: ReadAt>(&self, scanner: &mut JsonScanner<R>) -> JsonTabResult<Resolution> {
        scanner.begin_array()?;
        let mut layout = RowLayout::Empty;
        let mut rows = 0u64;
        let mut first = true;
        while scanner.next_element(&mut first)? {
            layout = self.observe_row(scanner, layout, rows)?;
            rows += 1;
        }

        match layout {
            RowLayout::Empty => {
                Resolution::recognized(TableShape::ArrayOfObjects, Fields::empty(), 0)
            }
            RowLayout::Objects(columns) => {
                Resolution::recognized(TableShape::ArrayOfObjects, columns.into_fields(), rows)
            }
            RowLayout::Arrays { arity, types } => {
                let fields = self
                    .positional_names(arity)?
                    .into_iter()
                    .zip(types)
                    .map(|(name, ty)| Field::new(name, ty.to_arrow(), true))
                    .collect();
                Resolution::recognized(TableShape::ArrayOfArrays, fields, rows)
            }
            RowLayout::Unrecognized(reason) => Ok(Resolution::unrecognized(reason)),
        }
    }

    fn observe_row<R: ReadAt>(
        &self,
        scanner: &mut JsonScanner<R>,
        layout: RowLayout,
        row: u64,
    ) -> JsonTabResult<RowLayout> {
        match (layout, scanner.peek_kind()?) {
            (RowLayout::Unrecognized(reason), _) => {
                scanner.skip_value()?;
                Ok(RowLayout::Unrecognized(reason))
            }
            (RowLayout::Empty, Some(ValueKind::Object)) => {
                self.observe_object(scanner, ColumnTypes::default(), row)
            }
            (RowLayout::Objects(columns), Some(ValueKind::Object)) => {
                self.observe_object(scanner, columns, row)
            }
            (RowLayout::Empty, Some(ValueKind::Array)) => self.observe_array(scanner, None, row),
            (RowLayout::Arrays { arity, types }, Some(ValueKind::Array)) => {
                self.observe_array(scanner, Some((arity, types)), row)
            }
            (_, kind) => {
                scanner.skip_value()?;
                Ok(RowLayout::Unrecognized(format!(
                    "element {row} is {} in an array of rows",
                    with_article(kind)
                )))
            }
        }
    }

    fn observe_object<R: ReadAt>(
        &self,
        scanner: &mut JsonScanner<R>,
        mut columns: ColumnTypes,
        row: u64,
    ) -> JsonTabResult<RowLayout> {
        if !self.infers(row) {
            scanner.skip_value()?;
            return Ok(RowLayout::Objects(columns));
        }
        if let Value::Object(fields) = scanner.read_value()? {
            for (name, value) in &fields {
                columns.observe(name, value);
            }
        }
        Ok(RowLayout::Objects(columns))
    }

    /// Observe one array row. `known` is the arity and column types established by earlier rows.
    fn observe_array<R: ReadAt>(
        &self,
        scanner: &mut JsonScanner<R>,
        known: Option<(u64, Vec<JsonType>)>,
        row: u64,
    ) -> JsonTabResult<RowLayout> {
        if !self.infers(row) {
            let (len, _) = skip_array(scanner)?;
            return match known {
                Some((arity, types)) if arity == len => Ok(RowLayout::Arrays { arity, types }),
                Some((arity, _)) => Ok(ragged(row, len, arity)),
                None => {
                    let columns = usize::try_from(len)
                        .map_err(|_| jsontab_err!("row {row} has too many elements"))?;
                    Ok(RowLayout::Arrays {
                        arity: len,
                        types: vec![JsonType::Null; columns],
                    })
                }
            };
        }

        let Value::Array(items) = scanner.read_value()? else {
            jsontab_bail!(InvalidState: "row {row} was peeked as an array");
        };
        let len = items.len() as u64;
        let (arity, mut types) = known.unwrap_or_else(|| (len, vec![JsonType::Null; items.len()]));
        if len != arity {
            return Ok(ragged(row, len, arity));
        }
        for (ty, item) in types.iter_mut().zip(&items) {
            *ty = mem::take(ty).join(JsonType::of(item));
        }
        Ok(RowLayout::Arrays { arity, types })
    }

    fn positional_names(&self, arity: u64) -> JsonTabResult<Vec<String>> {
        match &self.column_names {
            Some(names) if names.len() as u64 == arity => Ok(names.clone()),
            Some(names) => jsontab_bail!(
                "{} column names were given for rows of {arity} elements",
                names.len()
            ),
            None => Ok((0..arity).map(|i| format!("column{i}")).collect()),
        }
    }

    fn resolve_columns<R: ReadAt>(
        &self,
        scanner: &mut JsonScanner<R>,
    ) -> JsonTabResult<Resolution> {
        scanner.begin_object()?;
        let mut fields = Vec::new();
        let mut boundaries = HashMap::new();
        let mut rows: Option<u64> = None;
        let mut reason: Option<String> = None;
        let mut first = true;

        while let Some(name) = scanner.next_key(&mut first)? {
            if reason.is_some() {
                scanner.skip_value()?;
                continue;
            }
            if boundaries.contains_key(&name) {
                reason = Some(format!("column \"{name}\" appears more than once"));
                scanner.skip_value()?;
                continue;
            }
            match scanner.peek_kind()? {
                Some(ValueKind::Array) => {}
                kind => {
                    scanner.skip_value()?;
                    reason = Some(format!(
                        "column \"{name}\" holds {}, not an array",
                        with_article(kind)
                    ));
                    continue;
                }
            }

            let (ty, len, range) = self.scan_column(scanner)?;
            match rows {
                Some(rows) if rows != len => {
                    reason = Some(format!(
                        "column \"{name}\" has {len} values, expected {rows}"
                    ));
                    continue;
                }
                _ => rows = Some(len),
            }
            fields.push(Field::new(name.as_str(), ty.to_arrow(), true));
            boundaries.insert(name, range);
        }

        if let Some(reason) = reason {
            return Ok(Resolution::unrecognized(reason));
        }
        let mut resolution = Resolution::recognized(
            TableShape::ObjectOfArrays,
            Fields::from(fields),
            rows.unwrap_or(0),
        )?;
        resolution.table_type = resolution.table_type.with_column_boundaries(boundaries)?;
        Ok(resolution)
    }

    /// Scan one column's array literal, returning its element type, length and byte range.
    fn scan_column<R: ReadAt>(
        &self,
        scanner: &mut JsonScanner<R>,
    ) -> JsonTabResult<(JsonType, u64, FileRange)> {
        let start = scanner.begin_array()?;
        let mut ty = JsonType::Null;
        let mut len = 0u64;
        let mut first = true;
        while scanner.next_element(&mut first)? {
            if self.infers(len) {
                ty = ty.join(JsonType::of(&scanner.read_value()?));
            } else {
                scanner.skip_value()?;
            }
            len += 1;
        }
        Ok((ty, len, FileRange::from_bounds(start, scanner.position())))
    }
}

/// Locate the array literal of every column in a column-major document.
///
/// Used when a table type was supplied without boundaries. Members that are not arrays are
/// skipped; if a key repeats, its first occurrence wins.
pub(crate) fn locate_columns<R: ReadAt>(
    scanner: &mut JsonScanner<R>,
) -> JsonTabResult<HashMap<String, FileRange>> {
    scanner.seek(0)?;
    if scanner.peek_kind()? != Some(ValueKind::Object) {
        jsontab_bail!(UnrecognizedShape: "expected a top-level object of column arrays");
    }
    scanner.begin_object()?;
    let mut boundaries = HashMap::new();
    let mut first = true;
    while let Some(name) = scanner.next_key(&mut first)? {
        if scanner.peek_kind()? != Some(ValueKind::Array) {
            warn!("skipping member \"{name}\", which is not an array");
            scanner.skip_value()?;
            continue;
        }
        let (_, range) = skip_array(scanner)?;
        if boundaries.contains_key(&name) {
            warn!("column \"{name}\" appears more than once, keeping the first");
            continue;
        }
        boundaries.insert(name, range);
    }
    scanner.finish()?;
    Ok(boundaries)
}

/// Walk an array without decoding it, returning its element count and byte range.
fn skip_array<R: ReadAt>(scanner: &mut JsonScanner<R>) -> JsonTabResult<(u64, FileRange)> {
    let start = scanner.begin_array()?;
    let mut len = 0u64;
    let mut first = true;
    while scanner.next_element(&mut first)? {
        scanner.skip_value()?;
        len += 1;
    }
    Ok((len, FileRange::from_bounds(start, scanner.position())))
}

fn ragged(row: u64, len: u64, arity: u64) -> RowLayout {
    RowLayout::Unrecognized(format!("row {row} has {len} elements, expected {arity}"))
}

fn with_article(kind: Option<ValueKind>) -> String {
    match kind {
        None => "nothing".to_string(),
        Some(kind @ (ValueKind::Object | ValueKind::Array)) => format!("an {kind}"),
        Some(kind) => format!("a {kind}"),
    }
}

#[cfg(test)]
mod tests {
    use arrow_schema::DataType;
    use bytes::Bytes;
    use jsontab_io::FileRange;
    use rstest::rstest;

    use super::*;

    fn resolve(text: &'static str) -> Resolution {
        Resolver::new()
            .resolve(Bytes::from_static(text.as_bytes()))
            .unwrap()
    }

    fn column_types(resolution: &Resolution) -> Vec<(String, DataType)> {
        resolution
            .table_type
            .schema()
            .unwrap()
            .fields()
            .iter()
            .map(|f| (f.name().clone(), f.data_type().clone()))
            .collect()
    }

    #[test]
    fn array_of_objects() {
        let resolution = resolve(r#"[{"a": 1, "b": "x"}, {"c": true, "a": 2.5}, {}]"#);
        assert_eq!(resolution.table_type.shape(), TableShape::ArrayOfObjects);
        assert_eq!(resolution.rows, 3);
        assert_eq!(
            column_types(&resolution),
            vec![
                ("a".to_string(), DataType::Float64),
                ("b".to_string(), DataType::Utf8),
                ("c".to_string(), DataType::Boolean),
            ]
        );
    }

    #[test]
    fn array_of_arrays() {
        let resolution = resolve("[[1, \"a\"], [2, null], [3, 4]]");
        assert_eq!(resolution.table_type.shape(), TableShape::ArrayOfArrays);
        assert_eq!(resolution.rows, 3);
        assert_eq!(
            column_types(&resolution),
            vec![
                ("column0".to_string(), DataType::Int64),
                ("column1".to_string(), DataType::Utf8),
            ]
        );
    }

    #[test]
    fn array_of_arrays_with_header() {
        let resolution = Resolver::new()
            .with_column_names(Some(vec!["x".to_string(), "y".to_string()]))
            .resolve(Bytes::from_static(b"[[1, 2]]"))
            .unwrap();
        assert_eq!(
            resolution.table_type.schema().unwrap().field(1).name(),
            "y"
        );

        let err = Resolver::new()
            .with_column_names(Some(vec!["x".to_string()]))
            .resolve(Bytes::from_static(b"[[1, 2]]"))
            .unwrap_err();
        assert!(err.to_string().contains("1 column names"));
    }

    #[test]
    fn object_of_arrays_records_boundaries() {
        let text = r#"{"a": [1, 2], "b": ["x", null]}"#;
        let resolution = resolve(text);
        assert_eq!(resolution.table_type.shape(), TableShape::ObjectOfArrays);
        assert_eq!(resolution.rows, 2);
        let a = resolution.table_type.column_boundary("a").unwrap();
        let b = resolution.table_type.column_boundary("b").unwrap();
        assert_eq!(a, FileRange::new(6, 6));
        assert_eq!(b, FileRange::new(19, 11));
        assert_eq!(
            column_types(&resolution),
            vec![
                ("a".to_string(), DataType::Int64),
                ("b".to_string(), DataType::Utf8),
            ]
        );
    }

    #[rstest]
    #[case("[]", TableShape::ArrayOfObjects)]
    #[case(" { } ", TableShape::ObjectOfArrays)]
    fn empty_containers_are_tables(#[case] text: &'static str, #[case] shape: TableShape) {
        let resolution = resolve(text);
        assert_eq!(resolution.table_type.shape(), shape);
        assert_eq!(resolution.rows, 0);
        assert!(resolution.table_type.schema().unwrap().fields().is_empty());
    }

    #[rstest]
    #[case("42", "top-level value is a number")]
    #[case("[1, 2]", "element 0 is a number")]
    #[case("[{\"a\": 1}, [1]]", "element 1 is an array")]
    #[case("[[1, 2], [3]]", "row 1 has 1 elements, expected 2")]
    #[case("{\"a\": [1, 2], \"b\": [3]}", "column \"b\" has 1 values, expected 2")]
    #[case("{\"a\": [1], \"a\": [2]}", "appears more than once")]
    #[case("{\"a\": 1}", "column \"a\" holds a number")]
    fn unrecognized_documents(#[case] text: &'static str, #[case] reason: &str) {
        let resolution = resolve(text);
        assert!(!resolution.table_type.is_recognized());
        assert!(resolution.reason.as_deref().unwrap().contains(reason));
    }

    #[rstest]
    #[case("")]
    #[case("   ")]
    #[case("[{\"a\": 1},")]
    #[case("[1, 2] 3")]
    #[case("[1, oops]")]
    #[case("{\"a\": [1], \"b\": [2,]}")]
    fn invalid_json(#[case] text: &'static str) {
        let err = Resolver::new()
            .resolve(Bytes::from_static(text.as_bytes()))
            .unwrap_err();
        assert!(err.is_invalid_json(), "{err}");
    }

    #[test]
    fn inference_limit_types_prefix_only() {
        let resolver = Resolver::new().with_inference_row_limit(Some(2));
        let resolution = resolver
            .resolve(Bytes::from_static(br#"[{"a": 1}, {"a": 2}, {"a": "x", "b": 1}]"#))
            .unwrap();
        assert_eq!(resolution.rows, 3);
        assert_eq!(
            column_types(&resolution),
            vec![("a".to_string(), DataType::Int64)]
        );

        // Rows past the limit are still checked for shape.
        let resolution = resolver
            .resolve(Bytes::from_static(b"[[1], [2], [3, 4]]"))
            .unwrap();
        assert!(!resolution.table_type.is_recognized());
    }

    #[test]
    fn locates_columns_of_a_hinted_document() {
        let text = r#"{"a": [1, 2], "skip": 3, "b": [], "a": [9]}"#;
        let mut scanner = JsonScanner::new(Bytes::from_static(text.as_bytes()));
        let boundaries = locate_columns(&mut scanner).unwrap();
        assert_eq!(boundaries.len(), 2);
        assert_eq!(boundaries["a"], FileRange::new(6, 6));
        assert_eq!(boundaries["b"].size, 2);
    }
}
