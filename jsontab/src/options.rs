use std::sync::Arc;

use arrow_schema::{DataType, Field, Schema};
use jsontab_error::{JsonTabResult, ResultExt, jsontab_bail, jsontab_err};
use jsontab_io::ReadAt;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::reader::{DEFAULT_BATCH_SIZE, SourceRef, TableReader};
use crate::resolve::Resolver;
use crate::table_type::{TableShape, TableType};

/// Options for opening a JSON document as a [`TableReader`].
///
/// ```
/// use bytes::Bytes;
/// use jsontab::TableReaderOptions;
///
/// let mut reader = TableReaderOptions::new(Bytes::from_static(b"[{\"a\": 1}, {\"a\": 2}]"))
///     .with_batch_size(1)
///     .resolve()
///     .unwrap();
/// reader.prepare().unwrap();
/// assert_eq!(reader.count(), 2);
/// ```
pub struct TableReaderOptions {
    source: SourceRef,
    batch_size: usize,
    table_type: Option<TableType>,
    inference_row_limit: Option<u64>,
    column_names: Option<Vec<String>>,
}

impl TableReaderOptions {
    pub fn new<R: ReadAt + 'static>(source: R) -> Self {
        Self::from_arc(Arc::new(source))
    }

    pub fn from_arc(source: SourceRef) -> Self {
        Self {
            source,
            batch_size: DEFAULT_BATCH_SIZE,
            table_type: None,
            inference_row_limit: None,
            column_names: None,
        }
    }

    /// Maximum number of rows per batch.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Use a known table type instead of inferring one.
    ///
    /// If a column-major table type carries no column boundaries, they are located when the
    /// reader is prepared.
    pub fn with_table_type(mut self, table_type: TableType) -> Self {
        self.table_type = Some(table_type);
        self
    }

    /// Infer column types from at most this many rows. The remaining rows are only validated.
    pub fn with_inference_row_limit(mut self, limit: u64) -> Self {
        self.inference_row_limit = Some(limit);
        self
    }

    /// Names for the columns of an array-of-arrays document.
    pub fn with_column_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.column_names = Some(names.into_iter().map(Into::into).collect());
        self
    }

    /// Apply serialized options on top of these.
    pub fn with_options(mut self, options: TableOptions) -> JsonTabResult<Self> {
        if let Some(batch_size) = options.batch_size {
            self.batch_size = batch_size;
        }
        if let Some(table_type) = options.table_type()? {
            self.table_type = Some(table_type);
        }
        if options.inference_row_limit.is_some() {
            self.inference_row_limit = options.inference_row_limit;
        }
        if options.column_names.is_some() {
            self.column_names = options.column_names;
        }
        Ok(self)
    }

    /// Resolve the table type of the document and build a reader for it.
    pub fn resolve(self) -> JsonTabResult<TableReader> {
        if self.batch_size == 0 {
            jsontab_bail!("batch size must be positive");
        }
        if self.inference_row_limit == Some(0) {
            jsontab_bail!("inference row limit must be positive");
        }

        let table_type = match self.table_type {
            Some(hint) if !hint.is_recognized() => {
                jsontab_bail!("a table type hint must have a recognized shape")
            }
            Some(hint) => {
                debug!("reading document as {}", hint.shape());
                hint
            }
            None => {
                let resolution = Resolver::new()
                    .with_inference_row_limit(self.inference_row_limit)
                    .with_column_names(self.column_names)
                    .resolve(self.source.clone())?;
                if let Some(reason) = resolution.reason {
                    jsontab_bail!(UnrecognizedShape: "{reason}");
                }
                resolution.table_type
            }
        };

        TableReader::try_new(self.source, table_type, self.batch_size)
    }
}

/// Reader options as a JSON document, for callers that cannot use the builder.
///
/// ```json
/// {
///   "batch_size": 1024,
///   "shape": "array-of-objects",
///   "columns": [{"name": "v", "type": "int32"}],
///   "inference_row_limit": 100,
///   "column_names": null
/// }
/// ```
///
/// `shape` and `columns` together form a table type hint.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TableOptions {
    pub batch_size: Option<usize>,
    pub shape: Option<TableShape>,
    pub columns: Option<Vec<ColumnOption>>,
    pub inference_row_limit: Option<u64>,
    pub column_names: Option<Vec<String>>,
}

impl TableOptions {
    pub fn from_json(json: &str) -> JsonTabResult<Self> {
        serde_json::from_str(json).context("invalid reader options")
    }

    /// The table type hint described by `shape` and `columns`, if any.
    pub fn table_type(&self) -> JsonTabResult<Option<TableType>> {
        match (&self.shape, &self.columns) {
            (None, None) => Ok(None),
            (Some(shape), Some(columns)) => {
                let schema = Schema::new(
                    columns
                        .iter()
                        .map(|column| Field::new(&column.name, column.data_type.into(), true))
                        .collect::<Vec<_>>(),
                );
                TableType::try_new(*shape, Arc::new(schema)).map(Some)
            }
            _ => Err(jsontab_err!(
                "\"shape\" and \"columns\" must be given together"
            )),
        }
    }
}

/// One column of a table type hint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ColumnOption {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: ColumnTypeName,
}

/// The column types a hint can name.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnTypeName {
    Null,
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    #[serde(rename = "uint8")]
    UInt8,
    #[serde(rename = "uint16")]
    UInt16,
    #[serde(rename = "uint32")]
    UInt32,
    #[serde(rename = "uint64")]
    UInt64,
    Float32,
    Float64,
    Utf8,
}

impl From<ColumnTypeName> for DataType {
    fn from(value: ColumnTypeName) -> Self {
        match value {
            ColumnTypeName::Null => DataType::Null,
            ColumnTypeName::Bool => DataType::Boolean,
            ColumnTypeName::Int8 => DataType::Int8,
            ColumnTypeName::Int16 => DataType::Int16,
            ColumnTypeName::Int32 => DataType::Int32,
            ColumnTypeName::Int64 => DataType::Int64,
            ColumnTypeName::UInt8 => DataType::UInt8,
            ColumnTypeName::UInt16 => DataType::UInt16,
            ColumnTypeName::UInt32 => DataType::UInt32,
            ColumnTypeName::UInt64 => DataType::UInt64,
            ColumnTypeName::Float32 => DataType::Float32,
            ColumnTypeName::Float64 => DataType::Float64,
            ColumnTypeName::Utf8 => DataType::Utf8,
        }
    }
}

#[cfg(test)]
mod tests {
    use arrow_schema::DataType;
    use bytes::Bytes;
    use rstest::rstest;

    use super::*;

    #[test]
    fn parses_full_options() {
        let options = TableOptions::from_json(
            r#"{"batch_size": 16, "shape": "array-of-objects",
                "columns": [{"name": "v", "type": "uint16"}, {"name": "w", "type": "utf8"}],
                "inference_row_limit": 10}"#,
        )
        .unwrap();
        assert_eq!(options.batch_size, Some(16));
        let table_type = options.table_type().unwrap().unwrap();
        assert_eq!(table_type.shape(), TableShape::ArrayOfObjects);
        let schema = table_type.schema().unwrap();
        assert_eq!(schema.field(0).data_type(), &DataType::UInt16);
        assert_eq!(schema.field(1).name(), "w");
    }

    #[rstest]
    #[case(r#"{"batch": 1}"#)]
    #[case(r#"{"shape": "array-of-objects"}"#)]
    #[case(r#"{"shape": "rows", "columns": []}"#)]
    #[case(r#"{"shape": "unrecognized", "columns": []}"#)]
    #[case(r#"{"shape": "array-of-arrays", "columns": [{"name": "a", "type": "date"}]}"#)]
    fn rejects_bad_options(#[case] json: &str) {
        let result = TableOptions::from_json(json).and_then(|options| options.table_type());
        assert!(result.is_err());
    }

    #[rstest]
    #[case(TableReaderOptions::new(Bytes::from_static(b"[]")).with_batch_size(0))]
    #[case(TableReaderOptions::new(Bytes::from_static(b"[]")).with_inference_row_limit(0))]
    #[case(
        TableReaderOptions::new(Bytes::from_static(b"[]"))
            .with_table_type(TableType::unrecognized())
    )]
    fn rejects_bad_arguments(#[case] options: TableReaderOptions) {
        let err = options.resolve().err().unwrap();
        assert!(matches!(err, jsontab_error::JsonTabError::InvalidArgument(..)));
    }

    #[test]
    fn unrecognized_documents_fail_to_resolve() {
        let err = TableReaderOptions::new(Bytes::from_static(b"[1, 2, 3]"))
            .resolve()
            .err()
            .unwrap();
        assert!(err.is_unrecognized_shape());
    }

    #[test]
    fn serialized_options_override_builder() {
        let options =
            TableOptions::from_json(r#"{"batch_size": 2, "column_names": ["x"]}"#).unwrap();
        let reader = TableReaderOptions::new(Bytes::from_static(b"[[1], [2], [3]]"))
            .with_options(options)
            .unwrap()
            .resolve()
            .unwrap();
        assert_eq!(reader.batch_size(), 2);
        assert_eq!(reader.schema().field(0).name(), "x");
    }
}
