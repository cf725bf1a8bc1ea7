use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

use arrow_schema::{DataType, Field, FieldRef, Fields, Schema, SchemaRef};
use jsontab_error::{JsonTabResult, jsontab_bail};
use jsontab_io::FileRange;
use serde::{Deserialize, Serialize};

/// The tabular layouts a JSON document can be read as.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TableShape {
    /// Not a supported layout. Never used to construct a reader.
    #[default]
    Unrecognized,
    /// `[{"a": 1, "b": 2}, {"a": 3, "b": 4}]`
    ArrayOfObjects,
    /// `[[1, 2], [3, 4]]`
    ArrayOfArrays,
    /// `{"a": [1, 3], "b": [2, 4]}`
    ObjectOfArrays,
}

impl TableShape {
    pub fn is_row_major(&self) -> bool {
        matches!(self, TableShape::ArrayOfObjects | TableShape::ArrayOfArrays)
    }
}

impl Display for TableShape {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TableShape::Unrecognized => "unrecognized",
            TableShape::ArrayOfObjects => "array-of-objects",
            TableShape::ArrayOfArrays => "array-of-arrays",
            TableShape::ObjectOfArrays => "object-of-arrays",
        };
        f.write_str(name)
    }
}

/// The resolved layout of a document: its shape, the schema of the table it holds and, for
/// column-major documents, the byte range of every column's array literal.
///
/// A recognized shape always carries a schema; an unrecognized one never does.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TableType {
    shape: TableShape,
    schema: Option<SchemaRef>,
    column_boundaries: HashMap<String, FileRange>,
}

impl TableType {
    pub fn unrecognized() -> Self {
        Self::default()
    }

    /// A recognized table type. Fails if `shape` is [`TableShape::Unrecognized`].
    pub fn try_new(shape: TableShape, schema: SchemaRef) -> JsonTabResult<Self> {
        if shape == TableShape::Unrecognized {
            jsontab_bail!("a table type with a schema must have a recognized shape");
        }
        Ok(Self {
            shape,
            schema: Some(schema),
            column_boundaries: HashMap::new(),
        })
    }

    /// Attach the byte ranges of each column's array literal.
    ///
    /// Only column-major tables have column boundaries.
    pub fn with_column_boundaries(
        mut self,
        column_boundaries: HashMap<String, FileRange>,
    ) -> JsonTabResult<Self> {
        if !column_boundaries.is_empty() && self.shape != TableShape::ObjectOfArrays {
            jsontab_bail!(
                "column boundaries are only meaningful for {}, not {}",
                TableShape::ObjectOfArrays,
                self.shape
            );
        }
        self.column_boundaries = column_boundaries;
        Ok(self)
    }

    pub fn shape(&self) -> TableShape {
        self.shape
    }

    pub fn schema(&self) -> Option<&SchemaRef> {
        self.schema.as_ref()
    }

    pub fn column_boundaries(&self) -> &HashMap<String, FileRange> {
        &self.column_boundaries
    }

    pub fn column_boundary(&self, name: &str) -> Option<FileRange> {
        self.column_boundaries.get(name).copied()
    }

    pub fn is_recognized(&self) -> bool {
        self.shape != TableShape::Unrecognized
    }
}

/// A copy of `schema` in which every field, including nested ones, is nullable.
///
/// Cells that fail coercion are written as nulls, so no output column can be non-nullable.
pub(crate) fn nullable_schema(schema: &Schema) -> SchemaRef {
    let fields: Fields = schema.fields().iter().map(nullable_field).collect();
    Arc::new(Schema::new_with_metadata(fields, schema.metadata().clone()))
}

fn nullable_field(field: &FieldRef) -> FieldRef {
    let data_type = match field.data_type() {
        DataType::List(element) => DataType::List(nullable_field(element)),
        DataType::Struct(children) => {
            DataType::Struct(children.iter().map(nullable_field).collect())
        }
        other => other.clone(),
    };
    Arc::new(
        Field::new(field.name(), data_type, true).with_metadata(field.metadata().clone()),
    )
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use arrow_schema::{DataType, Field, Schema};
    use jsontab_io::FileRange;

    use super::*;

    #[test]
    fn shapes_serialize_kebab_case() {
        assert_eq!(
            serde_json::to_string(&TableShape::ArrayOfObjects).unwrap(),
            "\"array-of-objects\""
        );
        let shape: TableShape = serde_json::from_str("\"object-of-arrays\"").unwrap();
        assert_eq!(shape, TableShape::ObjectOfArrays);
        assert_eq!(TableShape::default(), TableShape::Unrecognized);
        assert_eq!(TableShape::ArrayOfArrays.to_string(), "array-of-arrays");
    }

    #[test]
    fn unrecognized_has_no_schema() {
        let table_type = TableType::unrecognized();
        assert!(!table_type.is_recognized());
        assert!(table_type.schema().is_none());
        assert!(table_type.column_boundaries().is_empty());

        let schema = Arc::new(Schema::empty());
        assert!(TableType::try_new(TableShape::Unrecognized, schema).is_err());
    }

    #[test]
    fn table_types_compare_by_value() {
        fn assert_eq_type<T: Eq>() {}
        assert_eq_type::<TableType>();

        assert_eq!(TableType::default(), TableType::unrecognized());
        let schema = Arc::new(Schema::new(vec![Field::new("a", DataType::Int64, true)]));
        assert_eq!(
            TableType::try_new(TableShape::ArrayOfObjects, schema.clone()).unwrap(),
            TableType::try_new(TableShape::ArrayOfObjects, schema.clone()).unwrap()
        );
        assert_ne!(
            TableType::try_new(TableShape::ArrayOfObjects, schema.clone()).unwrap(),
            TableType::try_new(TableShape::ArrayOfArrays, schema).unwrap()
        );
    }

    #[test]
    fn boundaries_only_for_column_major() {
        let schema = Arc::new(Schema::new(vec![Field::new("a", DataType::Int64, true)]));
        let boundaries = HashMap::from([("a".to_string(), FileRange::new(6, 4))]);

        let table_type = TableType::try_new(TableShape::ObjectOfArrays, schema.clone())
            .unwrap()
            .with_column_boundaries(boundaries.clone())
            .unwrap();
        assert_eq!(table_type.column_boundary("a"), Some(FileRange::new(6, 4)));
        assert_eq!(table_type.column_boundary("b"), None);

        assert!(
            TableType::try_new(TableShape::ArrayOfObjects, schema)
                .unwrap()
                .with_column_boundaries(boundaries)
                .is_err()
        );
    }

    #[test]
    fn schemas_become_nullable() {
        let schema = Schema::new(vec![
            Field::new("a", DataType::Int32, false),
            Field::new(
                "b",
                DataType::List(Arc::new(Field::new("item", DataType::Utf8, false))),
                false,
            ),
        ]);
        let nullable = nullable_schema(&schema);
        assert!(nullable.field(0).is_nullable());
        assert!(nullable.field(1).is_nullable());
        let DataType::List(item) = nullable.field(1).data_type() else {
            panic!("expected a list");
        };
        assert!(item.is_nullable());
    }
}
