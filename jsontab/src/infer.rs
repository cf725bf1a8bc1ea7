//! Type inference over JSON values.
//!
//! Every observed value is mapped to a [`JsonType`], and the types of all values in a column are
//! combined with [`JsonType::join`]. The join only ever widens: integers widen to floats, and
//! any pair of types without a common numeric or nested representation widens to text.

use std::collections::HashMap;
use std::mem;
use std::sync::Arc;

use arrow_schema::{DataType, Field, Fields};
use serde_json::Value;

/// The inferred type of a JSON value or column.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum JsonType {
    /// Only nulls have been observed.
    #[default]
    Null,
    Bool,
    /// Integers that fit into an `i64`.
    Int,
    Float,
    Utf8,
    List(Box<JsonType>),
    /// Object fields in first-seen order.
    Struct(Vec<(String, JsonType)>),
}

impl JsonType {
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Null => JsonType::Null,
            Value::Bool(_) => JsonType::Bool,
            Value::Number(n) if n.is_i64() => JsonType::Int,
            Value::Number(_) => JsonType::Float,
            Value::String(_) => JsonType::Utf8,
            Value::Array(items) => JsonType::List(Box::new(
                items
                    .iter()
                    .fold(JsonType::Null, |acc, item| acc.join(JsonType::of(item))),
            )),
            Value::Object(map) => JsonType::Struct(
                map.iter()
                    .map(|(name, value)| (name.clone(), JsonType::of(value)))
                    .collect(),
            ),
        }
    }

    /// The narrowest type both `self` and `other` coerce into.
    pub fn join(self, other: JsonType) -> JsonType {
        use JsonType::*;

        match (self, other) {
            (Null, other) | (other, Null) => other,
            (Bool, Bool) => Bool,
            (Int, Int) => Int,
            (Int | Float, Int | Float) => Float,
            (Utf8, Utf8) => Utf8,
            (List(lhs), List(rhs)) => List(Box::new(lhs.join(*rhs))),
            (Struct(lhs), Struct(rhs)) => Struct(join_fields(lhs, rhs)),
            _ => Utf8,
        }
    }

    /// The Arrow type values of this type are materialized as.
    pub fn to_arrow(&self) -> DataType {
        match self {
            JsonType::Null => DataType::Null,
            JsonType::Bool => DataType::Boolean,
            JsonType::Int => DataType::Int64,
            JsonType::Float => DataType::Float64,
            JsonType::Utf8 => DataType::Utf8,
            JsonType::List(element) => {
                DataType::List(Arc::new(Field::new("item", element.to_arrow(), true)))
            }
            // Arrow has no useful representation of a struct without fields.
            JsonType::Struct(fields) if fields.is_empty() => DataType::Utf8,
            JsonType::Struct(fields) => DataType::Struct(
                fields
                    .iter()
                    .map(|(name, ty)| Field::new(name, ty.to_arrow(), true))
                    .collect(),
            ),
        }
    }
}

fn join_fields(
    mut fields: Vec<(String, JsonType)>,
    other: Vec<(String, JsonType)>,
) -> Vec<(String, JsonType)> {
    for (name, ty) in other {
        match fields.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, existing)) => *existing = mem::take(existing).join(ty),
            None => fields.push((name, ty)),
        }
    }
    fields
}

/// Column types of a row-major table, keyed by column name in first-seen order.
#[derive(Debug, Default)]
pub struct ColumnTypes {
    columns: Vec<(String, JsonType)>,
    index: HashMap<String, usize>,
}

impl ColumnTypes {
    /// Widen the type of column `name` by `value`, adding the column if it is new.
    pub fn observe(&mut self, name: &str, value: &Value) {
        let ty = JsonType::of(value);
        match self.index.get(name) {
            Some(&idx) => {
                let existing = &mut self.columns[idx].1;
                *existing = mem::take(existing).join(ty);
            }
            None => {
                self.index.insert(name.to_string(), self.columns.len());
                self.columns.push((name.to_string(), ty));
            }
        }
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn into_fields(self) -> Fields {
        self.columns
            .into_iter()
            .map(|(name, ty)| Field::new(name, ty.to_arrow(), true))
            .collect()
    }
}
