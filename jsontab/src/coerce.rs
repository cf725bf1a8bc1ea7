//! Building Arrow arrays out of JSON values.
//!
//! A [`ColumnBuilder`] accepts any JSON value and coerces it into the column's type. Values
//! that cannot be represented become nulls and are counted as coercion failures.

use std::mem;
use std::sync::Arc;

use arrow_array::builder::{
    ArrayBuilder, BooleanBuilder, Float32Builder, Float64Builder, Int8Builder, Int16Builder,
    Int32Builder, Int64Builder, NullBuilder, PrimitiveBuilder, StringBuilder, UInt8Builder,
    UInt16Builder, UInt32Builder, UInt64Builder,
};
use arrow_array::types::ArrowPrimitiveType;
use arrow_array::{ArrayRef, ListArray, StructArray};
use arrow_buffer::{BooleanBufferBuilder, NullBuffer, OffsetBuffer};
use arrow_schema::{DataType, FieldRef, Fields};
use jsontab_error::{JsonTabResult, jsontab_bail};
use num_traits::AsPrimitive;
use serde_json::Value;

use crate::reader::DEFAULT_BATCH_SIZE;

/// Accumulates the values of one column and finishes them into an array.
pub struct ColumnBuilder {
    builder: Builder,
    coercion_failures: u64,
}

impl ColumnBuilder {
    /// A builder for arrays of `data_type`, pre-sized for up to `capacity` rows.
    ///
    /// At most [`DEFAULT_BATCH_SIZE`] rows are reserved up front; larger columns grow as values
    /// are appended.
    pub fn try_new(data_type: &DataType, capacity: usize) -> JsonTabResult<Self> {
        Ok(Self {
            builder: Builder::try_new(data_type, capacity.min(DEFAULT_BATCH_SIZE))?,
            coercion_failures: 0,
        })
    }

    /// Append `value`, coercing it into the column type or writing a null if that fails.
    pub fn append_value(&mut self, value: &Value) {
        self.builder.append(value, &mut self.coercion_failures);
    }

    pub fn append_null(&mut self) {
        self.builder.append_null();
    }

    pub fn append_nulls(&mut self, n: usize) {
        for _ in 0..n {
            self.builder.append_null();
        }
    }

    /// Append a null in place of a value that could not be read as this column at all.
    pub fn append_uncoercible(&mut self) {
        self.builder.append_null();
        self.coercion_failures += 1;
    }

    pub fn len(&self) -> usize {
        self.builder.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Finish the values appended so far into an array and reset the builder.
    pub fn finish(&mut self) -> JsonTabResult<ArrayRef> {
        self.builder.finish()
    }

    /// Number of non-null values written as null since the builder was created.
    pub fn coercion_failures(&self) -> u64 {
        self.coercion_failures
    }
}

enum Builder {
    Null(NullBuilder),
    Boolean(BooleanBuilder),
    Int8(Int8Builder),
    Int16(Int16Builder),
    Int32(Int32Builder),
    Int64(Int64Builder),
    UInt8(UInt8Builder),
    UInt16(UInt16Builder),
    UInt32(UInt32Builder),
    UInt64(UInt64Builder),
    Float32(Float32Builder),
    Float64(Float64Builder),
    Utf8(StringBuilder),
    List {
        field: FieldRef,
        values: Box<Builder>,
        lengths: Vec<usize>,
        validity: BooleanBufferBuilder,
    },
    Struct {
        fields: Fields,
        children: Vec<Builder>,
        validity: BooleanBufferBuilder,
    },
}

impl Builder {
    fn try_new(data_type: &DataType, capacity: usize) -> JsonTabResult<Self> {
        Ok(match data_type {
            DataType::Null => Builder::Null(NullBuilder::new()),
            DataType::Boolean => Builder::Boolean(BooleanBuilder::with_capacity(capacity)),
            DataType::Int8 => Builder::Int8(Int8Builder::with_capacity(capacity)),
            DataType::Int16 => Builder::Int16(Int16Builder::with_capacity(capacity)),
            DataType::Int32 => Builder::Int32(Int32Builder::with_capacity(capacity)),
            DataType::Int64 => Builder::Int64(Int64Builder::with_capacity(capacity)),
            DataType::UInt8 => Builder::UInt8(UInt8Builder::with_capacity(capacity)),
            DataType::UInt16 => Builder::UInt16(UInt16Builder::with_capacity(capacity)),
            DataType::UInt32 => Builder::UInt32(UInt32Builder::with_capacity(capacity)),
            DataType::UInt64 => Builder::UInt64(UInt64Builder::with_capacity(capacity)),
            DataType::Float32 => Builder::Float32(Float32Builder::with_capacity(capacity)),
            DataType::Float64 => Builder::Float64(Float64Builder::with_capacity(capacity)),
            DataType::Utf8 => Builder::Utf8(StringBuilder::with_capacity(
                capacity,
                capacity.saturating_mul(8),
            )),
            DataType::List(field) => Builder::List {
                field: field.clone(),
                values: Box::new(Builder::try_new(field.data_type(), capacity)?),
                lengths: Vec::with_capacity(capacity),
                validity: BooleanBufferBuilder::new(capacity),
            },
            DataType::Struct(fields) if fields.is_empty() => {
                jsontab_bail!("struct columns must have at least one field")
            }
            DataType::Struct(fields) => Builder::Struct {
                fields: fields.clone(),
                children: fields
                    .iter()
                    .map(|field| Builder::try_new(field.data_type(), capacity))
                    .collect::<JsonTabResult<_>>()?,
                validity: BooleanBufferBuilder::new(capacity),
            },
            other => jsontab_bail!("unsupported column type {other}"),
        })
    }

    fn append(&mut self, value: &Value, failures: &mut u64) {
        if value.is_null() {
            self.append_null();
            return;
        }

        let coerced = match self {
            Builder::Null(builder) => {
                builder.append_null();
                false
            }
            Builder::Boolean(builder) => {
                let coerced = match value {
                    Value::Bool(b) => Some(*b),
                    Value::String(s) => s.trim().parse::<bool>().ok(),
                    _ => None,
                };
                builder.append_option(coerced);
                coerced.is_some()
            }
            Builder::Int8(builder) => append_integer(builder, value),
            Builder::Int16(builder) => append_integer(builder, value),
            Builder::Int32(builder) => append_integer(builder, value),
            Builder::Int64(builder) => append_integer(builder, value),
            Builder::UInt8(builder) => append_integer(builder, value),
            Builder::UInt16(builder) => append_integer(builder, value),
            Builder::UInt32(builder) => append_integer(builder, value),
            Builder::UInt64(builder) => append_integer(builder, value),
            Builder::Float32(builder) => append_float(builder, value),
            Builder::Float64(builder) => append_float(builder, value),
            Builder::Utf8(builder) => {
                match value {
                    Value::String(s) => builder.append_value(s),
                    other => builder.append_value(other.to_string()),
                }
                true
            }
            Builder::List {
                values,
                lengths,
                validity,
                ..
            } => match value {
                Value::Array(items) => {
                    for item in items {
                        values.append(item, failures);
                    }
                    lengths.push(items.len());
                    validity.append(true);
                    true
                }
                _ => {
                    lengths.push(0);
                    validity.append(false);
                    false
                }
            },
            Builder::Struct {
                fields,
                children,
                validity,
            } => match value {
                Value::Object(map) => {
                    for (field, child) in fields.iter().zip(children.iter_mut()) {
                        match map.get(field.name()) {
                            Some(value) => child.append(value, failures),
                            None => child.append_null(),
                        }
                    }
                    validity.append(true);
                    true
                }
                _ => {
                    children.iter_mut().for_each(Builder::append_null);
                    validity.append(false);
                    false
                }
            },
        };

        if !coerced {
            *failures += 1;
        }
    }

    fn append_null(&mut self) {
        match self {
            Builder::Null(builder) => builder.append_null(),
            Builder::Boolean(builder) => builder.append_null(),
            Builder::Int8(builder) => builder.append_null(),
            Builder::Int16(builder) => builder.append_null(),
            Builder::Int32(builder) => builder.append_null(),
            Builder::Int64(builder) => builder.append_null(),
            Builder::UInt8(builder) => builder.append_null(),
            Builder::UInt16(builder) => builder.append_null(),
            Builder::UInt32(builder) => builder.append_null(),
            Builder::UInt64(builder) => builder.append_null(),
            Builder::Float32(builder) => builder.append_null(),
            Builder::Float64(builder) => builder.append_null(),
            Builder::Utf8(builder) => builder.append_null(),
            Builder::List {
                lengths, validity, ..
            } => {
                lengths.push(0);
                validity.append(false);
            }
            Builder::Struct {
                children, validity, ..
            } => {
                children.iter_mut().for_each(Builder::append_null);
                validity.append(false);
            }
        }
    }

    fn len(&self) -> usize {
        match self {
            Builder::Null(builder) => builder.len(),
            Builder::Boolean(builder) => builder.len(),
            Builder::Int8(builder) => builder.len(),
            Builder::Int16(builder) => builder.len(),
            Builder::Int32(builder) => builder.len(),
            Builder::Int64(builder) => builder.len(),
            Builder::UInt8(builder) => builder.len(),
            Builder::UInt16(builder) => builder.len(),
            Builder::UInt32(builder) => builder.len(),
            Builder::UInt64(builder) => builder.len(),
            Builder::Float32(builder) => builder.len(),
            Builder::Float64(builder) => builder.len(),
            Builder::Utf8(builder) => builder.len(),
            Builder::List { lengths, .. } => lengths.len(),
            Builder::Struct { validity, .. } => validity.len(),
        }
    }

    fn finish(&mut self) -> JsonTabResult<ArrayRef> {
        Ok(match self {
            Builder::Null(builder) => Arc::new(builder.finish()),
            Builder::Boolean(builder) => Arc::new(builder.finish()),
            Builder::Int8(builder) => Arc::new(builder.finish()),
            Builder::Int16(builder) => Arc::new(builder.finish()),
            Builder::Int32(builder) => Arc::new(builder.finish()),
            Builder::Int64(builder) => Arc::new(builder.finish()),
            Builder::UInt8(builder) => Arc::new(builder.finish()),
            Builder::UInt16(builder) => Arc::new(builder.finish()),
            Builder::UInt32(builder) => Arc::new(builder.finish()),
            Builder::UInt64(builder) => Arc::new(builder.finish()),
            Builder::Float32(builder) => Arc::new(builder.finish()),
            Builder::Float64(builder) => Arc::new(builder.finish()),
            Builder::Utf8(builder) => Arc::new(builder.finish()),
            Builder::List {
                field,
                values,
                lengths,
                validity,
            } => Arc::new(ListArray::try_new(
                field.clone(),
                OffsetBuffer::from_lengths(mem::take(lengths)),
                values.finish()?,
                Some(NullBuffer::new(validity.finish())),
            )?),
            Builder::Struct {
                fields,
                children,
                validity,
            } => Arc::new(StructArray::try_new(
                fields.clone(),
                children
                    .iter_mut()
                    .map(Builder::finish)
                    .collect::<JsonTabResult<Vec<_>>>()?,
                Some(NullBuffer::new(validity.finish())),
            )?),
        })
    }
}

fn append_integer<T>(builder: &mut PrimitiveBuilder<T>, value: &Value) -> bool
where
    T: ArrowPrimitiveType,
    i128: AsPrimitive<T::Native>,
{
    match integer_of(value) {
        Some(integer) => {
            builder.append_value(integer.as_());
            true
        }
        None => {
            builder.append_null();
            false
        }
    }
}

fn append_float<T>(builder: &mut PrimitiveBuilder<T>, value: &Value) -> bool
where
    T: ArrowPrimitiveType,
    f64: AsPrimitive<T::Native>,
{
    let float = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match float {
        Some(float) => {
            builder.append_value(float.as_());
            true
        }
        None => {
            builder.append_null();
            false
        }
    }
}

/// The integer a value denotes, before narrowing to the column width.
///
/// Narrowing keeps the low bits, so out-of-range values wrap.
fn integer_of(value: &Value) -> Option<i128> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .map(i128::from)
            .or_else(|| n.as_u64().map(i128::from))
            .or_else(|| n.as_f64().and_then(integral)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i128>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(integral))
        }
        _ => None,
    }
}

fn integral(float: f64) -> Option<i128> {
    if float.is_finite() && float.fract() == 0.0 {
        num_traits::cast(float)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use arrow_array::cast::AsArray;
    use arrow_array::types::{Float32Type, Int8Type, Int32Type, UInt16Type};
    use arrow_array::{Array, BooleanArray, StringArray};
    use arrow_schema::{DataType, Field, Fields};
    use rstest::rstest;
    use serde_json::{Value, json};

    use super::*;

    fn build(data_type: &DataType, values: &[Value]) -> (ArrayRef, u64) {
        let mut builder = ColumnBuilder::try_new(data_type, values.len()).unwrap();
        for value in values {
            builder.append_value(value);
        }
        assert_eq!(builder.len(), values.len());
        (builder.finish().unwrap(), builder.coercion_failures())
    }

    #[rstest]
    #[case(DataType::Utf8)]
    #[case(DataType::Int64)]
    #[case(DataType::List(Arc::new(Field::new("item", DataType::Utf8, true))))]
    fn huge_capacities_are_not_reserved(#[case] data_type: DataType) {
        let mut builder = ColumnBuilder::try_new(&data_type, usize::MAX).unwrap();
        builder.append_null();
        assert_eq!(builder.finish().unwrap().len(), 1);
    }

    #[test]
    fn integers_wrap_to_width() {
        let (array, failures) = build(
            &DataType::Int8,
            &[json!(1), json!(127), json!(128), json!(-129), json!(300), json!(u64::MAX)],
        );
        assert_eq!(
            array.as_primitive::<Int8Type>().values().as_ref(),
            &[1, 127, -128, 127, 44, -1]
        );
        assert_eq!(failures, 0);
    }

    #[rstest]
    #[case(json!("42"), Some(42))]
    #[case(json!(" -7 "), Some(-7))]
    #[case(json!(3.0), Some(3))]
    #[case(json!("4.0"), Some(4))]
    #[case(json!(3.5), None)]
    #[case(json!("abc"), None)]
    #[case(json!(true), None)]
    #[case(json!([1]), None)]
    fn integer_coercion(#[case] value: Value, #[case] expected: Option<i32>) {
        let (array, failures) = build(&DataType::Int32, &[value]);
        let array = array.as_primitive::<Int32Type>();
        assert_eq!(array.is_valid(0), expected.is_some());
        if let Some(expected) = expected {
            assert_eq!(array.value(0), expected);
        }
        assert_eq!(failures, u64::from(expected.is_none()));
    }

    #[test]
    fn unsigned_and_float_columns() {
        let (array, _) = build(&DataType::UInt16, &[json!(-1), json!(65536)]);
        assert_eq!(
            array.as_primitive::<UInt16Type>().values().as_ref(),
            &[u16::MAX, 0]
        );

        let (array, failures) = build(
            &DataType::Float32,
            &[json!(1), json!(2.5), json!("1e2"), json!("x")],
        );
        let array = array.as_primitive::<Float32Type>();
        assert_eq!(array.value(0), 1.0);
        assert_eq!(array.value(1), 2.5);
        assert_eq!(array.value(2), 100.0);
        assert!(array.is_null(3));
        assert_eq!(failures, 1);
    }

    #[test]
    fn nulls_are_not_failures() {
        let (array, failures) = build(&DataType::Int64, &[json!(null), json!(1)]);
        assert_eq!(array.null_count(), 1);
        assert_eq!(failures, 0);

        let (array, failures) = build(&DataType::Null, &[json!(null), json!(1)]);
        assert_eq!(array.len(), 2);
        assert_eq!(failures, 1);
    }

    #[test]
    fn text_keeps_json_spelling() {
        let (array, failures) = build(
            &DataType::Utf8,
            &[json!("plain"), json!(12), json!(1.5), json!(false), json!({"a": [1]}), json!(null)],
        );
        let array = array.as_any().downcast_ref::<StringArray>().unwrap();
        let values: Vec<_> = array.iter().collect();
        assert_eq!(
            values,
            vec![
                Some("plain"),
                Some("12"),
                Some("1.5"),
                Some("false"),
                Some("{\"a\":[1]}"),
                None
            ]
        );
        assert_eq!(failures, 0);
    }

    #[test]
    fn booleans() {
        let (array, failures) = build(
            &DataType::Boolean,
            &[json!(true), json!("false"), json!(1)],
        );
        let array = array.as_any().downcast_ref::<BooleanArray>().unwrap();
        assert!(array.value(0));
        assert!(!array.value(1));
        assert!(array.is_null(2));
        assert_eq!(failures, 1);
    }

    #[test]
    fn nested_values() {
        let item = Arc::new(Field::new("item", DataType::Int64, true));
        let struct_type = DataType::Struct(Fields::from(vec![
            Field::new("tags", DataType::List(item), true),
            Field::new("name", DataType::Utf8, true),
        ]));
        let (array, failures) = build(
            &struct_type,
            &[
                json!({"tags": [1, 2], "name": "a"}),
                json!({"tags": null}),
                json!("not an object"),
                json!({"tags": ["x"]}),
            ],
        );
        let array = array.as_struct();
        assert_eq!(array.len(), 4);
        assert!(array.is_null(2));

        let tags = array.column(0).as_list::<i32>();
        assert_eq!(tags.value_length(0), 2);
        assert!(tags.is_null(1));
        assert_eq!(tags.value_length(3), 1);
        assert!(tags.value(3).is_null(0));
        assert!(array.column(1).is_null(1));

        // The string row and the "x" element.
        assert_eq!(failures, 2);
    }

    #[test]
    fn uncoercible_rows_count() {
        let mut builder = ColumnBuilder::try_new(&DataType::Int64, 4).unwrap();
        builder.append_uncoercible();
        builder.append_nulls(2);
        assert_eq!(builder.len(), 3);
        assert_eq!(builder.coercion_failures(), 1);
        let array = builder.finish().unwrap();
        assert_eq!(array.null_count(), 3);
        assert!(builder.is_empty());
    }

    #[test]
    fn unsupported_types_are_rejected() {
        assert!(ColumnBuilder::try_new(&DataType::Date32, 1).is_err());
        assert!(ColumnBuilder::try_new(&DataType::Struct(Fields::empty()), 1).is_err());
    }
}
