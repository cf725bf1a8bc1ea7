//! Table reader handles.

use std::ffi::c_char;
use std::ptr;
use std::sync::Arc;

use arrow_array::{RecordBatch, RecordBatchReader};
use arrow_schema::ffi::FFI_ArrowSchema;
use arrow_schema::{ArrowError, SchemaRef};
use jsontab::error::{JsonTabExpect, JsonTabResult};
use jsontab::{SourceRef, TableOptions, TableReader, TableReaderOptions, TableShape};
use log::debug;
use parking_lot::Mutex;

use crate::error::{jt_error, try_or};
use crate::source::jt_source;
use crate::to_string;

pub const JT_SHAPE_UNRECOGNIZED: u8 = 0;
pub const JT_SHAPE_ARRAY_OF_OBJECTS: u8 = 1;
pub const JT_SHAPE_ARRAY_OF_ARRAYS: u8 = 2;
pub const JT_SHAPE_OBJECT_OF_ARRAYS: u8 = 3;

/// A [`TableReader`] shared between the caller's handle and any Arrow streams exported from it.
///
/// The reader, and with it the source, is dropped with the last clone.
#[derive(Clone)]
pub(crate) struct SharedTableReader(Arc<Mutex<TableReader>>);

impl SharedTableReader {
    pub(crate) fn with<T>(&self, f: impl FnOnce(&mut TableReader) -> T) -> T {
        f(&mut self.0.lock())
    }
}

impl Iterator for SharedTableReader {
    type Item = Result<RecordBatch, ArrowError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.0.lock().next()
    }
}

impl RecordBatchReader for SharedTableReader {
    fn schema(&self) -> SchemaRef {
        self.0.lock().schema()
    }
}

/// A reader over one JSON document.
#[allow(non_camel_case_types)]
pub struct jt_reader {
    pub(crate) inner: SharedTableReader,
}

impl jt_reader {
    pub(crate) unsafe fn shared<'a>(ptr: *const jt_reader) -> &'a SharedTableReader {
        &ptr.as_ref().jsontab_expect("null reader").inner
    }
}

fn resolve(source: SourceRef, options_json: Option<String>) -> JsonTabResult<TableReader> {
    let mut options = TableReaderOptions::from_arc(source);
    if let Some(json) = options_json {
        options = options.with_options(TableOptions::from_json(&json)?)?;
    }
    options.resolve()
}

/// Resolve the table type of `source` and create a reader for it.
///
/// `options_json` is null or a JSON object of reader options, for example
/// `{"batch_size": 4096, "inference_row_limit": 1000}`. The source is consumed whether or not
/// this succeeds. Returns null and sets `error` on failure.
#[unsafe(no_mangle)]
pub unsafe extern "C-unwind" fn jt_reader_resolve(
    source: *mut jt_source,
    options_json: *const c_char,
    error: *mut *mut jt_error,
) -> *mut jt_reader {
    let source = Box::from_raw(source);
    let options_json = (!options_json.is_null()).then(|| to_string(options_json));
    try_or(error, ptr::null_mut(), || {
        let reader = resolve(source.inner, options_json)?;
        debug!("resolved {} document", reader.table_type().shape());
        Ok(Box::into_raw(Box::new(jt_reader {
            inner: SharedTableReader(Arc::new(Mutex::new(reader))),
        })))
    })
}

/// Open the reader's cursors. Returns false and sets `error` on failure.
#[unsafe(no_mangle)]
pub unsafe extern "C-unwind" fn jt_reader_prepare(
    reader: *const jt_reader,
    error: *mut *mut jt_error,
) -> bool {
    let reader = jt_reader::shared(reader);
    try_or(error, false, || reader.with(|r| r.prepare()).map(|()| true))
}

/// Restart the reader from the first row. Returns false and sets `error` on failure.
#[unsafe(no_mangle)]
pub unsafe extern "C-unwind" fn jt_reader_rewind(
    reader: *const jt_reader,
    error: *mut *mut jt_error,
) -> bool {
    let reader = jt_reader::shared(reader);
    try_or(error, false, || reader.with(|r| r.rewind()).map(|()| true))
}

/// One of the `JT_SHAPE_*` constants.
#[unsafe(no_mangle)]
pub unsafe extern "C-unwind" fn jt_reader_shape(reader: *const jt_reader) -> u8 {
    match jt_reader::shared(reader).with(|r| r.table_type().shape()) {
        TableShape::Unrecognized => JT_SHAPE_UNRECOGNIZED,
        TableShape::ArrayOfObjects => JT_SHAPE_ARRAY_OF_OBJECTS,
        TableShape::ArrayOfArrays => JT_SHAPE_ARRAY_OF_ARRAYS,
        TableShape::ObjectOfArrays => JT_SHAPE_OBJECT_OF_ARRAYS,
    }
}

/// Number of cells read as null because their value did not fit the column type.
#[unsafe(no_mangle)]
pub unsafe extern "C-unwind" fn jt_reader_coercion_failures(reader: *const jt_reader) -> u64 {
    jt_reader::shared(reader).with(|r| r.coercion_failures())
}

/// Export the reader's schema into the caller-allocated `out`.
///
/// The caller releases the schema through its `release` callback.
#[unsafe(no_mangle)]
pub unsafe extern "C-unwind" fn jt_reader_schema(
    reader: *const jt_reader,
    out: *mut FFI_ArrowSchema,
    error: *mut *mut jt_error,
) -> bool {
    let reader = jt_reader::shared(reader);
    try_or(error, false, || {
        let schema = reader.with(|r| r.schema());
        let ffi_schema = FFI_ArrowSchema::try_from(schema.as_ref())?;
        unsafe { ptr::write(out, ffi_schema) };
        Ok(true)
    })
}

/// Release the caller's handle. Streams exported from the reader stay valid.
#[unsafe(no_mangle)]
pub unsafe extern "C-unwind" fn jt_reader_free(reader: *mut jt_reader) {
    if !reader.is_null() {
        drop(Box::from_raw(reader));
    }
}

#[cfg(test)]
mod tests {
    use std::ptr;

    use arrow_schema::Schema;

    use super::*;
    use crate::error::{JT_ERROR_INVALID_ARGUMENT, JT_ERROR_UNRECOGNIZED_SHAPE, jt_error_free};
    use crate::source::jt_source_from_buffer;

    unsafe fn source(json: &str) -> *mut jt_source {
        jt_source_from_buffer(json.as_ptr(), json.len())
    }

    #[test]
    fn resolves_and_exports_schema() {
        unsafe {
            let mut error = ptr::null_mut();
            let reader = jt_reader_resolve(
                source(r#"{"a": [1, 2], "b": ["x", "y"]}"#),
                ptr::null(),
                &mut error,
            );
            assert!(error.is_null());
            assert_eq!(jt_reader_shape(reader), JT_SHAPE_OBJECT_OF_ARRAYS);

            let mut ffi_schema = FFI_ArrowSchema::empty();
            assert!(jt_reader_schema(reader, &mut ffi_schema, &mut error));
            let schema = Schema::try_from(&ffi_schema).unwrap();
            assert_eq!(schema.field(1).name(), "b");

            assert!(!jt_reader_rewind(reader, &mut error));
            assert!(!error.is_null());
            jt_error_free(error);

            assert!(jt_reader_prepare(reader, &mut error));
            assert!(jt_reader_rewind(reader, &mut error));
            assert_eq!(jt_reader_coercion_failures(reader), 0);
            jt_reader_free(reader);
        }
    }

    #[test]
    fn huge_batch_sizes_resolve() {
        unsafe {
            let mut error = ptr::null_mut();
            let reader = jt_reader_resolve(
                source(r#"[{"a": 1}, {"a": 2}]"#),
                c"{\"batch_size\": 18446744073709551615}".as_ptr(),
                &mut error,
            );
            assert!(error.is_null());
            assert!(jt_reader_prepare(reader, &mut error));
            assert_eq!(jt_reader::shared(reader).with(|r| r.by_ref().count()), 1);
            jt_reader_free(reader);
        }
    }

    #[test]
    fn resolve_failures_set_codes() {
        unsafe {
            let mut error = ptr::null_mut();
            let reader = jt_reader_resolve(source("[1, 2]"), ptr::null(), &mut error);
            assert!(reader.is_null());
            assert_eq!((*error).code, JT_ERROR_UNRECOGNIZED_SHAPE);
            jt_error_free(error);

            let reader = jt_reader_resolve(source("[]"), c"{\"batch\": 1}".as_ptr(), &mut error);
            assert!(reader.is_null());
            assert_eq!((*error).code, JT_ERROR_INVALID_ARGUMENT);
            jt_error_free(error);
        }
    }
}
