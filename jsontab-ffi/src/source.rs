//! Byte sources that a reader can be resolved over.

use std::ffi::c_char;
use std::ptr;
use std::sync::Arc;

use bytes::Bytes;
use jsontab::SourceRef;
use jsontab::io::FileReadAt;

use crate::error::{jt_error, try_or};
use crate::to_string;

/// The bytes of a JSON document.
#[allow(non_camel_case_types)]
pub struct jt_source {
    pub(crate) inner: SourceRef,
}

impl jt_source {
    pub(crate) fn new(inner: SourceRef) -> *mut Self {
        Box::into_raw(Box::new(Self { inner }))
    }
}

/// Copy `len` bytes at `data` into a new in-memory source.
///
/// The caller keeps ownership of `data`.
#[unsafe(no_mangle)]
pub unsafe extern "C-unwind" fn jt_source_from_buffer(
    data: *const u8,
    len: usize,
) -> *mut jt_source {
    let bytes = if len == 0 {
        Bytes::new()
    } else {
        Bytes::copy_from_slice(std::slice::from_raw_parts(data, len))
    };
    jt_source::new(Arc::new(bytes))
}

/// Open the file at `path` as a source. Returns null and sets `error` if it cannot be opened.
#[unsafe(no_mangle)]
pub unsafe extern "C-unwind" fn jt_source_open_file(
    path: *const c_char,
    error: *mut *mut jt_error,
) -> *mut jt_source {
    let path = to_string(path);
    try_or(error, ptr::null_mut(), || {
        log::debug!("opening source {path}");
        let file = FileReadAt::open(&path)?;
        Ok(jt_source::new(Arc::new(file)))
    })
}

/// Release a source that was not passed to [`jt_reader_resolve`][crate::reader::jt_reader_resolve].
#[unsafe(no_mangle)]
pub unsafe extern "C-unwind" fn jt_source_free(source: *mut jt_source) {
    if !source.is_null() {
        drop(Box::from_raw(source));
    }
}
