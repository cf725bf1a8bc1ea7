#![allow(unsafe_op_in_unsafe_fn, clippy::missing_safety_doc, clippy::panic)]

//! Native interface to jsontab: byte sources, table readers and Arrow C streams.
//!
//! Every handle is an opaque pointer owned by the caller and released with the matching
//! `jt_*_free` function. Fallible functions take a `jt_error**` out-parameter that is set to null
//! on success.

pub mod error;
pub mod log;
pub mod reader;
pub mod source;
pub mod stream;

use std::ffi::{CStr, c_char};

pub(crate) unsafe fn to_string(ptr: *const c_char) -> String {
    let c_str = CStr::from_ptr(ptr);
    c_str.to_string_lossy().into_owned()
}
