use std::ffi::{CString, c_char, c_int};
use std::ptr;

use jsontab::error::{JsonTabError, JsonTabResult};

/// The input is not valid JSON.
pub const JT_ERROR_INVALID_JSON: c_int = 1;
/// The input is valid JSON but not a supported table layout.
pub const JT_ERROR_UNRECOGNIZED_SHAPE: c_int = 2;
/// The byte source could not be read or positioned.
pub const JT_ERROR_IO: c_int = 3;
/// The reader was used out of order, or after it failed.
pub const JT_ERROR_INVALID_STATE: c_int = 4;
/// An option or argument was rejected.
pub const JT_ERROR_INVALID_ARGUMENT: c_int = 5;
/// Any other failure.
pub const JT_ERROR_OTHER: c_int = -1;

#[repr(C)]
#[allow(non_camel_case_types)]
pub struct jt_error {
    pub code: c_int,
    pub message: *const c_char,
}

fn error_code(err: &JsonTabError) -> c_int {
    match err {
        JsonTabError::InvalidJson(..) => JT_ERROR_INVALID_JSON,
        JsonTabError::UnrecognizedShape(..) => JT_ERROR_UNRECOGNIZED_SHAPE,
        JsonTabError::IOError(..) => JT_ERROR_IO,
        JsonTabError::InvalidState(..) => JT_ERROR_INVALID_STATE,
        JsonTabError::InvalidArgument(..) | JsonTabError::JsonError(..) => {
            JT_ERROR_INVALID_ARGUMENT
        }
        JsonTabError::Context(_, inner) => error_code(inner),
        _ => JT_ERROR_OTHER,
    }
}

/// Run `function`, reporting its error through `error` and returning `default_value` on failure.
///
/// `error` may be null, in which case errors are only logged.
pub fn try_or<T>(
    error: *mut *mut jt_error,
    default_value: T,
    function: impl FnOnce() -> JsonTabResult<T>,
) -> T {
    match function() {
        Ok(value) => {
            if !error.is_null() {
                unsafe { error.write(ptr::null_mut()) };
            }
            value
        }
        Err(err) => {
            log::debug!("returning error across the C boundary: {err}");
            if !error.is_null() {
                let message = CString::new(err.to_string().replace('\0', " ")).unwrap_or_default();
                unsafe {
                    error.write(Box::into_raw(Box::new(jt_error {
                        code: error_code(&err),
                        message: message.into_raw(),
                    })))
                };
            }
            default_value
        }
    }
}

/// Free an error and its message.
#[unsafe(no_mangle)]
pub unsafe extern "C-unwind" fn jt_error_free(error: *mut jt_error) {
    if error.is_null() {
        return;
    }
    let error = Box::from_raw(error);
    if !error.message.is_null() {
        drop(CString::from_raw(error.message.cast_mut()));
    }
}
