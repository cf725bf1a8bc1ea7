#![deny(missing_docs)]

//! Error handling for the jsontab crates.
//!
//! Every fallible operation in the workspace returns a [`JsonTabResult`]. Errors that are
//! raised by jsontab itself carry a captured [`Backtrace`]; errors bubbled up from the
//! standard library, Arrow or serde_json are wrapped so that the origin is preserved.

mod ext;

use std::backtrace::Backtrace;
use std::borrow::Cow;
use std::fmt::{Debug, Display, Formatter};
use std::ops::Deref;
use std::{env, fmt, io};

use arrow_schema::ArrowError;
pub use ext::*;

/// A string that can be used as an error message.
#[derive(Debug)]
pub struct ErrString(Cow<'static, str>);

#[allow(clippy::fallible_impl_from)]
impl<T> From<T> for ErrString
where
    T: Into<Cow<'static, str>>,
{
    #[allow(clippy::panic)]
    fn from(msg: T) -> Self {
        if env::var("JSONTAB_PANIC_ON_ERR").as_deref().unwrap_or("") == "1" {
            panic!("{}\nBacktrace:\n{}", msg.into(), Backtrace::capture());
        } else {
            Self(msg.into())
        }
    }
}

impl AsRef<str> for ErrString {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Deref for ErrString {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Display for ErrString {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

/// The top-level error type for jsontab.
#[derive(thiserror::Error)]
#[non_exhaustive]
pub enum JsonTabError {
    /// The input is not valid JSON. The second field is the byte offset of the failure.
    #[error("invalid JSON at byte {1}: {0}\nBacktrace:\n{2}")]
    InvalidJson(ErrString, u64, Box<Backtrace>),
    /// The input is valid JSON but does not have one of the supported table shapes.
    #[error("unrecognized table shape: {0}\nBacktrace:\n{1}")]
    UnrecognizedShape(ErrString, Box<Backtrace>),
    /// An argument or configuration value was rejected.
    #[error("{0}\nBacktrace:\n{1}")]
    InvalidArgument(ErrString, Box<Backtrace>),
    /// An operation was called on a reader in a state that does not allow it.
    #[error("invalid state: {0}\nBacktrace:\n{1}")]
    InvalidState(ErrString, Box<Backtrace>),
    /// An error with additional context prepended.
    #[error("{0}: {1}")]
    Context(ErrString, Box<JsonTabError>),
    /// A wrapped I/O error, raised when the byte source cannot be read or positioned.
    #[error("{0}\nBacktrace:\n{1}")]
    IOError(io::Error, Box<Backtrace>),
    /// A wrapped Arrow error.
    #[error("{0}\nBacktrace:\n{1}")]
    ArrowError(ArrowError, Box<Backtrace>),
    /// A wrapped serde_json error.
    #[error("{0}\nBacktrace:\n{1}")]
    JsonError(serde_json::Error, Box<Backtrace>),
}

impl JsonTabError {
    /// Adds additional context to an error.
    pub fn with_context<T: Into<ErrString>>(self, msg: T) -> Self {
        JsonTabError::Context(msg.into(), Box::new(self))
    }

    /// Whether the error, or the error it wraps, reports an unrecognized table shape.
    pub fn is_unrecognized_shape(&self) -> bool {
        match self {
            JsonTabError::UnrecognizedShape(..) => true,
            JsonTabError::Context(_, inner) => inner.is_unrecognized_shape(),
            _ => false,
        }
    }

    /// Whether the error, or the error it wraps, reports input that is not valid JSON.
    pub fn is_invalid_json(&self) -> bool {
        match self {
            JsonTabError::InvalidJson(..) => true,
            JsonTabError::Context(_, inner) => inner.is_invalid_json(),
            _ => false,
        }
    }
}

impl Debug for JsonTabError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(self, f)
    }
}

impl From<io::Error> for JsonTabError {
    fn from(value: io::Error) -> Self {
        JsonTabError::IOError(value, Box::new(Backtrace::capture()))
    }
}

impl From<ArrowError> for JsonTabError {
    fn from(value: ArrowError) -> Self {
        JsonTabError::ArrowError(value, Box::new(Backtrace::capture()))
    }
}

impl From<serde_json::Error> for JsonTabError {
    fn from(value: serde_json::Error) -> Self {
        JsonTabError::JsonError(value, Box::new(Backtrace::capture()))
    }
}

impl From<JsonTabError> for ArrowError {
    fn from(value: JsonTabError) -> Self {
        ArrowError::ExternalError(Box::new(value))
    }
}

/// A type alias for Results that return [`JsonTabError`]s as their error type.
pub type JsonTabResult<T> = Result<T, JsonTabError>;

/// A trait for unwrapping a result or option with a message, panicking with a [`JsonTabError`]
/// if the value is absent.
///
/// Reserved for invariants the caller has already checked, mostly at the FFI boundary.
pub trait JsonTabExpect {
    /// The type of the value being expected.
    type Output;

    /// Returns the value of the result if it is successful, otherwise panics with the error.
    fn jsontab_expect(self, msg: &str) -> Self::Output;
}

impl<T, E> JsonTabExpect for Result<T, E>
where
    E: Into<JsonTabError>,
{
    type Output = T;

    #[inline(always)]
    fn jsontab_expect(self, msg: &str) -> Self::Output {
        self.map_err(|err| err.into())
            .unwrap_or_else(|e| jsontab_panic!(e.with_context(msg.to_string())))
    }
}

impl<T> JsonTabExpect for Option<T> {
    type Output = T;

    #[inline(always)]
    fn jsontab_expect(self, msg: &str) -> Self::Output {
        self.unwrap_or_else(|| {
            let err = JsonTabError::InvalidState(
                msg.to_string().into(),
                Box::new(Backtrace::capture()),
            );
            jsontab_panic!(err)
        })
    }
}

/// A convenient macro for creating a [`JsonTabError`].
#[macro_export]
macro_rules! jsontab_err {
    (InvalidJson: $offset:expr, $fmt:literal $(, $arg:expr)* $(,)?) => {{
        use std::backtrace::Backtrace;
        $crate::__private::must_use(
            $crate::JsonTabError::InvalidJson(
                format!($fmt, $($arg),*).into(),
                $offset,
                Box::new(Backtrace::capture()),
            )
        )
    }};
    (Context: $msg:literal, $err:expr) => {{
        $crate::__private::must_use(
            $crate::JsonTabError::Context($msg.into(), Box::new($err))
        )
    }};
    ($variant:ident: $fmt:literal $(, $arg:expr)* $(,)?) => {{
        use std::backtrace::Backtrace;
        $crate::__private::must_use(
            $crate::JsonTabError::$variant(
                format!($fmt, $($arg),*).into(),
                Box::new(Backtrace::capture()),
            )
        )
    }};
    ($fmt:literal $(, $arg:expr)* $(,)?) => {
        $crate::jsontab_err!(InvalidArgument: $fmt, $($arg),*)
    };
}

/// A convenient macro for returning a [`JsonTabError`].
#[macro_export]
macro_rules! jsontab_bail {
    ($($tt:tt)+) => {
        return Err($crate::jsontab_err!($($tt)+))
    };
}

/// A convenient macro for panicking with a [`JsonTabError`] in the presence of a programmer
/// error (e.g., an invariant has been violated).
#[macro_export]
macro_rules! jsontab_panic {
    ($variant:ident: $fmt:literal $(, $arg:expr)* $(,)?) => {
        $crate::jsontab_panic!($crate::jsontab_err!($variant: $fmt, $($arg),*))
    };
    ($fmt:literal $(, $arg:expr)* $(,)?) => {
        $crate::jsontab_panic!($crate::jsontab_err!(InvalidState: $fmt, $($arg),*))
    };
    ($err:expr) => {{
        #[allow(clippy::panic)]
        {
            let err: $crate::JsonTabError = $err;
            panic!("{}", err)
        }
    }};
}

#[doc(hidden)]
pub mod __private {
    #[doc(hidden)]
    #[inline]
    #[must_use]
    pub const fn must_use(error: crate::JsonTabError) -> crate::JsonTabError {
        error
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use arrow_schema::ArrowError;

    use super::*;

    fn bail_unrecognized() -> JsonTabResult<()> {
        jsontab_bail!(UnrecognizedShape: "top-level {}", "scalar")
    }

    #[test]
    fn macros_pick_variants() {
        let err = jsontab_err!(InvalidJson: 12, "unexpected byte {}", "'x'");
        assert!(err.is_invalid_json());
        assert!(err.to_string().starts_with("invalid JSON at byte 12: unexpected byte 'x'"));

        let err = jsontab_err!("batch size must be positive");
        assert!(matches!(err, JsonTabError::InvalidArgument(..)));

        let err = bail_unrecognized().unwrap_err();
        assert!(err.is_unrecognized_shape());
        assert!(err.to_string().contains("top-level scalar"));
    }

    #[test]
    fn context_is_transparent_to_kind() {
        let err = jsontab_err!(UnrecognizedShape: "ragged columns").with_context("resolve");
        assert!(err.is_unrecognized_shape());
        assert!(err.to_string().starts_with("resolve: unrecognized table shape"));
    }

    #[test]
    fn foreign_errors_convert() {
        let err: JsonTabError = io::Error::new(io::ErrorKind::UnexpectedEof, "eof").into();
        assert!(matches!(err, JsonTabError::IOError(..)));

        let arrow: ArrowError = jsontab_err!(InvalidState: "not prepared").into();
        assert!(matches!(arrow, ArrowError::ExternalError(_)));
        assert!(arrow.to_string().contains("not prepared"));
    }

    #[test]
    #[should_panic(expected = "missing handle")]
    fn expect_panics_with_message() {
        let value: Option<u32> = None;
        value.jsontab_expect("missing handle");
    }
}
