use crate::{ErrString, JsonTabError, JsonTabResult};

/// Extension trait for results whose error converts into a [`JsonTabError`].
pub trait ResultExt<T>: private::Sealed {
    /// Convert the error into a [`JsonTabError`] and prefix it with `msg`.
    fn context<M: Into<ErrString>>(self, msg: M) -> JsonTabResult<T>;
}

mod private {
    pub trait Sealed {}

    impl<T, E> Sealed for Result<T, E> {}
}

impl<T, E> ResultExt<T> for Result<T, E>
where
    E: Into<JsonTabError>,
{
    fn context<M: Into<ErrString>>(self, msg: M) -> JsonTabResult<T> {
        self.map_err(|err| err.into().with_context(msg))
    }
}
