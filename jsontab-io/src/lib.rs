//! Core traits and implementations for positioned and buffered IO.
//!
//! The JSON table reader only needs two things from its input: reading a byte range at an
//! offset, and knowing how many bytes there are. [`ReadAt`] captures exactly that, and
//! [`InputStream`] layers a seekable, buffered cursor on top of it.

pub use buf::*;
pub use file::*;
pub use offset::*;
pub use range::*;
pub use read::*;

mod buf;
mod file;
mod offset;
mod range;
mod read;
