//! Read JSON documents as Arrow tables.
//!
//! A document is first *resolved*: one forward scan decides whether it is an array of objects,
//! an array of arrays or an object of column arrays, infers the type of every column, and for
//! column-major documents records where each column's values live in the source. The resulting
//! [`TableReader`] then streams the rows as [`RecordBatch`][arrow_array::RecordBatch]es of a
//! bounded size, and can rewind to the first row at any time.

pub use options::*;
pub use reader::{ColumnReader, DEFAULT_BATCH_SIZE, ReaderState, SourceRef, TableReader};
pub use resolve::{Resolution, Resolver};
pub use table_type::*;
pub use {jsontab_error as error, jsontab_io as io};

pub mod coerce;
pub mod infer;
mod options;
mod reader;
mod resolve;
pub mod scan;
mod table_type;
