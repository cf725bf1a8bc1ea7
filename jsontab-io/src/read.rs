use std::io;
use std::ops::Range;
use std::sync::Arc;

use bytes::Bytes;
use jsontab_error::jsontab_err;

/// A trait for byte sources that support positional reads.
///
/// Implementations must be safe to [share across threads][Sync]; a table reader hands clones of
/// an `Arc<dyn ReadAt>` to its per-column cursors.
pub trait ReadAt: Send + Sync {
    /// Read the bytes in `range`.
    ///
    /// If the source does not have the requested number of bytes, the read fails with an
    /// [`UnexpectedEof`][std::io::ErrorKind::UnexpectedEof].
    fn read_byte_range(&self, range: Range<u64>) -> io::Result<Bytes>;

    /// The number of readable bytes.
    ///
    /// For a file this is queried on every call, so a file that shrinks after it was opened is
    /// noticed by the next positioning operation.
    fn size(&self) -> io::Result<u64>;

    /// Hint at how the source would like to be read.
    fn performance_hint(&self) -> PerformanceHint {
        PerformanceHint::default()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PerformanceHint {
    block_size: u64,
}

impl Default for PerformanceHint {
    fn default() -> Self {
        Self {
            block_size: 1 << 20, // 1MB
        }
    }
}

impl PerformanceHint {
    pub fn new(block_size: u64) -> Self {
        Self {
            block_size: block_size.max(1),
        }
    }

    /// Creates a new instance with a profile appropriate for fast local storage, like memory or
    /// files on NVMe devices.
    pub fn local() -> Self {
        Self::new(64 << 10)
    }

    /// The preferred number of bytes fetched by a single buffered read.
    pub fn block_size(&self) -> u64 {
        self.block_size
    }
}

impl<T: ReadAt + ?Sized> ReadAt for Arc<T> {
    fn read_byte_range(&self, range: Range<u64>) -> io::Result<Bytes> {
        T::read_byte_range(self, range)
    }

    fn size(&self) -> io::Result<u64> {
        T::size(self)
    }

    fn performance_hint(&self) -> PerformanceHint {
        T::performance_hint(self)
    }
}

impl<T: ReadAt + ?Sized> ReadAt for Box<T> {
    fn read_byte_range(&self, range: Range<u64>) -> io::Result<Bytes> {
        T::read_byte_range(self, range)
    }

    fn size(&self) -> io::Result<u64> {
        T::size(self)
    }

    fn performance_hint(&self) -> PerformanceHint {
        T::performance_hint(self)
    }
}

impl ReadAt for Bytes {
    fn read_byte_range(&self, range: Range<u64>) -> io::Result<Bytes> {
        let start = usize::try_from(range.start).map_err(io::Error::other)?;
        let end = usize::try_from(range.end).map_err(io::Error::other)?;
        if start > end || end > self.len() {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                jsontab_err!(
                    "read of [{start}, {end}) past the end of a {}-byte buffer",
                    self.len()
                ),
            ));
        }
        Ok(self.slice(start..end))
    }

    fn size(&self) -> io::Result<u64> {
        Ok(self.len() as u64)
    }

    fn performance_hint(&self) -> PerformanceHint {
        PerformanceHint::local()
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::Arc;

    use bytes::Bytes;

    use crate::{PerformanceHint, ReadAt};

    #[test]
    fn bytes_read_at() {
        let bytes = Bytes::from_static(b"0123456789");
        assert_eq!(bytes.size().unwrap(), 10);
        assert_eq!(bytes.read_byte_range(2..5).unwrap().as_ref(), b"234");
        assert_eq!(bytes.read_byte_range(10..10).unwrap().len(), 0);

        let err = bytes.read_byte_range(8..11).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn dyn_forwarding() {
        let source: Arc<dyn ReadAt> = Arc::new(Bytes::from_static(b"[1, 2]"));
        assert_eq!(source.size().unwrap(), 6);
        assert_eq!(source.read_byte_range(1..2).unwrap().as_ref(), b"1");
        assert_eq!(source.performance_hint(), PerformanceHint::local());
    }
}
