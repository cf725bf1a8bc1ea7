use std::io;
use std::ops::Range;

use bytes::Bytes;
use jsontab_error::jsontab_err;

use crate::{FileRange, PerformanceHint, ReadAt};

/// An adapter that exposes a fixed [`FileRange`] of another source as a source of its own.
///
/// Offsets passed to [`ReadAt::read_byte_range`] are relative to the start of the window, and
/// reads may not extend past its end.
pub struct SliceReadAt<R> {
    read: R,
    range: FileRange,
}

impl<R> Clone for SliceReadAt<R>
where
    R: Clone,
{
    fn clone(&self) -> Self {
        Self {
            read: self.read.clone(),
            range: self.range,
        }
    }
}

impl<R: ReadAt> SliceReadAt<R> {
    /// Wrap `read`, checking that the window lies within the source.
    pub fn try_new(read: R, range: FileRange) -> io::Result<Self> {
        let len = read.size()?;
        if range.end() > len {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                jsontab_err!("range {range} exceeds a source of {len} bytes"),
            ));
        }
        Ok(Self { read, range })
    }

    pub fn range(&self) -> FileRange {
        self.range
    }

    pub fn inner(&self) -> &R {
        &self.read
    }
}

impl<R: ReadAt> ReadAt for SliceReadAt<R> {
    fn read_byte_range(&self, range: Range<u64>) -> io::Result<Bytes> {
        if range.end > self.range.size {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                jsontab_err!(
                    "read of [{}, {}) past the end of window {}",
                    range.start,
                    range.end,
                    self.range
                ),
            ));
        }
        self.read
            .read_byte_range(self.range.offset + range.start..self.range.offset + range.end)
    }

    fn size(&self) -> io::Result<u64> {
        Ok(self.range.size)
    }

    fn performance_hint(&self) -> PerformanceHint {
        self.read.performance_hint()
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use bytes::Bytes;

    use crate::{FileRange, ReadAt, SliceReadAt};

    #[test]
    fn window_reads() {
        let source = Bytes::from_static(b"{\"a\": [1, 2, 3]}");
        let window = SliceReadAt::try_new(source, FileRange::new(6, 9)).unwrap();
        assert_eq!(window.size().unwrap(), 9);
        assert_eq!(window.read_byte_range(0..9).unwrap().as_ref(), b"[1, 2, 3]");
        assert_eq!(window.read_byte_range(1..2).unwrap().as_ref(), b"1");

        let err = window.read_byte_range(5..10).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn window_past_end_is_rejected() {
        let source = Bytes::from_static(b"[1, 2]");
        let err = SliceReadAt::try_new(source, FileRange::new(4, 8))
            .err()
            .unwrap();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }
}
