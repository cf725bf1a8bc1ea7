use std::io::{self, BufRead, Read, Seek, SeekFrom};

use bytes::Bytes;
use jsontab_error::jsontab_err;

use crate::ReadAt;

/// A stateful, buffered reader that wraps an internal [stateless reader][ReadAt].
///
/// Read operations advance the cursor; [`InputStream::seek_to`] moves it anywhere within the
/// source. Bytes are fetched in blocks sized by the source's
/// [`PerformanceHint`][crate::PerformanceHint], and seeking inside the current block does not
/// touch the source.
pub struct InputStream<R> {
    inner: R,
    len: Option<u64>,
    block_size: u64,
    buffer: Bytes,
    buffer_start: u64,
    pos: u64,
}

impl<R: ReadAt> InputStream<R> {
    /// Create a new buffered reader with reads beginning at offset 0.
    pub fn new(inner: R) -> Self {
        let block_size = inner.performance_hint().block_size();
        Self {
            inner,
            len: None,
            block_size,
            buffer: Bytes::new(),
            buffer_start: 0,
            pos: 0,
        }
    }

    /// Override the number of bytes fetched per read.
    pub fn with_block_size(mut self, block_size: u64) -> Self {
        self.block_size = block_size.max(1);
        self
    }

    pub fn inner(&self) -> &R {
        &self.inner
    }

    /// The offset of the next byte to be read.
    pub fn position(&self) -> u64 {
        self.pos
    }

    /// The size of the underlying source, queried once and cached.
    pub fn source_len(&mut self) -> io::Result<u64> {
        match self.len {
            Some(len) => Ok(len),
            None => {
                let len = self.inner.size()?;
                self.len = Some(len);
                Ok(len)
            }
        }
    }

    /// Move the cursor to `pos`.
    ///
    /// The size of the source is queried again, so seeking fails with
    /// [`UnexpectedEof`][std::io::ErrorKind::UnexpectedEof] if the source shrank below `pos`.
    pub fn seek_to(&mut self, pos: u64) -> io::Result<()> {
        self.len = None;
        let len = self.source_len()?;
        if pos > len {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                jsontab_err!("cannot seek to byte {pos} of a {len}-byte source"),
            ));
        }
        if pos < self.buffer_start || pos > self.buffer_end() || self.buffer_end() > len {
            self.buffer = Bytes::new();
            self.buffer_start = pos;
        }
        self.pos = pos;
        Ok(())
    }

    /// Look at the next byte without consuming it. Returns `None` at the end of the source.
    pub fn peek(&mut self) -> io::Result<Option<u8>> {
        Ok(self.fill_buf()?.first().copied())
    }

    /// Consume and return the next byte. Returns `None` at the end of the source.
    pub fn next_byte(&mut self) -> io::Result<Option<u8>> {
        let byte = self.peek()?;
        if byte.is_some() {
            self.pos += 1;
        }
        Ok(byte)
    }

    fn buffer_end(&self) -> u64 {
        self.buffer_start + self.buffer.len() as u64
    }

    #[allow(clippy::cast_possible_truncation)]
    fn buffered(&self) -> &[u8] {
        let start = (self.pos - self.buffer_start) as usize;
        &self.buffer[start..]
    }
}

impl<R: ReadAt> Read for InputStream<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let available = self.fill_buf()?;
        let n = available.len().min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);
        self.consume(n);
        Ok(n)
    }
}

impl<R: ReadAt> BufRead for InputStream<R> {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        if self.pos >= self.buffer_start && self.pos < self.buffer_end() {
            return Ok(self.buffered());
        }

        let len = self.source_len()?;
        if self.pos >= len {
            return Ok(&[]);
        }

        let end = len.min(self.pos + self.block_size);
        let bytes = self.inner.read_byte_range(self.pos..end)?;
        if bytes.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                jsontab_err!("source returned no bytes at offset {}", self.pos),
            ));
        }
        self.buffer = bytes;
        self.buffer_start = self.pos;
        Ok(self.buffered())
    }

    fn consume(&mut self, amt: usize) {
        self.pos = self.buffer_end().min(self.pos + amt as u64);
    }
}

impl<R: ReadAt> Seek for InputStream<R> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(offset) => Some(offset),
            SeekFrom::End(delta) => self.source_len()?.checked_add_signed(delta),
            SeekFrom::Current(delta) => self.pos.checked_add_signed(delta),
        };
        let target = target.ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                jsontab_err!("seek before the start of the source"),
            )
        })?;
        self.seek_to(target)?;
        Ok(target)
    }

    fn stream_position(&mut self) -> io::Result<u64> {
        Ok(self.pos)
    }
}

#[cfg(test)]
mod tests {
    use std::io::{self, BufRead, Read, Seek, SeekFrom};
    use std::ops::Range;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

    use bytes::Bytes;
    use rstest::rstest;

    use crate::{InputStream, ReadAt};

    /// A source that counts its reads and can be truncated after the fact.
    struct CountingSource {
        bytes: Bytes,
        len: AtomicU64,
        reads: AtomicUsize,
    }

    impl CountingSource {
        fn new(bytes: &'static [u8]) -> Arc<Self> {
            Arc::new(Self {
                bytes: Bytes::from_static(bytes),
                len: AtomicU64::new(bytes.len() as u64),
                reads: AtomicUsize::new(0),
            })
        }
    }

    impl ReadAt for CountingSource {
        fn read_byte_range(&self, range: Range<u64>) -> io::Result<Bytes> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            if range.end > self.len.load(Ordering::SeqCst) {
                return Err(io::Error::from(io::ErrorKind::UnexpectedEof));
            }
            self.bytes.read_byte_range(range)
        }

        fn size(&self) -> io::Result<u64> {
            Ok(self.len.load(Ordering::SeqCst))
        }
    }

    #[rstest]
    #[case(1)]
    #[case(3)]
    #[case(64)]
    fn reads_everything(#[case] block_size: u64) {
        let source = CountingSource::new(b"0123456789");
        let mut stream = InputStream::new(source).with_block_size(block_size);
        let mut out = String::new();
        stream.read_to_string(&mut out).unwrap();
        assert_eq!(out, "0123456789");
        assert_eq!(stream.position(), 10);
        assert_eq!(stream.peek().unwrap(), None);
    }

    #[test]
    fn seek_within_block_does_not_read() {
        let source = CountingSource::new(b"0123456789");
        let mut stream = InputStream::new(source.clone()).with_block_size(16);
        assert_eq!(stream.next_byte().unwrap(), Some(b'0'));
        assert_eq!(stream.next_byte().unwrap(), Some(b'1'));
        stream.seek_to(7).unwrap();
        assert_eq!(stream.next_byte().unwrap(), Some(b'7'));
        stream.seek(SeekFrom::Start(0)).unwrap();
        assert_eq!(stream.fill_buf().unwrap(), b"0123456789");
        assert_eq!(source.reads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn seek_past_truncated_source_fails() {
        let source = CountingSource::new(b"0123456789");
        let mut stream = InputStream::new(source.clone());
        stream.seek_to(8).unwrap();
        source.len.store(4, Ordering::SeqCst);
        let err = stream.seek_to(8).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
        stream.seek_to(2).unwrap();
        assert_eq!(stream.next_byte().unwrap(), Some(b'2'));
    }

    #[test]
    fn relative_seeks() {
        let mut stream = InputStream::new(Bytes::from_static(b"abcdef"));
        assert_eq!(stream.seek(SeekFrom::End(-2)).unwrap(), 4);
        assert_eq!(stream.next_byte().unwrap(), Some(b'e'));
        assert_eq!(stream.seek(SeekFrom::Current(-3)).unwrap(), 2);
        assert_eq!(stream.next_byte().unwrap(), Some(b'c'));
        assert!(stream.seek(SeekFrom::Current(-10)).is_err());
    }
}
