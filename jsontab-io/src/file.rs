use std::fs::File;
use std::io;
use std::ops::Range;
use std::path::Path;

use bytes::Bytes;
#[cfg(not(unix))]
use parking_lot::Mutex;

use crate::{PerformanceHint, ReadAt};

/// A [`ReadAt`] over a local file.
///
/// On unix targets reads are positional and never move a shared cursor. Elsewhere reads seek
/// and read under a lock.
pub struct FileReadAt {
    #[cfg(unix)]
    file: File,
    #[cfg(not(unix))]
    file: Mutex<File>,
}

impl FileReadAt {
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        Ok(Self::from(File::open(path)?))
    }
}

impl From<File> for FileReadAt {
    fn from(file: File) -> Self {
        Self {
            #[cfg(unix)]
            file,
            #[cfg(not(unix))]
            file: Mutex::new(file),
        }
    }
}

impl ReadAt for FileReadAt {
    fn read_byte_range(&self, range: Range<u64>) -> io::Result<Bytes> {
        let len = usize::try_from(range.end.saturating_sub(range.start)).map_err(io::Error::other)?;
        let mut buffer = vec![0u8; len];
        self.read_exact_at(&mut buffer, range.start)?;
        Ok(Bytes::from(buffer))
    }

    fn size(&self) -> io::Result<u64> {
        #[cfg(unix)]
        let metadata = self.file.metadata()?;
        #[cfg(not(unix))]
        let metadata = self.file.lock().metadata()?;
        Ok(metadata.len())
    }

    fn performance_hint(&self) -> PerformanceHint {
        PerformanceHint::local()
    }
}

impl FileReadAt {
    #[cfg(unix)]
    fn read_exact_at(&self, buffer: &mut [u8], offset: u64) -> io::Result<()> {
        use std::os::unix::fs::FileExt;

        self.file.read_exact_at(buffer, offset)
    }

    #[cfg(not(unix))]
    fn read_exact_at(&self, buffer: &mut [u8], offset: u64) -> io::Result<()> {
        use std::io::{Read, Seek, SeekFrom};

        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(buffer)
    }
}
