//! Exporting a reader through the Arrow C stream interface.

use std::ptr;

use arrow_array::ffi_stream::FFI_ArrowArrayStream;

use crate::error::{jt_error, try_or};
use crate::reader::jt_reader;

/// Export `reader` as an Arrow C stream into the caller-allocated `out`.
///
/// The reader is prepared first if needed. The stream holds its own reference to the reader, so
/// `reader` may be freed while the stream is in use. Releasing the stream through its `release`
/// callback drops that reference. All streams of a reader share its position.
#[unsafe(no_mangle)]
pub unsafe extern "C-unwind" fn jt_reader_array_stream(
    reader: *const jt_reader,
    out: *mut FFI_ArrowArrayStream,
    error: *mut *mut jt_error,
) -> bool {
    let reader = jt_reader::shared(reader).clone();
    try_or(error, false, || {
        reader.with(|r| r.prepare())?;
        unsafe { ptr::write(out, FFI_ArrowArrayStream::new(Box::new(reader))) };
        Ok(true)
    })
}

#[cfg(test)]
mod tests {
    use std::ops::Range;
    use std::sync::Arc;
    use std::{io, ptr};
    use std::sync::atomic::{AtomicUsize, Ordering};

    use arrow_array::cast::AsArray;
    use arrow_array::ffi_stream::ArrowArrayStreamReader;
    use arrow_array::types::Int64Type;
    use arrow_array::{RecordBatch, RecordBatchReader};
    use bytes::Bytes;
    use jsontab::io::ReadAt;

    use super::*;
    use crate::reader::{jt_reader_free, jt_reader_resolve};
    use crate::source::{jt_source, jt_source_from_buffer};

    struct DropTracked {
        bytes: Bytes,
        drops: Arc<AtomicUsize>,
    }

    impl ReadAt for DropTracked {
        fn read_byte_range(&self, range: Range<u64>) -> io::Result<Bytes> {
            self.bytes.read_byte_range(range)
        }

        fn size(&self) -> io::Result<u64> {
            self.bytes.size()
        }
    }

    impl Drop for DropTracked {
        fn drop(&mut self) {
            self.drops.fetch_add(1, Ordering::SeqCst);
        }
    }

    const ROWS: &str = r#"[{"v": 1}, {"v": 2}, {"v": 3}, {"v": 4}, {"v": 5}]"#;

    #[test]
    fn stream_yields_every_batch() {
        unsafe {
            let mut error = ptr::null_mut();
            let source = jt_source_from_buffer(ROWS.as_ptr(), ROWS.len());
            let reader = jt_reader_resolve(source, c"{\"batch_size\": 2}".as_ptr(), &mut error);
            assert!(error.is_null());

            let mut stream = FFI_ArrowArrayStream::empty();
            assert!(jt_reader_array_stream(reader, &mut stream, &mut error));
            jt_reader_free(reader);

            let stream = ArrowArrayStreamReader::try_new(stream).unwrap();
            assert_eq!(stream.schema().field(0).name(), "v");
            let batches = stream.collect::<Result<Vec<RecordBatch>, _>>().unwrap();
            assert_eq!(
                batches.iter().map(RecordBatch::num_rows).collect::<Vec<_>>(),
                vec![2, 2, 1]
            );
            let values = batches
                .iter()
                .flat_map(|b| b.column(0).as_primitive::<Int64Type>().values().to_vec())
                .collect::<Vec<_>>();
            assert_eq!(values, vec![1, 2, 3, 4, 5]);
        }
    }

    #[test]
    fn releasing_a_partly_read_stream_drops_the_source_once() {
        let drops = Arc::new(AtomicUsize::new(0));
        unsafe {
            let source = jt_source::new(Arc::new(DropTracked {
                bytes: Bytes::from_static(ROWS.as_bytes()),
                drops: drops.clone(),
            }));
            let mut error = ptr::null_mut();
            let reader = jt_reader_resolve(source, c"{\"batch_size\": 1}".as_ptr(), &mut error);
            assert!(error.is_null());

            let mut stream = FFI_ArrowArrayStream::empty();
            assert!(jt_reader_array_stream(reader, &mut stream, &mut error));
            let mut stream = ArrowArrayStreamReader::try_new(stream).unwrap();
            assert_eq!(stream.next().unwrap().unwrap().num_rows(), 1);

            jt_reader_free(reader);
            assert_eq!(drops.load(Ordering::SeqCst), 0);
            drop(stream);
            assert_eq!(drops.load(Ordering::SeqCst), 1);
        }
    }
}
