//! Byte sinks for connection dumps
//!
//! Both sinks accept the same field-by-field stream and produce identical
//! bytes; they differ only in when the bytes reach the underlying writer.

use crate::error::{Result, StorageError};

use std::io::Write;

/// Destination of serialized checkpoint fields
pub trait CheckpointSink {
    /// Append one field
    fn write_field(&mut self, field: &[u8]) -> Result<()>;

    /// Push any buffered bytes to the underlying writer
    fn finish(&mut self) -> Result<()>;

    /// Total number of field bytes accepted so far
    fn bytes_written(&self) -> u64;
}

/// Plain streaming sink: fields go straight to the writer in order
pub struct StreamSink<W> {
    inner: W,
    bytes_written: u64,
}

impl<W: Write> StreamSink<W> {
    /// Wrap a writer
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            bytes_written: 0,
        }
    }

    /// Get the wrapped writer back
    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> CheckpointSink for StreamSink<W> {
    fn write_field(&mut self, field: &[u8]) -> Result<()> {
        self.inner.write_all(field)?;
        self.bytes_written += field.len() as u64;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.inner.flush()?;
        Ok(())
    }

    fn bytes_written(&self) -> u64 {
        self.bytes_written
    }
}

/// Chunked sink for parallel file layouts.
///
/// Fields are packed into an in-memory chunk. The caller states the chunk size
/// and how much space is left in the chunk it is currently positioned in.
/// Whenever the space left is smaller than the next field, the filled part of
/// the chunk is written out and the buffer restarts as a fresh chunk.
pub struct ChunkedSink<W> {
    inner: W,
    buf: Vec<u8>,
    chunk_size: usize,
    left: usize,
    buf_start: usize,
    flushes: usize,
    bytes_written: u64,
}

impl<W: Write> ChunkedSink<W> {
    /// Create a sink positioned `chunk_size - chunk_size_left` bytes into a chunk
    pub fn new(inner: W, chunk_size: usize, chunk_size_left: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(StorageError::ChunkTooSmall {
                chunk_size,
                field_len: 1,
            });
        }
        if chunk_size_left > chunk_size {
            return Err(StorageError::invalid_format(format!(
                "chunk space left ({}) exceeds chunk size ({})",
                chunk_size_left, chunk_size
            )));
        }

        let buf_start = chunk_size - chunk_size_left;
        Ok(Self {
            inner,
            buf: vec![0u8; chunk_size],
            chunk_size,
            left: chunk_size_left,
            buf_start,
            flushes: 0,
            bytes_written: 0,
        })
    }

    /// Chunk size in bytes
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Space left in the current chunk
    pub fn chunk_size_left(&self) -> usize {
        self.left
    }

    /// Number of times a filled chunk was written out
    pub fn flush_count(&self) -> usize {
        self.flushes
    }

    /// Get the wrapped writer back. Unflushed bytes are discarded; call
    /// [`CheckpointSink::finish`] first.
    pub fn into_inner(self) -> W {
        self.inner
    }

    fn fill_end(&self) -> usize {
        self.chunk_size - self.left
    }

    fn flush_filled(&mut self) -> Result<()> {
        let end = self.fill_end();
        if end > self.buf_start {
            self.inner.write_all(&self.buf[self.buf_start..end])?;
            self.flushes += 1;
        }
        Ok(())
    }
}

impl<W: Write> CheckpointSink for ChunkedSink<W> {
    fn write_field(&mut self, field: &[u8]) -> Result<()> {
        if field.len() > self.chunk_size {
            return Err(StorageError::ChunkTooSmall {
                chunk_size: self.chunk_size,
                field_len: field.len(),
            });
        }

        if self.left < field.len() {
            self.flush_filled()?;
            self.left = self.chunk_size;
            self.buf_start = 0;
        }

        let start = self.fill_end();
        self.buf[start..start + field.len()].copy_from_slice(field);
        self.left -= field.len();
        self.bytes_written += field.len() as u64;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.flush_filled()?;
        // Keep the chunk position so that later fields continue this chunk.
        self.buf_start = self.fill_end();
        self.inner.flush()?;
        Ok(())
    }

    fn bytes_written(&self) -> u64 {
        self.bytes_written
    }
}
