//! Seekable duplex buffer that retains every byte ever written (spec §4.5).

use nbio_core::buffer::{ByteBuffer, Cursor};
use nbio_core::error::{StreamError, StreamResult};
use nbio_core::traits::{Readable, Seekable, Whence, Writable};
use std::time::Duration;

/// A seekable, in-memory duplex buffer.
///
/// Unlike [`crate::memory_stream::MemoryStream`], reads here are cursor-based
/// rather than FIFO: nothing is ever removed from the buffer, and `seek` can
/// move the cursor backwards to re-read or splice earlier bytes.
pub struct MemorySink {
    buffer: ByteBuffer,
    cursor: usize,
    open: bool,
    writable: bool,
}

fn read_at_cursor(buffer: &mut ByteBuffer, offset: usize, length: usize, stop_byte: Option<u8>) -> (Vec<u8>, usize) {
    let total = buffer.len();
    let start = offset.min(total);
    let available = buffer.peek(total - start, start);
    let mut take = if length == 0 {
        available.len()
    } else {
        length.min(available.len())
    };
    if let Some(b) = stop_byte {
        if let Some(p) = available.iter().position(|&x| x == b) {
            if length == 0 || p < length {
                take = p + 1;
            }
        }
    }
    (available[..take].to_vec(), start + take)
}

fn write_at_cursor(buffer: &mut ByteBuffer, offset: usize, data: &[u8]) -> usize {
    if offset >= buffer.len() {
        buffer.push(data);
    } else {
        let mut c = Cursor::at(buffer, offset);
        c.insert(data);
    }
    offset + data.len()
}

impl MemorySink {
    /// An empty sink.
    pub fn new() -> Self {
        Self {
            buffer: ByteBuffer::new(),
            cursor: 0,
            open: true,
            writable: true,
        }
    }

    /// A sink pre-populated with `bytes`, cursor at the start.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            buffer: ByteBuffer::from_bytes(bytes),
            cursor: 0,
            open: true,
            writable: true,
        }
    }

    /// Close the sink. Idempotent.
    pub fn close(&mut self) {
        self.open = false;
        self.writable = false;
    }

    /// A snapshot of every byte currently retained, regardless of cursor.
    pub fn contents(&self) -> Vec<u8> {
        self.buffer.peek(self.buffer.len(), 0)
    }
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new()
    }
}

impl Readable for MemorySink {
    async fn read(
        &mut self,
        length: usize,
        stop_byte: Option<u8>,
        _timeout: Option<Duration>,
    ) -> StreamResult<Vec<u8>> {
        if !self.is_readable() {
            return Err(StreamError::Unreadable);
        }
        let (bytes, new_offset) = read_at_cursor(&mut self.buffer, self.cursor, length, stop_byte);
        self.cursor = new_offset;
        Ok(bytes)
    }

    fn is_readable(&self) -> bool {
        self.open && self.cursor < self.buffer.len()
    }
}

impl Writable for MemorySink {
    async fn write(&mut self, data: &[u8], _timeout: Option<Duration>) -> StreamResult<usize> {
        if !self.writable {
            return Err(StreamError::Unwritable);
        }
        self.cursor = write_at_cursor(&mut self.buffer, self.cursor, data);
        Ok(data.len())
    }

    async fn end(&mut self, data: &[u8], timeout: Option<Duration>) -> StreamResult<usize> {
        let n = self.write(data, timeout).await?;
        self.writable = false;
        Ok(n)
    }

    fn is_writable(&self) -> bool {
        self.writable
    }
}

impl Seekable for MemorySink {
    async fn seek(
        &mut self,
        offset: i64,
        whence: Whence,
        _timeout: Option<Duration>,
    ) -> StreamResult<u64> {
        let len = self.buffer.len() as i64;
        let base = match whence {
            Whence::Start => 0,
            Whence::Current => self.cursor as i64,
            Whence::End => len,
        };
        let target = base
            .checked_add(offset)
            .ok_or(StreamError::OutOfBounds)?;
        if target < 0 || target > len {
            return Err(StreamError::OutOfBounds);
        }
        self.cursor = target as usize;
        Ok(target as u64)
    }

    async fn tell(&mut self) -> StreamResult<u64> {
        Ok(self.cursor as u64)
    }

    async fn length(&mut self) -> StreamResult<u64> {
        Ok(self.buffer.len() as u64)
    }
}
