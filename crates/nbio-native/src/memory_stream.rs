//! In-process duplex stream backed by a [`ByteBuffer`], with high-water-mark
//! flow control (spec §4.4).

use crate::util::await_wake;
use nbio_core::buffer::ByteBuffer;
use nbio_core::error::{StreamError, StreamResult};
use nbio_core::traits::{Readable, Writable};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;
use tokio::sync::oneshot;

struct ReadTicket {
    length: usize,
    stop_byte: Option<u8>,
    tx: oneshot::Sender<StreamResult<Vec<u8>>>,
}

struct WriteTicket {
    len: usize,
    tx: oneshot::Sender<StreamResult<usize>>,
}

struct Inner {
    buffer: ByteBuffer,
    high_water_mark: usize,
    open: bool,
    readable: bool,
    writable: bool,
    read_queue: VecDeque<ReadTicket>,
    write_queue: VecDeque<WriteTicket>,
}

impl Inner {
    fn new(high_water_mark: usize) -> Self {
        Self {
            buffer: ByteBuffer::new(),
            high_water_mark,
            open: true,
            readable: true,
            writable: true,
            read_queue: VecDeque::new(),
            write_queue: VecDeque::new(),
        }
    }
}

/// Apply the extract policy from spec §4.4 given a requested `length`
/// (`0` meaning "all available") and optional `stop_byte`.
fn extract(buffer: &mut ByteBuffer, length: usize, stop_byte: Option<u8>) -> Vec<u8> {
    if let Some(b) = stop_byte {
        if let Some(p) = buffer.search(b) {
            return if length == 0 || p < length {
                buffer.shift(p + 1)
            } else {
                buffer.shift(length)
            };
        }
    }
    if length == 0 {
        buffer.drain()
    } else {
        buffer.shift(length)
    }
}

fn release_all_writers(inner: &mut Inner) {
    while let Some(ticket) = inner.write_queue.pop_front() {
        let _ = ticket.tx.send(Ok(ticket.len));
    }
}

/// Drain as much of the pending-read queue as the buffer allows, in FIFO
/// order, discarding any ticket whose caller has already dropped its future.
fn serve_reads(inner: &mut Inner) {
    loop {
        match inner.read_queue.front() {
            Some(ticket) if ticket.tx.is_closed() => {
                inner.read_queue.pop_front();
                continue;
            }
            Some(_) if !inner.buffer.is_empty() => {
                let ticket = inner.read_queue.pop_front().unwrap();
                let bytes = extract(&mut inner.buffer, ticket.length, ticket.stop_byte);
                let _ = ticket.tx.send(Ok(bytes));
                if inner.high_water_mark > 0 && inner.buffer.len() <= inner.high_water_mark {
                    release_all_writers(inner);
                }
                maybe_close_after_drain(inner);
            }
            _ => break,
        }
    }
}

fn maybe_close_after_drain(inner: &mut Inner) {
    if inner.open && !inner.writable && inner.buffer.is_empty() {
        close_inner(inner, None);
    }
}

fn close_inner(inner: &mut Inner, cause: Option<StreamError>) {
    if !inner.open {
        return;
    }
    inner.open = false;
    inner.readable = false;
    inner.writable = false;
    while let Some(ticket) = inner.read_queue.pop_front() {
        let _ = ticket.tx.send(Ok(Vec::new()));
    }
    while let Some(ticket) = inner.write_queue.pop_front() {
        let err = match &cause {
            Some(c) => StreamError::closed_with_cause(c.clone()),
            None => StreamError::closed(),
        };
        let _ = ticket.tx.send(Err(err));
    }
}

/// An in-process duplex stream: bytes written to it are observed, in order,
/// by reads against the same handle (or a `clone()` of it — cloning shares
/// the underlying buffer, it does not copy it).
///
/// Not `Send`/`Sync`: the single `Rc<RefCell<_>>` matches the crate-wide
/// rule that a stream is owned by one logical (single-threaded) task at a
/// time.
#[derive(Clone)]
pub struct MemoryStream {
    inner: Rc<RefCell<Inner>>,
}

impl MemoryStream {
    /// A stream with no high-water mark (writes never park).
    pub fn new() -> Self {
        Self::with_high_water_mark(0)
    }

    /// A stream that parks writers once the buffer exceeds `hwm` bytes.
    pub fn with_high_water_mark(hwm: usize) -> Self {
        Self {
            inner: Rc::new(RefCell::new(Inner::new(hwm))),
        }
    }

    /// Build from a [`nbio_core::config::StreamConfig`]'s default HWM.
    pub fn with_config(config: &nbio_core::config::StreamConfig) -> Self {
        Self::with_high_water_mark(config.default_high_water_mark)
    }

    /// Prepend bytes so they are returned before anything already buffered.
    ///
    /// If a reader is parked and the buffer becomes non-empty, it is woken
    /// immediately; this is a synchronous operation, never suspends.
    pub fn unshift(&mut self, data: &[u8]) {
        let mut inner = self.inner.borrow_mut();
        inner.buffer.unshift(data);
        serve_reads(&mut inner);
    }

    /// Close the stream. Idempotent: a second call changes nothing.
    pub fn close(&mut self) {
        let mut inner = self.inner.borrow_mut();
        close_inner(&mut inner, None);
    }

    /// Number of bytes currently buffered and not yet delivered to a reader.
    pub fn buffered_len(&self) -> usize {
        self.inner.borrow().buffer.len()
    }

    /// Whether the stream is open (readable or writable or both).
    pub fn is_open(&self) -> bool {
        self.inner.borrow().open
    }
}

impl Default for MemoryStream {
    fn default() -> Self {
        Self::new()
    }
}

impl Readable for MemoryStream {
    async fn read(
        &mut self,
        length: usize,
        stop_byte: Option<u8>,
        timeout: Option<Duration>,
    ) -> StreamResult<Vec<u8>> {
        let rx = {
            let mut inner = self.inner.borrow_mut();
            if !inner.readable {
                return Err(StreamError::Unreadable);
            }
            let (tx, rx) = oneshot::channel();
            inner.read_queue.push_back(ReadTicket {
                length,
                stop_byte,
                tx,
            });
            serve_reads(&mut inner);
            rx
        };
        tracing::trace!(length, ?stop_byte, "memory_stream: read parked or served");
        await_wake(rx, timeout).await
    }

    fn is_readable(&self) -> bool {
        self.inner.borrow().readable
    }
}

impl Writable for MemoryStream {
    async fn write(&mut self, data: &[u8], timeout: Option<Duration>) -> StreamResult<usize> {
        let rx = {
            let mut inner = self.inner.borrow_mut();
            if !inner.writable {
                return Err(StreamError::Unwritable);
            }
            inner.buffer.push(data);
            serve_reads(&mut inner);
            if inner.high_water_mark > 0 && inner.buffer.len() > inner.high_water_mark {
                let (tx, rx) = oneshot::channel();
                inner.write_queue.push_back(WriteTicket {
                    len: data.len(),
                    tx,
                });
                rx
            } else {
                return Ok(data.len());
            }
        };
        tracing::trace!(len = data.len(), "memory_stream: write parked on high water mark");
        await_wake(rx, timeout).await
    }

    async fn end(&mut self, data: &[u8], timeout: Option<Duration>) -> StreamResult<usize> {
        let rx = {
            let mut inner = self.inner.borrow_mut();
            if !inner.writable {
                return Err(StreamError::Unwritable);
            }
            inner.buffer.push(data);
            inner.writable = false;
            serve_reads(&mut inner);
            maybe_close_after_drain(&mut inner);
            if inner.open
                && inner.high_water_mark > 0
                && inner.buffer.len() > inner.high_water_mark
            {
                let (tx, rx) = oneshot::channel();
                inner.write_queue.push_back(WriteTicket {
                    len: data.len(),
                    tx,
                });
                rx
            } else {
                return Ok(data.len());
            }
        };
        await_wake(rx, timeout).await
    }

    fn is_writable(&self) -> bool {
        self.inner.borrow().writable
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn s1_write_then_read_all() {
        let mut s = MemoryStream::new();
        s.write(b"abcdefghijklmnopqrstuvwxyz", None).await.unwrap();
        let out = s.read(0, None, None).await.unwrap();
        assert_eq!(out, b"abcdefghijklmnopqrstuvwxyz");
    }

    #[tokio::test]
    async fn s2_stop_byte_then_remainder() {
        let mut s = MemoryStream::new();
        s.write(b"abcdefghijklmnopqrstuvwxyz", None).await.unwrap();
        let first = s.read(0, Some(b'f'), None).await.unwrap();
        assert_eq!(first, b"abcdef");
        let rest = s.read(0, None, None).await.unwrap();
        assert_eq!(rest, b"ghijklmnopqrstuvwxyz");
    }

    #[tokio::test]
    async fn s3_partial_length_reads() {
        let mut s = MemoryStream::new();
        s.write(b"abcdefghijklmnopqrstuvwxyz", None).await.unwrap();
        assert_eq!(s.read(13, None, None).await.unwrap(), b"abcdefghijklm");
        assert_eq!(s.read(13, None, None).await.unwrap(), b"nopqrstuvwxyz");
    }

    #[tokio::test]
    async fn s4_unshift_precedes_buffered_bytes() {
        let mut s = MemoryStream::new();
        s.write(b"abcdefghijklmnopqrstuvwxyz", None).await.unwrap();
        s.unshift(b"1234567890");
        let out = s.read(0, None, None).await.unwrap();
        assert_eq!(out, b"1234567890abcdefghijklmnopqrstuvwxyz");
    }

    #[tokio::test]
    async fn read_parks_until_a_write_arrives() {
        let local = tokio::task::LocalSet::new();
        local
            .run_until(async move {
                let mut s = MemoryStream::new();
                let mut reader = s.clone();
                let handle =
                    tokio::task::spawn_local(async move { reader.read(0, None, None).await });
                tokio::task::yield_now().await;
                s.write(b"late", None).await.unwrap();
                let out = handle.await.unwrap().unwrap();
                assert_eq!(out, b"late");
            })
            .await;
    }

    #[tokio::test]
    async fn simultaneous_reads_are_fifo_and_disjoint() {
        let mut s = MemoryStream::new();
        let mut r1 = s.clone();
        let mut r2 = s.clone();
        let local = tokio::task::LocalSet::new();
        local
            .run_until(async move {
                let h1 = tokio::task::spawn_local(async move { r1.read(3, None, None).await });
                tokio::task::yield_now().await;
                let h2 = tokio::task::spawn_local(async move { r2.read(3, None, None).await });
                tokio::task::yield_now().await;
                s.write(b"abcdef", None).await.unwrap();
                let a = h1.await.unwrap().unwrap();
                let b = h2.await.unwrap().unwrap();
                assert_eq!(a, b"abc");
                assert_eq!(b, b"def");
            })
            .await;
    }

    #[tokio::test]
    async fn end_then_empty_closes() {
        let mut s = MemoryStream::new();
        s.write(b"hi", None).await.unwrap();
        s.end(b"!", None).await.unwrap();
        assert!(!s.is_writable());
        let out = s.read(0, None, None).await.unwrap();
        assert_eq!(out, b"hi!");
        assert!(!s.is_open());
        assert_eq!(s.read(0, None, None).await, Err(StreamError::Unreadable));
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let mut s = MemoryStream::new();
        s.close();
        assert!(!s.is_open());
        s.close();
        assert!(!s.is_open());
    }

    #[tokio::test]
    async fn high_water_mark_parks_writer_until_drained() {
        let local = tokio::task::LocalSet::new();
        local
            .run_until(async move {
                let mut s = MemoryStream::with_high_water_mark(4);
                assert_eq!(s.write(b"ab", None).await.unwrap(), 2);
                let mut writer = s.clone();
                let handle =
                    tokio::task::spawn_local(async move { writer.write(b"abcdef", None).await });
                tokio::task::yield_now().await;
                assert_eq!(s.buffered_len(), 8);
                let read = s.read(2, None, None).await.unwrap();
                assert_eq!(read, b"ab");
                let written = handle.await.unwrap().unwrap();
                assert_eq!(written, 6);
            })
            .await;
    }
}
