//! Non-blocking descriptor write with an ordered ticket queue (spec §4.7).

use crate::fd::{close_fd, RawFdIo};
use crate::reactor_tokio::TokioReactor;
use nbio_core::error::{StreamError, StreamResult};
use nbio_core::reactor::{Readiness, Reactor, Watcher};
use nbio_core::traits::{DescriptorBacked, Writable};
use nbio_core::StreamConfig;
use std::collections::VecDeque;
use std::io::Write;
use std::os::fd::RawFd;
use std::time::Duration;

/// A single queued write, in submission order.
struct Ticket {
    /// Remaining bytes to write (empty for an `await` ticket).
    data: Vec<u8>,
    /// Bytes already accepted for this logical call before this ticket.
    prev: usize,
    timeout: Option<Duration>,
}

/// A writable, non-blocking descriptor stream.
///
/// Like [`crate::readable_pipe::ReadablePipe`], owned by exactly one task;
/// every method takes `&mut self`.
pub struct WritablePipe<Rx: Reactor = TokioReactor> {
    fd: RawFd,
    io: RawFdIo,
    watcher: Rx::Watcher,
    reactor: Rx,
    queue: VecDeque<Ticket>,
    open: bool,
    writable: bool,
    auto_close: bool,
    chunk_size: usize,
}

impl<Rx: Reactor> WritablePipe<Rx> {
    pub fn with_reactor(fd: RawFd, reactor: Rx, auto_close: bool, config: StreamConfig) -> Self {
        let watcher = reactor.await_ready(fd);
        Self {
            fd,
            io: RawFdIo(fd),
            watcher,
            reactor,
            queue: VecDeque::new(),
            open: true,
            writable: true,
            auto_close,
            chunk_size: config.chunk_size,
        }
    }

    pub fn close(&mut self) {
        self.close_with_cause(None);
    }

    fn close_with_cause(&mut self, cause: Option<StreamError>) {
        if !self.open {
            return;
        }
        self.open = false;
        self.writable = false;
        self.watcher.cancel();
        // Queued tickets carry no separate wake handle — each pending
        // `write`/`await_writable` call owns its own loop over `&mut self`
        // and observes the queue draining out from under it on its next
        // `watcher.listen` resolution, so clearing here is enough.
        self.queue.clear();
        if self.auto_close {
            close_fd(self.fd);
        }
        tracing::debug!(fd = self.fd, "writable pipe closed");
        let _ = cause;
    }

    /// Queue an empty ticket that resolves once the descriptor is
    /// write-ready (or the existing queue drains). The explicit
    /// "backpressure-empty" signal.
    pub async fn await_writable(&mut self, timeout: Option<Duration>) -> StreamResult<usize> {
        if !self.writable {
            return Err(StreamError::Unwritable);
        }
        self.send(&[], timeout, false).await
    }

    async fn send(&mut self, data: &[u8], timeout: Option<Duration>, end: bool) -> StreamResult<usize> {
        if !self.writable {
            return Err(StreamError::Unwritable);
        }
        if end {
            self.writable = false;
        }
        let length = data.len();
        if self.queue.is_empty() && data.is_empty() {
            // An `await_writable` ticket: writing zero bytes always
            // succeeds regardless of readiness, so it must not take the
            // synchronous fast path below — queue it and let the loop
            // wait on the watcher instead.
            self.queue.push_back(Ticket {
                data: Vec::new(),
                prev: 0,
                timeout,
            });
        } else if self.queue.is_empty() {
            match self.io.write(&data[..data.len().min(self.chunk_size)]) {
                Ok(n) if n == data.len() => {
                    tracing::trace!(fd = self.fd, n, "writable pipe wrote synchronously");
                    if end {
                        self.close();
                    }
                    return Ok(length);
                }
                Ok(n) => {
                    self.queue.push_back(Ticket {
                        data: data[n..].to_vec(),
                        prev: n,
                        timeout,
                    });
                }
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    self.queue.push_back(Ticket {
                        data: data.to_vec(),
                        prev: 0,
                        timeout,
                    });
                }
                Err(e) => {
                    tracing::warn!(fd = self.fd, error = %e, "writable pipe failed");
                    let cause = StreamError::Failure(e);
                    self.close_with_cause(Some(cause.clone()));
                    return Err(cause);
                }
            }
        } else {
            self.queue.push_back(Ticket {
                data: data.to_vec(),
                prev: 0,
                timeout,
            });
        }

        loop {
            let head_timeout = self.queue.front().and_then(|t| t.timeout);
            match self.watcher.listen(head_timeout).await {
                Readiness::Expired => {
                    self.queue.pop_front();
                    self.close_with_cause(Some(StreamError::Timeout));
                    return Err(StreamError::Timeout);
                }
                Readiness::Ready => {}
            }
            let Some(mut head) = self.queue.pop_front() else {
                return Ok(length);
            };
            if head.data.is_empty() {
                let result = head.prev;
                if end && self.queue.is_empty() {
                    self.close();
                }
                return Ok(result);
            }
            match self.io.write(&head.data) {
                Ok(n) if n == head.data.len() => {
                    let total = head.prev + n;
                    if self.queue.is_empty() {
                        if end {
                            self.close();
                        }
                        return Ok(total);
                    }
                    // Another caller's ticket is ahead of this logical
                    // write's completion in submission order — shouldn't
                    // happen for a single in-flight `send`, but if callers
                    // interleave via separate tasks each ticket still
                    // resolves with its own accumulated `prev`.
                    return Ok(total);
                }
                Ok(n) => {
                    head.prev += n;
                    head.data.drain(..n);
                    self.queue.push_front(head);
                }
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    self.queue.push_front(head);
                }
                Err(e) => {
                    let cause = StreamError::Failure(e);
                    self.close_with_cause(Some(cause.clone()));
                    return Err(cause);
                }
            }
        }
    }

    pub fn rebind_with(&mut self, reactor: Rx) {
        self.watcher = reactor.await_ready(self.fd);
        self.reactor = reactor;
    }
}

impl<Rx: Reactor> Writable for WritablePipe<Rx> {
    async fn write(&mut self, data: &[u8], timeout: Option<Duration>) -> StreamResult<usize> {
        self.send(data, timeout, false).await
    }

    async fn end(&mut self, data: &[u8], timeout: Option<Duration>) -> StreamResult<usize> {
        self.send(data, timeout, true).await
    }

    fn is_writable(&self) -> bool {
        self.writable
    }
}

impl<Rx: Reactor> DescriptorBacked for WritablePipe<Rx> {
    type Resource = RawFd;

    fn resource(&self) -> &RawFd {
        &self.fd
    }

    fn rebind(&mut self) -> StreamResult<()> {
        self.watcher = self.reactor.await_ready(self.fd);
        Ok(())
    }
}

impl WritablePipe<TokioReactor> {
    pub fn new(fd: RawFd, auto_close: bool, config: StreamConfig) -> Self {
        Self::with_reactor(fd, TokioReactor::new(), auto_close, config)
    }
}

impl<Rx: Reactor> Drop for WritablePipe<Rx> {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fd::set_nonblocking;
    use std::io::Read;
    use std::os::fd::{AsRawFd, IntoRawFd};
    use std::os::unix::net::UnixStream;

    fn pair() -> (RawFd, UnixStream) {
        let (a, b) = UnixStream::pair().unwrap();
        set_nonblocking(a.as_raw_fd()).unwrap();
        let fd = a.into_raw_fd();
        (fd, b)
    }

    #[tokio::test]
    async fn write_then_end_closes() {
        let (fd, mut peer) = pair();
        let mut wp = WritablePipe::new(fd, true, StreamConfig::default());
        let n = wp.end(b"bye", None).await.unwrap();
        assert_eq!(n, 3);
        assert!(!wp.is_writable());
        let mut buf = Vec::new();
        peer.read_to_end(&mut buf).unwrap();
        assert_eq!(buf, b"bye");
    }

    #[tokio::test]
    async fn write_after_end_fails() {
        let (fd, _peer) = pair();
        let mut wp = WritablePipe::new(fd, true, StreamConfig::default());
        wp.end(b"x", None).await.unwrap();
        let err = wp.write(b"y", None).await.unwrap_err();
        assert_eq!(err, StreamError::Unwritable);
    }

    #[tokio::test]
    async fn await_writable_waits_for_readiness_not_just_a_zero_byte_write() {
        let (fd, _peer) = pair();
        let mut wp = WritablePipe::new(fd, true, StreamConfig::default());
        let n = wp
            .await_writable(Some(Duration::from_millis(200)))
            .await
            .unwrap();
        assert_eq!(n, 0);
        assert!(wp.is_writable());
    }

    #[tokio::test]
    async fn write_timeout_frees_the_stream() {
        // Keep the peer alive but never read from it, so the kernel send
        // buffer eventually fills and the write blocks until it times out.
        let (fd, _peer) = pair();
        let mut wp = WritablePipe::new(fd, true, StreamConfig::default());
        let big = vec![0u8; 16 * 1024 * 1024];
        let err = wp
            .write(&big, Some(Duration::from_millis(100)))
            .await
            .unwrap_err();
        assert_eq!(err, StreamError::Timeout);
        assert!(!wp.is_writable());
    }

    #[tokio::test]
    async fn await_writable_after_end_fails() {
        let (fd, _peer) = pair();
        let mut wp = WritablePipe::new(fd, true, StreamConfig::default());
        wp.end(b"x", None).await.unwrap();
        let err = wp.await_writable(None).await.unwrap_err();
        assert_eq!(err, StreamError::Unwritable);
    }
}
