//! Non-blocking descriptor read, driven by a [`Reactor`] (spec §4.6).

use crate::fd::{close_fd, RawFdIo};
use crate::reactor_tokio::TokioReactor;
use nbio_core::error::{StreamError, StreamResult};
use nbio_core::reactor::{Readiness, Reactor, Watcher};
use nbio_core::traits::{DescriptorBacked, Readable};
use nbio_core::StreamConfig;
use std::io::Read;
use std::os::fd::RawFd;
use std::time::Duration;

/// A readable, non-blocking descriptor stream.
///
/// Owned exclusively by one task (every method takes `&mut self`): the
/// crate does not support calling `read`/`unshift` on the same pipe from
/// two tasks concurrently, matching the "one logical owner" non-goal.
pub struct ReadablePipe<Rx: Reactor = TokioReactor> {
    fd: RawFd,
    io: RawFdIo,
    watcher: Rx::Watcher,
    reactor: Rx,
    buffer: Vec<u8>,
    open: bool,
    readable: bool,
    auto_close: bool,
    chunk_size: usize,
}

enum Fetch {
    Data(Vec<u8>),
    WouldBlock,
    Eof,
}

fn fetch(io: &mut RawFdIo, buffer: &mut Vec<u8>, length: usize, stop_byte: Option<u8>) -> std::io::Result<Fetch> {
    if buffer.len() < length {
        let want = length - buffer.len();
        let mut tmp = vec![0u8; want];
        match io.read(&mut tmp) {
            Ok(0) => {
                if buffer.is_empty() {
                    return Ok(Fetch::Eof);
                }
            }
            Ok(n) => buffer.extend_from_slice(&tmp[..n]),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                if buffer.is_empty() {
                    return Ok(Fetch::WouldBlock);
                }
            }
            Err(e) => return Err(e),
        }
    }
    if let Some(b) = stop_byte {
        if let Some(p) = buffer.iter().position(|&x| x == b) {
            return Ok(Fetch::Data(buffer.drain(..=p).collect()));
        }
    }
    if buffer.len() <= length {
        Ok(Fetch::Data(std::mem::take(buffer)))
    } else {
        Ok(Fetch::Data(buffer.drain(..length).collect()))
    }
}

impl<Rx: Reactor> ReadablePipe<Rx> {
    /// Wrap `fd` (already non-blocking) as a readable pipe using `reactor`.
    pub fn with_reactor(fd: RawFd, reactor: Rx, auto_close: bool, config: StreamConfig) -> Self {
        let watcher = reactor.poll(fd);
        Self {
            fd,
            io: RawFdIo(fd),
            watcher,
            reactor,
            buffer: Vec::new(),
            open: true,
            readable: true,
            auto_close,
            chunk_size: config.chunk_size,
        }
    }

    /// Close the stream. Idempotent.
    pub fn close(&mut self) {
        if !self.open {
            return;
        }
        self.open = false;
        self.readable = false;
        self.watcher.cancel();
        if self.auto_close {
            close_fd(self.fd);
        }
        tracing::debug!(fd = self.fd, "readable pipe closed");
    }

    /// One-shot wait for read readiness without consuming bytes.
    ///
    /// Only meaningful once the internal top-up buffer has been drained.
    pub async fn poll(&mut self, timeout: Option<Duration>) -> StreamResult<()> {
        if !self.buffer.is_empty() {
            return Err(StreamError::Failure(std::io::Error::new(
                std::io::ErrorKind::Other,
                "poll() called with a non-empty internal buffer",
            )));
        }
        match self.watcher.listen(timeout).await {
            Readiness::Ready => Ok(()),
            Readiness::Expired => Err(StreamError::Timeout),
        }
    }

    /// Prepend bytes to the internal buffer so a subsequent read observes
    /// them before any further bytes pulled from the descriptor.
    pub fn unshift(&mut self, data: &[u8]) {
        let mut combined = Vec::with_capacity(data.len() + self.buffer.len());
        combined.extend_from_slice(data);
        combined.extend_from_slice(&self.buffer);
        self.buffer = combined;
    }

    /// Reattach the watcher to `reactor`, e.g. after switching reactors.
    pub fn rebind_with(&mut self, reactor: Rx) {
        self.watcher = reactor.poll(self.fd);
        self.reactor = reactor;
    }
}

impl<Rx: Reactor> Readable for ReadablePipe<Rx> {
    async fn read(
        &mut self,
        length: usize,
        stop_byte: Option<u8>,
        timeout: Option<Duration>,
    ) -> StreamResult<Vec<u8>> {
        if !self.readable {
            return Err(StreamError::Unreadable);
        }
        let length = if length == 0 { self.chunk_size } else { length };
        loop {
            match fetch(&mut self.io, &mut self.buffer, length, stop_byte) {
                Ok(Fetch::Data(bytes)) => {
                    tracing::trace!(fd = self.fd, n = bytes.len(), "readable pipe fetched bytes");
                    return Ok(bytes);
                }
                Ok(Fetch::Eof) => {
                    tracing::debug!(fd = self.fd, "readable pipe observed EOF");
                    self.close();
                    return Ok(Vec::new());
                }
                Ok(Fetch::WouldBlock) => match self.watcher.listen(timeout).await {
                    Readiness::Ready => continue,
                    Readiness::Expired => return Err(StreamError::Timeout),
                },
                Err(e) => {
                    tracing::warn!(fd = self.fd, error = %e, "readable pipe failed");
                    let cause = StreamError::Failure(e);
                    self.close();
                    return Err(cause);
                }
            }
        }
    }

    fn is_readable(&self) -> bool {
        self.readable
    }
}

impl<Rx: Reactor> DescriptorBacked for ReadablePipe<Rx> {
    type Resource = RawFd;

    fn resource(&self) -> &RawFd {
        &self.fd
    }

    fn rebind(&mut self) -> StreamResult<()> {
        self.watcher = self.reactor.poll(self.fd);
        Ok(())
    }
}

impl ReadablePipe<TokioReactor> {
    /// Convenience constructor using the default [`TokioReactor`].
    pub fn new(fd: RawFd, auto_close: bool, config: StreamConfig) -> Self {
        Self::with_reactor(fd, TokioReactor::new(), auto_close, config)
    }
}

impl<Rx: Reactor> Drop for ReadablePipe<Rx> {
    /// Closes the descriptor if `auto_close` and still open (spec §3's
    /// lifecycle: "lives until closed explicitly or ... dropped").
    fn drop(&mut self) {
        self.close();
    }
}
