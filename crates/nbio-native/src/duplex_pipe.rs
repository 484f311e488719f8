//! Readable and writable pipe over one descriptor (spec §4.8).

use crate::readable_pipe::ReadablePipe;
use crate::reactor_tokio::TokioReactor;
use crate::writable_pipe::WritablePipe;
use nbio_core::error::StreamResult;
use nbio_core::reactor::Reactor;
use nbio_core::traits::{DescriptorBacked, Readable, Writable};
use nbio_core::StreamConfig;
use std::os::fd::RawFd;
use std::time::Duration;

/// A bidirectional pipe stream: a [`ReadablePipe`] and a [`WritablePipe`]
/// sharing one descriptor.
///
/// Only the duplex itself owns the descriptor (`auto_close`); the two
/// halves are constructed with `auto_close = false` so the fd is never
/// closed twice.
pub struct DuplexPipe<Rx: Reactor = TokioReactor> {
    fd: RawFd,
    auto_close: bool,
    fd_closed: bool,
    read_half: ReadablePipe<Rx>,
    write_half: WritablePipe<Rx>,
}

impl<Rx: Reactor + Clone> DuplexPipe<Rx> {
    pub fn with_reactor(fd: RawFd, reactor: Rx, auto_close: bool, config: StreamConfig) -> Self {
        let read_half = ReadablePipe::with_reactor(fd, reactor.clone(), false, config);
        let write_half = WritablePipe::with_reactor(fd, reactor, false, config);
        Self {
            fd,
            auto_close,
            fd_closed: false,
            read_half,
            write_half,
        }
    }

    pub fn is_open(&self) -> bool {
        self.read_half.is_readable() || self.write_half.is_writable()
    }

    /// Close both halves and, if owned, the descriptor itself. Idempotent.
    pub fn close(&mut self) {
        self.read_half.close();
        self.write_half.close();
        if self.auto_close && !self.fd_closed {
            crate::fd::close_fd(self.fd);
            self.fd_closed = true;
        }
    }

    pub fn unshift(&mut self, data: &[u8]) {
        self.read_half.unshift(data);
    }
}

impl<Rx: Reactor + Clone> Readable for DuplexPipe<Rx> {
    async fn read(
        &mut self,
        length: usize,
        stop_byte: Option<u8>,
        timeout: Option<Duration>,
    ) -> StreamResult<Vec<u8>> {
        self.read_half.read(length, stop_byte, timeout).await
    }

    fn is_readable(&self) -> bool {
        self.read_half.is_readable()
    }
}

impl<Rx: Reactor + Clone> Writable for DuplexPipe<Rx> {
    async fn write(&mut self, data: &[u8], timeout: Option<Duration>) -> StreamResult<usize> {
        self.write_half.write(data, timeout).await
    }

    /// Writes `data` through the writable half, then closes the readable
    /// half regardless of the write's outcome.
    async fn end(&mut self, data: &[u8], timeout: Option<Duration>) -> StreamResult<usize> {
        let result = self.write_half.end(data, timeout).await;
        self.read_half.close();
        result
    }

    fn is_writable(&self) -> bool {
        self.write_half.is_writable()
    }
}

impl<Rx: Reactor + Clone> DescriptorBacked for DuplexPipe<Rx> {
    type Resource = RawFd;

    fn resource(&self) -> &RawFd {
        &self.fd
    }

    fn rebind(&mut self) -> StreamResult<()> {
        self.read_half.rebind()?;
        self.write_half.rebind()
    }
}

impl DuplexPipe<TokioReactor> {
    pub fn new(fd: RawFd, auto_close: bool, config: StreamConfig) -> Self {
        Self::with_reactor(fd, TokioReactor::new(), auto_close, config)
    }
}

impl<Rx: Reactor + Clone> Drop for DuplexPipe<Rx> {
    fn drop(&mut self) {
        if self.auto_close && !self.fd_closed {
            crate::fd::close_fd(self.fd);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fd::set_nonblocking;
    use std::io::{Read, Write};
    use std::os::fd::{AsRawFd, IntoRawFd};
    use std::os::unix::net::UnixStream;

    fn pair() -> (RawFd, UnixStream) {
        let (a, b) = UnixStream::pair().unwrap();
        set_nonblocking(a.as_raw_fd()).unwrap();
        let fd = a.into_raw_fd();
        (fd, b)
    }

    #[tokio::test]
    async fn end_writes_then_closes_read_half() {
        let (fd, mut peer) = pair();
        let mut dp = DuplexPipe::new(fd, true, StreamConfig::default());
        peer.write_all(b"incoming").unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        dp.end(b"outgoing", None).await.unwrap();
        assert!(!dp.is_writable());
        assert!(!dp.is_readable());
        let mut buf = Vec::new();
        peer.read_to_end(&mut buf).unwrap();
        assert_eq!(buf, b"outgoing");
    }

    #[tokio::test]
    async fn is_open_is_disjunction() {
        let (fd, _peer) = pair();
        let mut dp = DuplexPipe::new(fd, true, StreamConfig::default());
        assert!(dp.is_open());
        dp.close();
        assert!(!dp.is_open());
    }
}
