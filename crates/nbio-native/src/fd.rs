//! Non-owning raw-descriptor I/O.
//!
//! Pipe streams own their descriptor explicitly (via `auto_close`) rather
//! than through the wrapper's `Drop`, so every read/write here goes through
//! a temporary owned view that is forgotten afterwards — the same "a bit
//! unsafe but necessary" idiom the teacher workspace uses for socket
//! shutdown (construct a temporary owned type from a raw fd, use it, then
//! `mem::forget` it so the descriptor isn't closed underneath the owner).

use std::io::{self, Read, Write};
use std::os::fd::{AsRawFd, FromRawFd, RawFd};

/// A non-blocking descriptor, read and written through without owning it.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RawFdIo(pub RawFd);

impl AsRawFd for RawFdIo {
    fn as_raw_fd(&self) -> RawFd {
        self.0
    }
}

impl Read for RawFdIo {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        // SAFETY: we don't take ownership — the temporary is forgotten
        // before returning, so the descriptor is never closed here.
        let mut tmp = unsafe { std::net::TcpStream::from_raw_fd(self.0) };
        let result = io::Read::read(&mut tmp, buf);
        std::mem::forget(tmp);
        result
    }
}

impl Write for RawFdIo {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut tmp = unsafe { std::net::TcpStream::from_raw_fd(self.0) };
        let result = io::Write::write(&mut tmp, buf);
        std::mem::forget(tmp);
        result
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Close a descriptor this crate owns (honoring `auto_close`).
pub(crate) fn close_fd(fd: RawFd) {
    // SAFETY: caller guarantees this descriptor is solely owned by the
    // stream that is closing it.
    unsafe {
        std::net::TcpStream::from_raw_fd(fd);
    }
    // Dropped above, which closes it.
}

/// Put `fd` into non-blocking mode.
pub(crate) fn set_nonblocking(fd: RawFd) -> io::Result<()> {
    let tmp = unsafe { std::net::TcpStream::from_raw_fd(fd) };
    let result = tmp.set_nonblocking(true);
    std::mem::forget(tmp);
    result
}
