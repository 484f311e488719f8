//! `tokio`-backed implementation of the [`Reactor`]/[`Watcher`] contract.
//!
//! This is a thin adapter over `tokio::io::unix::AsyncFd`, not a second
//! event loop: all actual polling happens in `tokio`'s own I/O driver.

use nbio_core::reactor::{Interest, Reactor, Readiness, Watcher};
use std::future::Future;
use std::os::fd::{AsRawFd, RawFd};
use std::pin::Pin;
use std::time::Duration;
use tokio::io::unix::AsyncFd;

/// A non-owning wrapper so `AsyncFd` can register a raw descriptor without
/// taking responsibility for closing it — closing remains the pipe stream's
/// job (see `auto_close` on the readable/writable pipes).
struct BorrowedFd(RawFd);

impl AsRawFd for BorrowedFd {
    fn as_raw_fd(&self) -> RawFd {
        self.0
    }
}

/// The `tokio`-backed [`Watcher`].
pub struct TokioWatcher {
    fd: RawFd,
    interest: Interest,
    async_fd: Option<AsyncFd<BorrowedFd>>,
    pending: bool,
}

impl TokioWatcher {
    pub(crate) fn new(fd: RawFd, interest: Interest) -> Self {
        Self {
            fd,
            interest,
            async_fd: None,
            pending: false,
        }
    }

    fn ensure_registered(&mut self) -> Option<&AsyncFd<BorrowedFd>> {
        if self.async_fd.is_none() {
            let tokio_interest = match self.interest {
                Interest::Readable => tokio::io::Interest::READABLE,
                Interest::Writable => tokio::io::Interest::WRITABLE,
            };
            match AsyncFd::with_interest(BorrowedFd(self.fd), tokio_interest) {
                Ok(af) => self.async_fd = Some(af),
                Err(e) => {
                    tracing::warn!(fd = self.fd, error = %e, "failed to register descriptor with tokio reactor");
                    return None;
                }
            }
        }
        self.async_fd.as_ref()
    }
}

impl Watcher for TokioWatcher {
    fn listen(&mut self, timeout: Option<Duration>) -> impl Future<Output = Readiness> + '_ {
        async move {
            self.pending = true;
            let interest = self.interest;
            let Some(async_fd) = self.ensure_registered() else {
                // Registration failed; tell the caller it's "ready" so the
                // next non-blocking syscall surfaces the real OS error.
                self.pending = false;
                return Readiness::Ready;
            };
            let guard_fut: Pin<Box<dyn Future<Output = std::io::Result<tokio::io::unix::AsyncFdReadyGuard<'_, BorrowedFd>>>>> =
                match interest {
                    Interest::Readable => Box::pin(async_fd.readable()),
                    Interest::Writable => Box::pin(async_fd.writable()),
                };
            let outcome = match timeout {
                None => match guard_fut.await {
                    Ok(mut guard) => {
                        guard.clear_ready();
                        Readiness::Ready
                    }
                    Err(_) => Readiness::Ready,
                },
                Some(d) => {
                    tokio::select! {
                        res = guard_fut => {
                            if let Ok(mut guard) = res {
                                guard.clear_ready();
                            }
                            Readiness::Ready
                        }
                        _ = tokio::time::sleep(d) => Readiness::Expired,
                    }
                }
            };
            self.pending = false;
            outcome
        }
    }

    fn is_pending(&self) -> bool {
        self.pending
    }

    fn cancel(&mut self) {
        self.pending = false;
    }

    fn free(self) {
        // Dropping `async_fd` deregisters with tokio's I/O driver; the
        // descriptor itself is never closed here.
    }
}

/// The `tokio`-backed [`Reactor`].
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioReactor;

impl TokioReactor {
    pub fn new() -> Self {
        Self
    }
}

impl Reactor for TokioReactor {
    type Watcher = TokioWatcher;

    fn poll(&self, fd: RawFd) -> Self::Watcher {
        TokioWatcher::new(fd, Interest::Readable)
    }

    fn await_ready(&self, fd: RawFd) -> Self::Watcher {
        TokioWatcher::new(fd, Interest::Writable)
    }
}
