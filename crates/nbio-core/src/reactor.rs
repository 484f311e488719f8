//! The readiness-watcher contract pipe streams consume.
//!
//! This module defines the trait only; the crate ships exactly one concrete
//! implementation (`nbio_native::reactor::TokioReactor`), which is a thin
//! adapter over `tokio`'s own I/O driver rather than a second event loop.

use std::future::Future;
use std::os::fd::RawFd;
use std::time::Duration;

/// Which direction of readiness a [`Watcher`] observes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interest {
    /// Fires when the descriptor has bytes to read (or is at EOF).
    Readable,
    /// Fires when the descriptor can accept more bytes.
    Writable,
}

/// The outcome delivered to a watcher once armed with [`Watcher::listen`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// The descriptor became ready for the watched interest.
    Ready,
    /// The armed timeout elapsed before readiness was observed.
    Expired,
}

/// A one-shot readiness watcher for a single descriptor and direction.
///
/// A `Watcher` is armed by [`Watcher::listen`]; arming is not cumulative,
/// a fresh call supersedes whatever arming preceded it. Implementations
/// must tolerate being dropped while armed (this is how cancellation of a
/// parked read/write is expressed in async Rust).
pub trait Watcher {
    /// Arm the watcher. If `timeout` is `Some`, the returned future resolves
    /// with [`Readiness::Expired`] if it elapses before readiness; if
    /// `timeout` is `None` the future waits indefinitely for readiness.
    fn listen(&mut self, timeout: Option<Duration>) -> impl Future<Output = Readiness> + '_;

    /// Whether the watcher is currently armed and awaiting an outcome.
    fn is_pending(&self) -> bool;

    /// Disarm the watcher without producing an outcome.
    fn cancel(&mut self);

    /// Permanently release the watcher's reactor registration.
    fn free(self);
}

/// The reactor contract pipe streams are generic over.
pub trait Reactor {
    /// The watcher type this reactor produces.
    type Watcher: Watcher;

    /// Register interest in read-readiness of `fd`.
    fn poll(&self, fd: RawFd) -> Self::Watcher;

    /// Register interest in write-readiness of `fd`.
    fn await_ready(&self, fd: RawFd) -> Self::Watcher;
}
