//! The capability traits every concrete stream implements a subset of.

use crate::error::StreamResult;
use std::future::Future;
use std::time::Duration;

/// A stream that bytes can be read from.
///
/// `length == 0` means "any positive amount the implementation has on hand".
/// When `stop_byte` is set, a successful read returns as soon as that byte
/// has been observed in the output, with the byte included.
pub trait Readable {
    /// Read up to `length` bytes (or any amount if `length == 0`), stopping
    /// early at the first occurrence of `stop_byte` if one is given.
    fn read(
        &mut self,
        length: usize,
        stop_byte: Option<u8>,
        timeout: Option<Duration>,
    ) -> impl Future<Output = StreamResult<Vec<u8>>>;

    /// Whether the stream currently accepts reads.
    fn is_readable(&self) -> bool;
}

/// A stream that bytes can be written to.
pub trait Writable {
    /// Write `data`, returning the number of bytes accepted once the
    /// destination has taken them all.
    fn write(&mut self, data: &[u8], timeout: Option<Duration>)
    -> impl Future<Output = StreamResult<usize>>;

    /// Write `data`, then mark the stream unwritable.
    fn end(&mut self, data: &[u8], timeout: Option<Duration>)
    -> impl Future<Output = StreamResult<usize>>;

    /// Whether the stream currently accepts writes.
    fn is_writable(&self) -> bool;
}

/// A stream that is both [`Readable`] and [`Writable`].
///
/// Blanket-implemented; there is nothing to add beyond the two capabilities.
pub trait Duplex: Readable + Writable {}

impl<T: Readable + Writable> Duplex for T {}

/// The origin a [`Seekable::seek`] offset is relative to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Whence {
    /// Offset from the start of the stream.
    Start,
    /// Offset from the current position.
    Current,
    /// Offset from the end of the stream.
    End,
}

/// A stream with an addressable cursor.
pub trait Seekable {
    /// Move the cursor and return the new absolute offset.
    ///
    /// Fails [`crate::error::StreamError::OutOfBounds`] if the computed
    /// target falls outside `[0, length()]`.
    fn seek(
        &mut self,
        offset: i64,
        whence: Whence,
        timeout: Option<Duration>,
    ) -> impl Future<Output = StreamResult<u64>>;

    /// The current absolute offset.
    fn tell(&mut self) -> impl Future<Output = StreamResult<u64>>;

    /// The total number of bytes in the stream.
    fn length(&mut self) -> impl Future<Output = StreamResult<u64>>;
}

/// A stream backed by an OS descriptor.
pub trait DescriptorBacked {
    /// The descriptor type (typically a raw fd or an owned-fd wrapper).
    type Resource;

    /// The descriptor this stream is attached to.
    fn resource(&self) -> &Self::Resource;

    /// Reattach reactor watchers, e.g. after the process has switched
    /// reactors (commonly after `fork`).
    fn rebind(&mut self) -> StreamResult<()>;
}
