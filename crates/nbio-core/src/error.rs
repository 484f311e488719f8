//! Error taxonomy shared by every stream in the crate.

use std::fmt;

/// The single error type returned by fallible stream operations.
///
/// Every suspendable operation (`read`, `write`, `end`, `seek`, ...) returns
/// `Result<T, StreamError>`. There is deliberately one enum rather than one
/// per capability: callers composing readable and writable streams (e.g.
/// `pipe`) need a common error type to propagate through both halves.
#[derive(Debug)]
pub enum StreamError {
    /// A negative length, an empty `read_until` needle, or some other
    /// argument that is invalid independent of stream state.
    InvalidArgument(String),
    /// The stream is not, or is no longer, readable.
    Unreadable,
    /// The stream is not, or is no longer, writable.
    Unwritable,
    /// The stream does not support seeking, or no longer does.
    Unseekable,
    /// A `seek` target fell outside the addressable range.
    OutOfBounds,
    /// The stream was closed while an operation was parked on it.
    Closed(Option<Box<StreamError>>),
    /// A timeout elapsed before the operation completed.
    Timeout,
    /// The underlying non-blocking syscall failed.
    Failure(std::io::Error),
}

impl StreamError {
    /// Build an [`StreamError::InvalidArgument`] from a message.
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Build a [`StreamError::Closed`] with no more specific cause.
    pub fn closed() -> Self {
        Self::Closed(None)
    }

    /// Build a [`StreamError::Closed`] that preserves the cause that forced
    /// the close (e.g. a `Failure` that freed the stream).
    pub fn closed_with_cause(cause: StreamError) -> Self {
        Self::Closed(Some(Box::new(cause)))
    }

    /// True for errors that represent a capability the stream never had or
    /// no longer has, as opposed to a one-off failure of a specific call.
    pub fn is_capability_error(&self) -> bool {
        matches!(
            self,
            Self::Unreadable | Self::Unwritable | Self::Unseekable
        )
    }
}

impl PartialEq for StreamError {
    /// Compares error *kind* only (discriminant); payloads such as the
    /// underlying `io::Error` or a `Closed` cause are not compared. Tests
    /// assert on the kind, never on the wrapped payload.
    fn eq(&self, other: &Self) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}

impl Clone for StreamError {
    fn clone(&self) -> Self {
        match self {
            Self::InvalidArgument(m) => Self::InvalidArgument(m.clone()),
            Self::Unreadable => Self::Unreadable,
            Self::Unwritable => Self::Unwritable,
            Self::Unseekable => Self::Unseekable,
            Self::OutOfBounds => Self::OutOfBounds,
            Self::Closed(cause) => Self::Closed(cause.clone()),
            Self::Timeout => Self::Timeout,
            Self::Failure(e) => Self::Failure(std::io::Error::new(e.kind(), e.to_string())),
        }
    }
}

impl fmt::Display for StreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidArgument(msg) => write!(f, "invalid argument: {msg}"),
            Self::Unreadable => write!(f, "stream is not readable"),
            Self::Unwritable => write!(f, "stream is not writable"),
            Self::Unseekable => write!(f, "stream is not seekable"),
            Self::OutOfBounds => write!(f, "seek target out of bounds"),
            Self::Closed(Some(cause)) => write!(f, "stream closed: {cause}"),
            Self::Closed(None) => write!(f, "stream closed"),
            Self::Timeout => write!(f, "operation timed out"),
            Self::Failure(e) => write!(f, "I/O failure: {e}"),
        }
    }
}

impl std::error::Error for StreamError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Closed(Some(cause)) => Some(cause.as_ref()),
            Self::Failure(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for StreamError {
    fn from(e: std::io::Error) -> Self {
        Self::Failure(e)
    }
}

/// Convenience alias used throughout the crate.
pub type StreamResult<T> = Result<T, StreamError>;
