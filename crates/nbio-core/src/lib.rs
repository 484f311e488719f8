//! Stream contracts, byte buffer, and reactor interface.
//!
//! This crate has no I/O of its own: it defines the shapes that
//! `nbio-native`'s concrete streams implement. See the crate-level docs of
//! `nbio-native` for the memory stream, memory sink, and pipe streams built
//! on top of these contracts.

pub mod buffer;
pub mod config;
pub mod error;
pub mod reactor;
pub mod traits;

pub use buffer::{ByteBuffer, Cursor};
pub use config::StreamConfig;
pub use error::{StreamError, StreamResult};
pub use reactor::{Interest, Reactor, Readiness, Watcher};
pub use traits::{DescriptorBacked, Duplex, Readable, Seekable, Whence, Writable};
