//! Non-blocking byte streams: contracts, two concrete stream families, a
//! `tokio` reactor adapter, composition helpers, and a UTF-8 text layer.
//!
//! This crate is a thin re-export surface over [`nbio_core`], [`nbio_native`]
//! and [`nbio_text`] for consumers who want one dependency rather than three.

pub use nbio_core::{
    ByteBuffer, Cursor, DescriptorBacked, Duplex, Interest, Readable, Readiness, Reactor,
    Seekable, StreamConfig, StreamError, StreamResult, Watcher, Whence, Writable,
};

pub use nbio_native::{
    pair, pipe, read_all, read_exact, read_until, stderr, stdin, stdout, DuplexPipe, MemorySink,
    MemoryStream, ReadablePipe, TokioReactor, TokioWatcher, WritablePipe,
};

pub use nbio_text::{TextReader, TextWriter};

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn facade_reexports_are_usable_together() {
        let mut mem = MemoryStream::new();
        mem.write(b"abc", None).await.unwrap();
        let mut reader = TextReader::new(mem);
        let s = reader.read_str(0, None).await.unwrap();
        assert_eq!(s, "abc");
    }
}
