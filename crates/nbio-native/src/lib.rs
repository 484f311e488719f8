//! Concrete, `tokio`-backed stream implementations.
//!
//! Two families: in-process buffers ([`memory_stream`], [`memory_sink`])
//! and non-blocking descriptor pipes ([`readable_pipe`], [`writable_pipe`],
//! [`duplex_pipe`]), plus the reactor adapter ([`reactor_tokio`]) and the
//! composition helpers ([`ops`]).

mod fd;

pub mod duplex_pipe;
pub mod memory_sink;
pub mod memory_stream;
pub mod ops;
pub mod reactor_tokio;
pub mod readable_pipe;
pub mod util;
pub mod writable_pipe;

pub use duplex_pipe::DuplexPipe;
pub use memory_sink::MemorySink;
pub use memory_stream::MemoryStream;
pub use ops::{pair, pipe, read_all, read_exact, read_until, stderr, stdin, stdout};
pub use reactor_tokio::{TokioReactor, TokioWatcher};
pub use readable_pipe::ReadablePipe;
pub use writable_pipe::WritablePipe;
