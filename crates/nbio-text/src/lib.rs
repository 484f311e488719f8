//! UTF-8 text reader/writer atop the byte-stream contracts (spec §4.10).
//!
//! Built strictly on [`Readable`]/[`Writable`]; never touches a descriptor
//! or reactor directly, so it works equally over a memory stream, a
//! pipe stream, or any other implementation.

use nbio_core::error::StreamResult;
use nbio_core::traits::{Readable, Writable};
use std::time::Duration;

/// Splits `buf` at the last complete-codepoint boundary.
///
/// Returns `(decoded, carry)`: `decoded` is the longest valid UTF-8 prefix
/// as a `String`, `carry` is the trailing bytes held back (an incomplete
/// multibyte sequence, or bytes following an invalid one). At `eof`, the
/// carry is folded into `decoded` as a single U+FFFD instead of held back.
fn decode_prefix(buf: Vec<u8>, eof: bool) -> (String, Vec<u8>) {
    match String::from_utf8(buf) {
        Ok(s) => (s, Vec::new()),
        Err(e) => {
            let valid_up_to = e.utf8_error().valid_up_to();
            let mut buf = e.into_bytes();
            let rest = buf.split_off(valid_up_to);
            // `buf` is now exactly the valid prefix.
            let mut s = String::from_utf8(buf).expect("utf8 prefix is valid by construction");
            if eof {
                if !rest.is_empty() {
                    s.push('\u{FFFD}');
                }
                (s, Vec::new())
            } else {
                (s, rest)
            }
        }
    }
}

/// Decodes a reader's bytes incrementally as UTF-8.
pub struct TextReader<R: Readable> {
    inner: R,
    carry: Vec<u8>,
}

impl<R: Readable> TextReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            carry: Vec::new(),
        }
    }

    /// The wrapped reader.
    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    /// Unwrap back to the underlying reader, discarding any carried bytes.
    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Read up to `len` bytes' worth of decoded text (`len == 0` means "any
    /// amount"), never splitting a multibyte codepoint except at EOF, where
    /// a truncated trailing sequence becomes a single U+FFFD.
    pub async fn read_str(&mut self, len: usize, timeout: Option<Duration>) -> StreamResult<String> {
        let chunk = self.inner.read(len, None, timeout).await?;
        let eof = chunk.is_empty() && !self.inner.is_readable();
        let mut buf = std::mem::take(&mut self.carry);
        buf.extend_from_slice(&chunk);
        let (s, carry) = decode_prefix(buf, eof);
        self.carry = carry;
        tracing::trace!(chars = s.chars().count(), eof, "text_reader: read_str");
        Ok(s)
    }

    /// Read a line terminated by `\n` (a preceding `\r` is stripped; both
    /// CRLF and LF are accepted). On EOF with no terminator, returns
    /// whatever was collected, decoded lossily.
    pub async fn read_line(&mut self, timeout: Option<Duration>) -> StreamResult<String> {
        let mut raw = std::mem::take(&mut self.carry);
        loop {
            if let Some(p) = raw.iter().position(|&b| b == b'\n') {
                let rest = raw.split_off(p + 1);
                self.carry = rest;
                let mut line = String::from_utf8_lossy(&raw).into_owned();
                line.pop(); // the '\n'
                if line.ends_with('\r') {
                    line.pop();
                }
                return Ok(line);
            }
            let chunk = self.inner.read(0, Some(b'\n'), timeout).await?;
            if chunk.is_empty() {
                self.carry.clear();
                return Ok(String::from_utf8_lossy(&raw).into_owned());
            }
            raw.extend_from_slice(&chunk);
        }
    }

    pub fn is_readable(&self) -> bool {
        self.inner.is_readable()
    }
}

/// Writes text directly as UTF-8 bytes (the wire format already is UTF-8,
/// so there is no transcoding step).
pub struct TextWriter<W: Writable> {
    inner: W,
}

impl<W: Writable> TextWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    pub fn into_inner(self) -> W {
        self.inner
    }

    pub async fn write_str(&mut self, s: &str, timeout: Option<Duration>) -> StreamResult<usize> {
        self.inner.write(s.as_bytes(), timeout).await
    }

    /// Write `s` followed by `\n`.
    pub async fn write_line(&mut self, s: &str, timeout: Option<Duration>) -> StreamResult<usize> {
        let mut buf = Vec::with_capacity(s.len() + 1);
        buf.extend_from_slice(s.as_bytes());
        buf.push(b'\n');
        self.inner.write(&buf, timeout).await
    }

    pub fn is_writable(&self) -> bool {
        self.inner.is_writable()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nbio_native::memory_stream::MemoryStream;

    #[tokio::test]
    async fn read_str_holds_back_incomplete_codepoint() {
        let mut s = MemoryStream::new();
        // "é" is 0xC3 0xA9; requesting one byte at a time forces read_str
        // to see the lead and trail bytes in separate calls.
        s.end(&[0xC3, 0xA9], None).await.unwrap();
        let mut reader = TextReader::new(s);
        let first = reader.read_str(1, None).await.unwrap();
        assert_eq!(first, "");
        let second = reader.read_str(1, None).await.unwrap();
        assert_eq!(second, "\u{e9}");
    }

    #[tokio::test]
    async fn read_line_strips_crlf() {
        let mut s = MemoryStream::new();
        s.write(b"hello\r\nworld", None).await.unwrap();
        let mut reader = TextReader::new(s);
        assert_eq!(reader.read_line(None).await.unwrap(), "hello");
    }

    #[tokio::test]
    async fn read_line_strips_bare_lf() {
        let mut s = MemoryStream::new();
        s.write(b"hello\nworld\n", None).await.unwrap();
        let mut reader = TextReader::new(s);
        assert_eq!(reader.read_line(None).await.unwrap(), "hello");
        assert_eq!(reader.read_line(None).await.unwrap(), "world");
    }

    #[tokio::test]
    async fn write_line_appends_newline() {
        let mut s = MemoryStream::new();
        {
            let mut writer = TextWriter::new(s.clone());
            writer.write_line("hi", None).await.unwrap();
        }
        let got = s.read(0, None, None).await.unwrap();
        assert_eq!(got, b"hi\n");
    }
}
