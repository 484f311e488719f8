//! Integration coverage for the pipe streams and composition helpers,
//! exercised against a real `UnixStream::pair()`.

use nbio_core::traits::{Readable, Writable};
use nbio_core::StreamError;
use nbio_native::{pair, pipe, read_all, read_exact, read_until};
use std::time::Duration;

#[tokio::test]
async fn s6_pipe_helper_preserves_byte_order_and_ends_dest_only() {
    // Two independent pairs: feeder/src supplies the piped bytes, dst/observer
    // receives them, since writing on one end of a pair arrives readable on
    // the other end, not on the writer itself.
    let (mut feeder, mut src) = pair().unwrap();
    let (mut dst, mut observer) = pair().unwrap();
    feeder.write(b"hello!world", None).await.unwrap();
    let n = pipe(&mut src, &mut dst, true, 0, Some(b'!'), None)
        .await
        .unwrap();
    assert_eq!(n, 6);
    assert!(!dst.is_writable());
    assert!(src.is_readable());

    let got = observer.read(0, None, None).await.unwrap();
    assert_eq!(got, b"hello!");
}

#[tokio::test]
async fn s7_eof_on_peer_close_then_unreadable() {
    let (mut src, dst) = pair().unwrap();
    drop(dst);
    let got = src.read(0, None, None).await.unwrap();
    assert!(got.is_empty());
    let err = src.read(0, None, None).await.unwrap_err();
    assert_eq!(err, StreamError::Unreadable);
}

#[tokio::test]
async fn s8_read_timeout_leaves_stream_open() {
    let (mut src, _dst) = pair().unwrap();
    let start = std::time::Instant::now();
    let err = src
        .read(0, None, Some(Duration::from_millis(100)))
        .await
        .unwrap_err();
    assert_eq!(err, StreamError::Timeout);
    assert!(start.elapsed() >= Duration::from_millis(90));
    assert!(src.is_readable());
}

#[tokio::test]
async fn read_exact_spans_multiple_descriptor_reads() {
    let (mut src, mut dst) = pair().unwrap();
    for chunk in [b"ab".as_slice(), b"cd".as_slice(), b"ef".as_slice()] {
        dst.write(chunk, None).await.unwrap();
    }
    let got = read_exact(&mut src, 6, None).await.unwrap();
    assert_eq!(got, b"abcdef");
}

#[tokio::test]
async fn read_until_matches_a_multi_byte_needle() {
    let (mut src, mut dst) = pair().unwrap();
    dst.write(b"line one\r\nline two", None).await.unwrap();
    let got = read_until(&mut src, b"\r\n", 0, None).await.unwrap();
    assert_eq!(got, b"line one\r\n");
}

#[tokio::test]
async fn read_all_collects_everything_up_to_eof() {
    let (mut src, mut dst) = pair().unwrap();
    dst.end(b"the rest of it", None).await.unwrap();
    let got = read_all(&mut src, 0, None).await.unwrap();
    assert_eq!(got, b"the rest of it");
}

#[tokio::test]
async fn unshift_is_observed_before_further_descriptor_bytes() {
    let (mut src, mut dst) = pair().unwrap();
    dst.write(b"world", None).await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    src.unshift(b"hello ");
    let got = src.read(0, None, None).await.unwrap();
    assert_eq!(got, b"hello world");
}
