//! Unit tests for newline framing of the child's stdout.
//!
//! Covers:
//! - single and batched lines
//! - partial delivery buffered until the newline arrives
//! - chunking invariance across every split point
//! - EOF handling of empty and non-empty trailing fragments
//! - the line length limit

use bytes::BytesMut;
use tokio_util::codec::Decoder;

use ndjson_shim::shim::codec::{LineCodec, MAX_LINE_BYTES};
use ndjson_shim::AppError;

/// Feed `chunks` through one codec the way `FramedRead` would, then flush at
/// EOF, returning every emitted line.
fn decode_chunks(chunks: &[&[u8]]) -> Vec<String> {
    let mut codec = LineCodec::new();
    let mut buf = BytesMut::new();
    let mut lines = Vec::new();

    for chunk in chunks {
        buf.extend_from_slice(chunk);
        while let Some(line) = codec.decode(&mut buf).expect("decode") {
            lines.push(line);
        }
    }

    while let Some(line) = codec.decode_eof(&mut buf).expect("decode_eof") {
        lines.push(line);
    }

    lines
}

// ── Basic framing ────────────────────────────────────────────────────────────

#[test]
fn single_line_is_emitted_without_newline() {
    assert_eq!(decode_chunks(&[b"{\"value\":2}\n"]), vec!["{\"value\":2}"]);
}

/// Two complete lines in one chunk are both emitted, in order.
#[test]
fn batched_lines_are_emitted_in_order() {
    let lines = decode_chunks(&[b"{\"value\":1}\n{\"value\":2}\n"]);
    assert_eq!(lines, vec!["{\"value\":1}", "{\"value\":2}"]);
}

/// A line split across reads is held until its newline arrives.
#[test]
fn partial_line_is_buffered_until_newline() {
    let mut codec = LineCodec::new();
    let mut buf = BytesMut::from("{\"val");

    assert!(codec.decode(&mut buf).expect("decode").is_none());

    buf.extend_from_slice(b"ue\":7}\n");
    assert_eq!(
        codec.decode(&mut buf).expect("decode"),
        Some("{\"value\":7}".to_owned())
    );
}

// ── Chunking invariance ──────────────────────────────────────────────────────

/// Splitting the stream at any single byte boundary yields the same lines.
#[test]
fn every_two_way_split_yields_the_same_lines() {
    let stream: &[u8] = b"{\"value\":1}\n{\"error\":\"bad input\"}\n{\"value\":[1,2]}\n";
    let expected = decode_chunks(&[stream]);
    assert_eq!(expected.len(), 3);

    for cut in 0..=stream.len() {
        let (head, tail) = stream.split_at(cut);
        assert_eq!(decode_chunks(&[head, tail]), expected, "split at byte {cut}");
    }
}

/// Delivering the stream one byte at a time yields the same lines.
#[test]
fn byte_at_a_time_yields_the_same_lines() {
    let stream: &[u8] = b"{\"value\":\"\xc3\xa9t\xc3\xa9\"}\n{\"value\":null}\n";
    let expected = decode_chunks(&[stream]);
    let chunks: Vec<&[u8]> = stream.chunks(1).collect();

    assert_eq!(decode_chunks(&chunks), expected);
}

// ── EOF handling ─────────────────────────────────────────────────────────────

/// A stream ending exactly on a newline emits no extra empty line.
#[test]
fn empty_trailing_fragment_is_not_emitted() {
    let lines = decode_chunks(&[b"{\"value\":1}\n"]);
    assert_eq!(lines.len(), 1);
}

#[test]
fn empty_stream_emits_nothing() {
    assert!(decode_chunks(&[]).is_empty());
}

/// An unterminated final line is flushed at EOF.
#[test]
fn unterminated_trailing_line_is_flushed_at_eof() {
    let lines = decode_chunks(&[b"{\"value\":1}\n{\"value\":", b"2}"]);
    assert_eq!(lines, vec!["{\"value\":1}", "{\"value\":2}"]);
}

// ── Line limit ───────────────────────────────────────────────────────────────

#[test]
fn line_over_limit_is_a_protocol_error() {
    let mut codec = LineCodec::new();
    let big_line = "a".repeat(MAX_LINE_BYTES + 1) + "\n";
    let mut buf = BytesMut::from(big_line.as_str());

    match codec.decode(&mut buf) {
        Err(AppError::Protocol(msg)) => assert!(
            msg.contains("line too long"),
            "error must mention 'line too long', got: {msg}"
        ),
        other => panic!("expected Err(AppError::Protocol), got: {other:?}"),
    }
}

#[test]
fn custom_limit_is_reported() {
    let codec = LineCodec::with_max_length(64);
    assert_eq!(codec.max_line_bytes(), 64);
}
