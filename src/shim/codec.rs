//! Newline framing for the child's stdio streams.
//!
//! Wraps [`tokio_util::codec::LinesCodec`] so that the rest of the shim only
//! sees [`AppError`]s. Used with [`tokio_util::codec::FramedRead`] over the
//! child's stdout.
//!
//! Framing rules the reader relies on:
//!
//! - bytes are buffered until a `\n` arrives, so a line split across many
//!   reads is emitted once, whole;
//! - several complete lines in one read are emitted one by one, in order;
//! - at EOF a non-empty unterminated tail is emitted as a final line, an empty
//!   tail is not.

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder, LinesCodec, LinesCodecError};

use crate::{AppError, Result};

/// Default maximum line length accepted on the inbound stream: 1 MiB.
pub const MAX_LINE_BYTES: usize = 1_048_576;

/// NDJSON line codec for the child's stdout and stdin.
#[derive(Debug)]
pub struct LineCodec {
    inner: LinesCodec,
    max_line_bytes: usize,
}

impl LineCodec {
    /// Create a codec with the default [`MAX_LINE_BYTES`] limit.
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_length(MAX_LINE_BYTES)
    }

    /// Create a codec that rejects inbound lines longer than `max_line_bytes`.
    #[must_use]
    pub fn with_max_length(max_line_bytes: usize) -> Self {
        Self {
            inner: LinesCodec::new_with_max_length(max_line_bytes),
            max_line_bytes,
        }
    }

    /// Line limit this codec enforces when decoding.
    #[must_use]
    pub fn max_line_bytes(&self) -> usize {
        self.max_line_bytes
    }

    fn map_error(&self, err: LinesCodecError) -> AppError {
        match err {
            LinesCodecError::MaxLineLengthExceeded => AppError::Protocol(format!(
                "line too long: exceeded {} bytes",
                self.max_line_bytes
            )),
            LinesCodecError::Io(io_err) => AppError::Io(io_err.to_string()),
        }
    }
}

impl Default for LineCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for LineCodec {
    type Item = String;
    type Error = AppError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        self.inner.decode(src).map_err(|e| self.map_error(e))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        self.inner.decode_eof(src).map_err(|e| self.map_error(e))
    }
}

impl Encoder<String> for LineCodec {
    type Error = AppError;

    fn encode(&mut self, item: String, dst: &mut BytesMut) -> Result<()> {
        // The limit is decoder-side only.
        self.inner.encode(item, dst).map_err(|e| self.map_error(e))
    }
}
