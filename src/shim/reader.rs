//! Child stdout reader task.
//!
//! Frames the child's stdout into lines with [`LineCodec`], hands each line to
//! a [`LineHandler`], and turns unrecoverable conditions into a fatal
//! lifecycle transition.
//!
//! | Condition                      | Outcome                                     |
//! |--------------------------------|---------------------------------------------|
//! | reply envelope, call pending   | delivered, slot cleared                     |
//! | reply envelope, nothing armed  | logged at `WARN`, dropped                   |
//! | blank line                     | skipped                                     |
//! | malformed line                 | [`Fatal::MalformedLine`], or dropped (skip) |
//! | line over the codec limit      | [`Fatal::MalformedLine`]                    |
//! | I/O error                      | [`Fatal::StreamError`]                      |
//! | EOF                            | reader stops; the exit monitor reports      |

use std::sync::Arc;

use futures_util::StreamExt;
use tokio::io::AsyncRead;
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::MalformedLinePolicy;
use crate::shim::codec::LineCodec;
use crate::shim::envelope::Reply;
use crate::shim::lifecycle::{Fatal, Lifecycle, Termination};
use crate::shim::pending::PendingCall;
use crate::AppError;

/// Tracing target for verbose line tracing.
pub const TRACE_TARGET: &str = "ndjson_shim::trace";

/// What happened to one line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineOutcome {
    /// The reply reached the pending caller.
    Delivered(Uuid),
    /// The pending caller had already gone away.
    CallerGone(Uuid),
    /// A reply arrived with no call pending.
    Stray,
    /// Blank line, or a malformed line dropped under [`MalformedLinePolicy::Skip`].
    Ignored,
}

/// Output Line Handler: parses one line and routes it to the pending call.
#[derive(Debug, Clone)]
pub struct LineHandler {
    pending: Arc<PendingCall>,
    debug: bool,
    on_malformed: MalformedLinePolicy,
}

impl LineHandler {
    /// Create a handler that delivers into `pending`.
    #[must_use]
    pub fn new(pending: Arc<PendingCall>, debug: bool, on_malformed: MalformedLinePolicy) -> Self {
        Self {
            pending,
            debug,
            on_malformed,
        }
    }

    /// Handle one decoded line.
    ///
    /// # Errors
    ///
    /// Returns [`Fatal::MalformedLine`] when the line is not a reply envelope
    /// and the policy is [`MalformedLinePolicy::Fatal`].
    pub async fn handle(&self, line: &str) -> Result<LineOutcome, Fatal> {
        if self.debug {
            info!(target: TRACE_TARGET, line, "[shim] parsing");
        }

        if line.trim().is_empty() {
            return Ok(LineOutcome::Ignored);
        }

        let reply = match Reply::parse_line(line) {
            Ok(reply) => reply,
            Err(err) => return self.malformed(&err.to_string(), line),
        };

        let Some(completion) = self.pending.take().await else {
            warn!(raw_line = line, "reply received with no call pending, dropping");
            return Ok(LineOutcome::Stray);
        };

        let call_id = completion.call_id();
        let is_error = reply.is_error();
        if completion.complete(reply) {
            debug!(%call_id, is_error, "reply delivered");
            Ok(LineOutcome::Delivered(call_id))
        } else {
            debug!(%call_id, "caller dropped before reply arrived");
            Ok(LineOutcome::CallerGone(call_id))
        }
    }

    /// Apply the malformed-line policy to a codec or parse failure.
    fn malformed(&self, reason: &str, line: &str) -> Result<LineOutcome, Fatal> {
        match self.on_malformed {
            MalformedLinePolicy::Fatal => Err(Fatal::MalformedLine(reason.to_owned())),
            MalformedLinePolicy::Skip => {
                warn!(error = reason, raw_line = line, "malformed line, skipping");
                Ok(LineOutcome::Ignored)
            }
        }
    }
}

/// Reader task: drive `stdout` until EOF, cancellation, or a fatal fault.
///
/// A fatal fault moves `lifecycle` to `Terminated` before the task returns.
pub async fn run_reader<R>(
    stdout: R,
    codec: LineCodec,
    handler: LineHandler,
    lifecycle: Arc<Lifecycle>,
    cancel: CancellationToken,
) where
    R: AsyncRead + Unpin + Send,
{
    let mut framed = FramedRead::new(stdout, codec);

    loop {
        let item = tokio::select! {
            biased;

            () = cancel.cancelled() => {
                debug!("reader: cancellation received, stopping");
                break;
            }

            item = framed.next() => item,
        };

        let fatal = match item {
            None => {
                debug!("reader: child stdout closed");
                break;
            }
            // The framed stream does not resume after a codec error.
            Some(Err(AppError::Protocol(msg))) => Some(Fatal::MalformedLine(msg)),
            Some(Err(err)) => Some(Fatal::StreamError(err.to_string())),
            Some(Ok(line)) => handler.handle(&line).await.err(),
        };

        if let Some(fatal) = fatal {
            tracing::error!(error = %fatal, "reader: fatal fault");
            lifecycle.terminate(Termination::Fatal(fatal));
            break;
        }
    }
}
