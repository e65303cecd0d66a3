//! Function-side runtime.
//!
//! The loop a child process runs to answer the bridge: read one
//! `{"event", "context"}` line from stdin, call the handler, write one
//! `{"value"}` or `{"error"}` line to stdout, flush, repeat until EOF.
//!
//! Every non-blank input line produces exactly one output line, including
//! lines that are not valid invocations, so the bridge's next-line
//! correlation stays aligned.

use std::future::Future;

use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, info_span, warn, Instrument};

use crate::shim::envelope::{Invocation, Reply};
use crate::{AppError, Result};

/// What a handler returns: the value, or an error message.
pub type HandlerResult = std::result::Result<Value, String>;

/// Serve invocations from `input`, writing replies to `output`.
///
/// Returns when `input` reaches EOF.
///
/// # Errors
///
/// Returns [`AppError::Io`] if reading `input` or writing `output` fails.
pub async fn serve<R, W, F, Fut>(input: R, output: W, handler: F) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
    F: FnMut(Invocation) -> Fut,
    Fut: Future<Output = HandlerResult>,
{
    serve_lines(input, output, handler)
        .instrument(info_span!("function"))
        .await
}

async fn serve_lines<R, W, F, Fut>(input: R, mut output: W, mut handler: F) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
    F: FnMut(Invocation) -> Fut,
    Fut: Future<Output = HandlerResult>,
{
    let mut reader = BufReader::new(input);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        let n = reader
            .read_until(b'\n', &mut buf)
            .await
            .map_err(|err| AppError::Io(format!("read failed: {err}")))?;
        if n == 0 {
            debug!("function: input closed");
            return Ok(());
        }

        let reply = match std::str::from_utf8(&buf) {
            Ok(line) if line.trim().is_empty() => continue,
            Ok(line) => match serde_json::from_str::<Invocation>(line.trim()) {
                Ok(invocation) => match handler(invocation).await {
                    Ok(value) => Reply::value(value),
                    Err(message) => Reply::error(Value::String(message)),
                },
                Err(err) => invalid(&err),
            },
            Err(err) => invalid(&err),
        };

        write_reply(&mut output, &reply).await?;
    }
}

fn invalid(err: &dyn std::fmt::Display) -> Reply {
    warn!(%err, "function: invalid invocation line");
    Reply::error(Value::String(format!("invalid invocation: {err}")))
}

/// Serve invocations on the process's own stdin and stdout.
///
/// # Errors
///
/// Returns [`AppError::Io`] on stdio failure.
pub async fn serve_stdio<F, Fut>(handler: F) -> Result<()>
where
    F: FnMut(Invocation) -> Fut,
    Fut: Future<Output = HandlerResult>,
{
    serve(tokio::io::stdin(), tokio::io::stdout(), handler).await
}

async fn write_reply<W>(writer: &mut W, reply: &Reply) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut bytes = reply.to_line()?.into_bytes();
    bytes.push(b'\n');
    writer
        .write_all(&bytes)
        .await
        .map_err(|err| AppError::Io(format!("write failed: {err}")))?;
    writer
        .flush()
        .await
        .map_err(|err| AppError::Io(format!("flush failed: {err}")))
}
