//! Child stdin writer task.
//!
//! Receives already-serialised invocation lines from an [`mpsc`] channel and
//! writes each one to the child's stdin followed by a single `\n`, flushing
//! after every line so the child sees the request immediately.

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::{AppError, Result};

/// Writer task: drain `line_rx` into `stdin`.
///
/// Exits cleanly on cancellation or when every sender is dropped.
///
/// # Errors
///
/// Returns [`AppError::Io`]`("write failed: …")` if writing or flushing
/// fails, typically because the child has exited and closed its stdin.
pub async fn run_writer<W>(
    stdin: W,
    mut line_rx: mpsc::Receiver<String>,
    cancel: CancellationToken,
) -> Result<()>
where
    W: AsyncWrite + Unpin + Send,
{
    let mut stdin = stdin;

    loop {
        tokio::select! {
            biased;

            () = cancel.cancelled() => {
                debug!("writer: cancellation received, stopping");
                break;
            }

            line = line_rx.recv() => {
                let Some(line) = line else {
                    debug!("writer: line channel closed, stopping");
                    break;
                };

                let mut bytes = line.into_bytes();
                bytes.push(b'\n');

                if let Err(e) = write_line(&mut stdin, &bytes).await {
                    warn!(error = %e, "writer: write to child stdin failed");
                    return Err(AppError::Io(format!("write failed: {e}")));
                }
            }
        }
    }

    // Closing stdin lets a well-behaved child see EOF.
    stdin.shutdown().await.ok();
    Ok(())
}

async fn write_line<W>(stdin: &mut W, bytes: &[u8]) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    stdin.write_all(bytes).await?;
    stdin.flush().await
}
