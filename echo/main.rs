#![forbid(unsafe_code)]

//! `ndjson-shim-echo`: reference function for `ndjson-shim`.
//!
//! Answers each invocation on stdin with one reply on stdout:
//!
//! | Event                | Reply                                   |
//! |----------------------|-----------------------------------------|
//! | `{"n": <int>}`       | value `n + 1`                           |
//! | `{"fail": "<msg>"}`  | error `<msg>`                           |
//! | `{"exit": <code>}`   | no reply; the process exits with `code` |
//! | anything else        | the event, echoed back as the value     |

use serde_json::{json, Value};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use ndjson_shim::function::{serve_stdio, HandlerResult};
use ndjson_shim::shim::envelope::Invocation;
use ndjson_shim::{AppError, Result};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?;

    serve_stdio(|invocation| async move { respond(invocation) }).await
}

fn respond(invocation: Invocation) -> HandlerResult {
    let event = invocation.event;

    if let Some(code) = event.get("exit").and_then(Value::as_i64) {
        info!(code, "exiting on request");
        std::process::exit(i32::try_from(code).unwrap_or(1));
    }

    if let Some(message) = event.get("fail") {
        return Err(message
            .as_str()
            .map_or_else(|| message.to_string(), str::to_owned));
    }

    if let Some(n) = event.get("n").and_then(Value::as_i64) {
        return n
            .checked_add(1)
            .map(|next| json!(next))
            .ok_or_else(|| "n overflows i64".to_owned());
    }

    Ok(event)
}
