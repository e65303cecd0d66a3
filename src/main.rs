#![forbid(unsafe_code)]

//! `ndjson-shim` host relay binary.
//!
//! Spawns the configured function process once, then relays invocation
//! envelopes read from stdin to it one at a time, writing each reply
//! envelope to stdout. Any child exit or protocol fault ends the process
//! with status 1; EOF on stdin or SIGINT/SIGTERM stops it with status 0.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use ndjson_shim::config::{Overrides, ShimConfig};
use ndjson_shim::shim::envelope::{Invocation, Reply};
use ndjson_shim::shim::lifecycle::FATAL_EXIT_CODE;
use ndjson_shim::shim::reader::TRACE_TARGET;
use ndjson_shim::{AppError, Bridge, Result, Termination};

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "ndjson-shim", about = "Relay NDJSON invocations to a function process", version, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Function executable to spawn (overrides `command`).
    #[arg(long)]
    command: Option<String>,

    /// Argument for the function executable; repeatable (overrides `args`).
    #[arg(long = "arg")]
    args: Vec<String>,

    /// Trace every line the function writes (same as `DEBUG_SHIM=1`).
    #[arg(long)]
    debug: bool,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Extra function arguments after `--`.
    #[arg(last = true)]
    child_args: Vec<String>,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    let log_format = args.log_format;

    let config = load_config(args);
    init_tracing(log_format, config.as_ref().is_ok_and(|config| config.debug))?;
    let config = config?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?;
    let code = runtime.block_on(run(config));

    // The host stdin read runs on a blocking thread that never returns while
    // stdin stays open; dropping the runtime normally would wait for it.
    runtime.shutdown_background();
    std::process::exit(code);
}

async fn run(config: ShimConfig) -> i32 {
    info!(command = %config.command, debug = config.debug, "ndjson-shim starting");

    let Ok(bridge) = Bridge::start(&config) else {
        // Already logged by the bridge.
        return FATAL_EXIT_CODE;
    };

    relay(&bridge).await;

    let termination = bridge.shutdown().await;
    match &termination {
        Termination::Fatal(fatal) => error!(error = %fatal, "ndjson-shim terminating"),
        Termination::Shutdown => info!("ndjson-shim shut down"),
    }

    termination.exit_code()
}

fn load_config(args: Cli) -> Result<ShimConfig> {
    let mut config = match &args.config {
        Some(path) => ShimConfig::load_from_path(path)?,
        None => ShimConfig::default(),
    };

    let mut child_args = args.args;
    child_args.extend(args.child_args);

    config.apply_overrides(Overrides {
        command: args.command,
        args: child_args,
        debug: args.debug,
    })?;
    config.apply_env();

    Ok(config)
}

/// Relay host invocations until stdin closes, a signal arrives, or the
/// bridge terminates.
async fn relay(bridge: &Bridge) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    let signal = shutdown_signal();
    tokio::pin!(signal);

    loop {
        let line = tokio::select! {
            biased;

            _ = bridge.terminated() => return,
            () = &mut signal => {
                info!("shutdown signal received");
                return;
            }
            line = lines.next_line() => line,
        };

        let line = match line {
            Ok(Some(line)) => line,
            Ok(None) => {
                info!("host input closed");
                return;
            }
            Err(err) => {
                warn!(%err, "failed to read host input");
                return;
            }
        };

        if line.trim().is_empty() {
            continue;
        }

        let reply = match serde_json::from_str::<Invocation>(&line) {
            Ok(invocation) => {
                let call = bridge.call(invocation.event, invocation.context);
                tokio::select! {
                    result = call => match result {
                        Ok(reply) => reply,
                        // Fatal fault or shutdown; the caller is not answered.
                        Err(err) => {
                            warn!(error = %err, "call ended without a reply");
                            return;
                        }
                    },
                    () = &mut signal => {
                        info!("shutdown signal received during call");
                        return;
                    }
                }
            }
            Err(err) => Reply::error(serde_json::Value::String(format!(
                "invalid invocation: {err}"
            ))),
        };

        if let Err(err) = write_reply(&mut stdout, &reply).await {
            warn!(error = %err, "failed to write reply to host");
            return;
        }
    }
}

async fn write_reply<W>(out: &mut W, reply: &Reply) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut line = reply.to_line()?;
    line.push('\n');
    out.write_all(line.as_bytes()).await?;
    out.flush().await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(err) => {
                warn!(%err, "failed to register SIGTERM handler, using ctrl-c only");
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = ctrl_c.await {
            error!(%err, "ctrl-c signal handler failed");
        }
    }
}

/// Install the stderr subscriber. With `debug` on, the line trace target is
/// enabled at `info` whatever `RUST_LOG` says.
fn init_tracing(log_format: LogFormat, debug: bool) -> Result<()> {
    let mut env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if debug {
        let directive = format!("{TRACE_TARGET}=info")
            .parse()
            .map_err(|err| AppError::Config(format!("invalid trace directive: {err}")))?;
        env_filter = env_filter.add_directive(directive);
    }

    let subscriber = fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
