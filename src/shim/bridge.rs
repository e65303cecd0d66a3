//! Process Bridge: one child, one pending call, one reader, one writer.
//!
//! ```text
//!  submit(event, context, done)           reader task
//!      │ arm PendingCall ◄──────────────── take + complete
//!      │ send line                             ▲
//!      ▼                                       │
//!  writer task ──► child stdin   child stdout ─┘
//!                                child exit ──► monitor task ──► Lifecycle
//! ```
//!
//! The slot is armed before the line is queued, so a fast child can never
//! answer before its caller is registered.

use std::sync::Arc;

use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::config::ShimConfig;
use crate::shim::codec::LineCodec;
use crate::shim::envelope::{Invocation, Reply};
use crate::shim::lifecycle::{Fatal, Lifecycle, LifecycleState, Termination};
use crate::shim::pending::{Completion, PendingCall};
use crate::shim::reader::{run_reader, LineHandler};
use crate::shim::spawner::{monitor_exit, spawn_child};
use crate::shim::writer::run_writer;
use crate::{AppError, Result};

/// Outbound line buffer depth. One call is in flight at a time, so this only
/// absorbs a misbehaving host.
const WRITER_CHANNEL_CAPACITY: usize = 8;

/// Owner of the child process and the correlation slot.
#[derive(Debug)]
pub struct Bridge {
    pending: Arc<PendingCall>,
    lifecycle: Arc<Lifecycle>,
    line_tx: mpsc::Sender<String>,
    cancel: CancellationToken,
    tasks: TaskTracker,
    pid: Option<u32>,
}

impl Bridge {
    /// Spawn the configured child and start the reader, writer, and exit
    /// monitor tasks. Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Spawn`] when the child cannot be started. The
    /// failure is logged here; the host is expected to exit non-zero.
    pub fn start(config: &ShimConfig) -> Result<Self> {
        let lifecycle = Arc::new(Lifecycle::new());

        let proc = match spawn_child(config) {
            Ok(proc) => proc,
            Err(err) => {
                error!(error = %err, "error: child process could not be started");
                lifecycle.terminate(Termination::Fatal(Fatal::SpawnFailed(err.to_string())));
                return Err(err);
            }
        };

        let mut bridge = Self::assemble(config, proc.stdin, proc.stdout, lifecycle);
        bridge.pid = proc.pid;

        let monitor = monitor_exit(
            proc.child,
            Arc::clone(&bridge.lifecycle),
            bridge.cancel.clone(),
            config.shutdown_grace(),
        );
        bridge.tasks.spawn(monitor);
        bridge.lifecycle.mark_ready();

        Ok(bridge)
    }

    /// Run the bridge over arbitrary streams instead of a spawned child.
    ///
    /// No exit monitor is attached; the bridge terminates only on a protocol
    /// or stream fault, or on [`Bridge::shutdown`].
    #[must_use]
    pub fn attach<W, R>(config: &ShimConfig, stdin: W, stdout: R) -> Self
    where
        W: AsyncWrite + Unpin + Send + 'static,
        R: AsyncRead + Unpin + Send + 'static,
    {
        let bridge = Self::assemble(config, stdin, stdout, Arc::new(Lifecycle::new()));
        bridge.lifecycle.mark_ready();
        bridge
    }

    fn assemble<W, R>(config: &ShimConfig, stdin: W, stdout: R, lifecycle: Arc<Lifecycle>) -> Self
    where
        W: AsyncWrite + Unpin + Send + 'static,
        R: AsyncRead + Unpin + Send + 'static,
    {
        let pending = Arc::new(PendingCall::new());
        let cancel = CancellationToken::new();
        let tasks = TaskTracker::new();
        let (line_tx, line_rx) = mpsc::channel(WRITER_CHANNEL_CAPACITY);

        let handler = LineHandler::new(Arc::clone(&pending), config.debug, config.on_malformed);
        tasks.spawn(run_reader(
            stdout,
            LineCodec::with_max_length(config.max_line_bytes),
            handler,
            Arc::clone(&lifecycle),
            cancel.clone(),
        ));

        let writer_lifecycle = Arc::clone(&lifecycle);
        let writer_cancel = cancel.clone();
        tasks.spawn(async move {
            if let Err(err) = run_writer(stdin, line_rx, writer_cancel).await {
                writer_lifecycle.terminate(Termination::Fatal(Fatal::StreamError(err.to_string())));
            }
        });

        Self {
            pending,
            lifecycle,
            line_tx,
            cancel,
            tasks,
            pid: None,
        }
    }

    /// Submit one invocation. The reply is delivered later through `done`.
    ///
    /// Only one call may be in flight. Submitting while another call is
    /// pending replaces it; the displaced completion is dropped without a
    /// reply and a warning is logged.
    ///
    /// # Errors
    ///
    /// - [`AppError::Closed`]: the bridge has terminated.
    /// - [`AppError::Protocol`]: the envelope could not be serialised.
    pub async fn submit(&self, event: Value, context: Value, done: Completion) -> Result<()> {
        if let LifecycleState::Terminated(reason) = self.lifecycle.state() {
            return Err(AppError::Closed(reason.to_string()));
        }

        let line = Invocation::new(event, context).to_line()?;
        let call_id = done.call_id();

        if let Some(displaced) = self.pending.arm(done).await {
            warn!(
                %call_id,
                displaced = %displaced.call_id(),
                "call submitted while another was pending; earlier caller will not be answered"
            );
        }

        debug!(%call_id, bytes = line.len(), "submitting invocation");

        if self.line_tx.send(line).await.is_err() {
            self.pending.take().await;
            return Err(AppError::Closed("child stdin writer has stopped".into()));
        }

        Ok(())
    }

    /// Submit one invocation and wait for its reply.
    ///
    /// # Errors
    ///
    /// - [`AppError::Closed`]: the bridge was already terminated, or was
    ///   shut down before the reply arrived.
    /// - [`AppError::Exited`]: a fatal fault ended the bridge mid-call.
    pub async fn call(&self, event: Value, context: Value) -> Result<Reply> {
        let (done, rx) = Completion::channel();
        self.submit(event, context, done).await?;

        tokio::select! {
            reply = rx => reply.map_err(|_| AppError::Closed("call was displaced by a newer call".into())),
            reason = self.lifecycle.terminated() => Err(match reason {
                Termination::Fatal(fatal) => AppError::Exited(fatal.to_string()),
                Termination::Shutdown => AppError::Closed("bridge shut down".into()),
            }),
        }
    }

    /// Shared lifecycle cell.
    #[must_use]
    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    /// Wait until the bridge terminates and return why.
    pub async fn terminated(&self) -> Termination {
        self.lifecycle.terminated().await
    }

    /// Child process id, when the bridge owns a spawned child.
    #[must_use]
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Whether a call is currently in flight.
    pub async fn has_pending_call(&self) -> bool {
        self.pending.is_armed().await
    }

    /// Stop the bridge on the host's request and wait for its tasks.
    ///
    /// If a fatal fault already terminated the bridge, that reason is kept
    /// and returned instead of [`Termination::Shutdown`].
    pub async fn shutdown(self) -> Termination {
        if self.lifecycle.terminate(Termination::Shutdown) {
            info!("bridge shutdown requested");
        }

        self.cancel.cancel();
        self.tasks.close();
        self.tasks.wait().await;

        self.lifecycle
            .termination()
            .unwrap_or(Termination::Shutdown)
    }
}
