//! Bridge lifecycle state machine.
//!
//! ```text
//! Starting ──► Ready ──► Terminated
//!     └──────────────────────▲
//! ```
//!
//! `Terminated` is absorbing: the first transition into it wins and every
//! later attempt is ignored. Observers wait on [`Lifecycle::terminated`] to
//! learn why the bridge stopped and which exit status the host should use.

use std::fmt::{Display, Formatter};

use tokio::sync::watch;

/// Host exit status for fatal faults.
pub const FATAL_EXIT_CODE: i32 = 1;

/// Unrecoverable bridge faults. Each one ends the host process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fatal {
    /// The child executable could not be started.
    SpawnFailed(String),
    /// The child exited. `code` is `None` when it was killed by a signal.
    ChildExited {
        /// Exit code reported by the OS, if any.
        code: Option<i32>,
    },
    /// A child output line could not be parsed as a response envelope.
    MalformedLine(String),
    /// Reading from or writing to the child failed.
    StreamError(String),
}

impl Display for Fatal {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SpawnFailed(msg) => write!(f, "spawn failed: {msg}"),
            Self::ChildExited { code: Some(code) } => write!(f, "child exited with code {code}"),
            Self::ChildExited { code: None } => write!(f, "child terminated by signal"),
            Self::MalformedLine(msg) => write!(f, "malformed response line: {msg}"),
            Self::StreamError(msg) => write!(f, "stream error: {msg}"),
        }
    }
}

/// Why the bridge reached `Terminated`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Termination {
    /// A fault the bridge cannot recover from.
    Fatal(Fatal),
    /// The host asked the bridge to stop.
    Shutdown,
}

impl Termination {
    /// Process exit status the host should terminate with.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Fatal(_) => FATAL_EXIT_CODE,
            Self::Shutdown => 0,
        }
    }

    /// Whether this termination is a fault.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal(_))
    }
}

impl Display for Termination {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fatal(fatal) => write!(f, "fatal: {fatal}"),
            Self::Shutdown => write!(f, "shutdown requested"),
        }
    }
}

/// Observable lifecycle states.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleState {
    /// The child is being spawned.
    Starting,
    /// The child is running and accepting invocations.
    Ready,
    /// The bridge has stopped for good.
    Terminated(Termination),
}

/// Shared lifecycle cell backed by a [`watch`] channel.
#[derive(Debug)]
pub struct Lifecycle {
    tx: watch::Sender<LifecycleState>,
}

impl Lifecycle {
    /// Create a lifecycle in the `Starting` state.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(LifecycleState::Starting);
        Self { tx }
    }

    /// Current state snapshot.
    #[must_use]
    pub fn state(&self) -> LifecycleState {
        self.tx.borrow().clone()
    }

    /// Whether the bridge accepts new invocations.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        matches!(*self.tx.borrow(), LifecycleState::Ready)
    }

    /// Move `Starting → Ready`. Returns `false` from any other state.
    pub fn mark_ready(&self) -> bool {
        self.tx.send_if_modified(|state| {
            if matches!(state, LifecycleState::Starting) {
                *state = LifecycleState::Ready;
                true
            } else {
                false
            }
        })
    }

    /// Move to `Terminated(reason)`. Returns `false` if already terminated.
    pub fn terminate(&self, reason: Termination) -> bool {
        self.tx.send_if_modified(|state| {
            if matches!(state, LifecycleState::Terminated(_)) {
                false
            } else {
                *state = LifecycleState::Terminated(reason);
                true
            }
        })
    }

    /// The termination reason, if the bridge has stopped.
    #[must_use]
    pub fn termination(&self) -> Option<Termination> {
        match &*self.tx.borrow() {
            LifecycleState::Terminated(reason) => Some(reason.clone()),
            _ => None,
        }
    }

    /// Wait until the bridge reaches `Terminated` and return why.
    pub async fn terminated(&self) -> Termination {
        let mut rx = self.tx.subscribe();
        let reason = match rx
            .wait_for(|state| matches!(state, LifecycleState::Terminated(_)))
            .await
        {
            Ok(state) => match &*state {
                LifecycleState::Terminated(reason) => reason.clone(),
                // wait_for only returns on a matching state.
                _ => Termination::Shutdown,
            },
            // Unreachable while `self` holds the sender.
            Err(_) => Termination::Shutdown,
        };
        reason
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}
