//! Single-slot request/response correlation.
//!
//! The child protocol carries no request identifier: the response to the
//! call in flight is simply the next complete line on stdout. The bridge
//! therefore keeps exactly one armed [`Completion`] at a time. Arming a new
//! one while another is still pending displaces the old one; its caller sees
//! the completion dropped instead of a reply.

use std::fmt::{Debug, Formatter};

use serde_json::Value;
use tokio::sync::{oneshot, Mutex};
use uuid::Uuid;

use crate::shim::envelope::Reply;

type Callback = Box<dyn FnOnce(Option<Value>, Option<Value>) + Send + 'static>;

enum Target {
    Channel(oneshot::Sender<Reply>),
    Callback(Callback),
}

/// Completion handle for one call.
pub struct Completion {
    call_id: Uuid,
    target: Target,
}

impl Completion {
    /// Create a channel-backed completion and the receiver that will get the
    /// reply.
    #[must_use]
    pub fn channel() -> (Self, oneshot::Receiver<Reply>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                call_id: Uuid::new_v4(),
                target: Target::Channel(tx),
            },
            rx,
        )
    }

    /// Create a completion that invokes `done(error, value)` exactly once.
    #[must_use]
    pub fn from_fn<F>(done: F) -> Self
    where
        F: FnOnce(Option<Value>, Option<Value>) + Send + 'static,
    {
        Self {
            call_id: Uuid::new_v4(),
            target: Target::Callback(Box::new(done)),
        }
    }

    /// Identifier used to correlate log lines for this call.
    #[must_use]
    pub fn call_id(&self) -> Uuid {
        self.call_id
    }

    /// Deliver `reply`. Returns `false` if a channel receiver was already gone.
    pub fn complete(self, reply: Reply) -> bool {
        match self.target {
            Target::Channel(tx) => tx.send(reply).is_ok(),
            Target::Callback(done) => {
                done(reply.error, reply.value);
                true
            }
        }
    }
}

impl Debug for Completion {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let kind = match self.target {
            Target::Channel(_) => "channel",
            Target::Callback(_) => "callback",
        };
        f.debug_struct("Completion")
            .field("call_id", &self.call_id)
            .field("target", &kind)
            .finish()
    }
}

/// The bridge's only shared mutable state: the armed completion, if any.
#[derive(Debug, Default)]
pub struct PendingCall {
    slot: Mutex<Option<Completion>>,
}

impl PendingCall {
    /// Create an empty slot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm the slot with `completion`, returning whatever it displaced.
    pub async fn arm(&self, completion: Completion) -> Option<Completion> {
        self.slot.lock().await.replace(completion)
    }

    /// Disarm the slot, returning the completion that was armed.
    pub async fn take(&self) -> Option<Completion> {
        self.slot.lock().await.take()
    }

    /// Whether a call is currently in flight.
    pub async fn is_armed(&self) -> bool {
        self.slot.lock().await.is_some()
    }
}
