//! Line-delimited JSON bridge to a long-lived child process.
//!
//! - `codec`: newline framing over the child's stdio.
//! - `envelope`: the `{event, context}` / `{error, value}` wire shapes.
//! - `pending`: the single-slot correlation between a call and its reply.
//! - `lifecycle`: `Starting → Ready → Terminated` with fatal-fault reasons.
//! - `reader` / `writer`: tasks owning the child's stdout and stdin.
//! - `spawner`: process launch and exit monitoring.
//! - `bridge`: the [`Bridge`] that ties them together.

pub mod bridge;
pub mod codec;
pub mod envelope;
pub mod lifecycle;
pub mod pending;
pub mod reader;
pub mod spawner;
pub mod writer;

pub use bridge::Bridge;
pub use envelope::{Invocation, Reply};
pub use lifecycle::{Fatal, Lifecycle, LifecycleState, Termination};
pub use pending::Completion;
