#![forbid(unsafe_code)]

//! Bridge a function-as-a-service host to a long-lived child process that
//! speaks newline-delimited JSON over its stdin and stdout.

pub mod config;
pub mod errors;
pub mod function;
pub mod shim;

pub use config::ShimConfig;
pub use errors::{AppError, Result};
pub use shim::{Bridge, Completion, Reply, Termination};
