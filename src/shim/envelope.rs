//! Wire envelopes exchanged with the child process.
//!
//! Outbound (host → child), one line each:
//!
//! ```json
//! {"event": <any>, "context": <any>}
//! ```
//!
//! Inbound (child → host), one line each:
//!
//! ```json
//! {"error": <any|null>, "value": <any|null>}
//! ```
//!
//! A missing field and an explicit `null` mean the same thing: no error, or
//! no value.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{AppError, Result};

/// Request envelope written to the child's stdin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invocation {
    /// Triggering request supplied by the host.
    #[serde(default)]
    pub event: Value,
    /// Host call context, forwarded verbatim.
    #[serde(default)]
    pub context: Value,
}

impl Invocation {
    /// Build an invocation from its two parts.
    #[must_use]
    pub fn new(event: Value, context: Value) -> Self {
        Self { event, context }
    }

    /// Serialise to a single compact JSON line, without the trailing `\n`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Protocol`] if serialisation fails.
    pub fn to_line(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| AppError::Protocol(format!("failed to serialise invocation: {e}")))
    }
}

/// Response envelope read from the child's stdout.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Reply {
    /// Application-level error reported by the function.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
    /// Result value reported by the function.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl Reply {
    /// A successful reply carrying `value`.
    #[must_use]
    pub fn value(value: Value) -> Self {
        Self {
            error: None,
            value: Some(value),
        }
    }

    /// A failed reply carrying `error`.
    #[must_use]
    pub fn error(error: Value) -> Self {
        Self {
            error: Some(error),
            value: None,
        }
    }

    /// Whether the function reported an error.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Convert into `Ok(value)` or `Err(error)`, mapping absent parts to `null`.
    ///
    /// # Errors
    ///
    /// Returns the function's error value when one was reported.
    pub fn into_result(self) -> std::result::Result<Value, Value> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.value.unwrap_or(Value::Null)),
        }
    }

    /// Parse one inbound line.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Protocol`]`("malformed json: …")` when the line is
    /// not JSON, or `("envelope must be a json object …")` when it is JSON of
    /// another shape.
    pub fn parse_line(line: &str) -> Result<Self> {
        let raw: Value = serde_json::from_str(line)
            .map_err(|e| AppError::Protocol(format!("malformed json: {e}")))?;

        let Value::Object(mut fields) = raw else {
            return Err(AppError::Protocol(format!(
                "envelope must be a json object, got: {line}"
            )));
        };

        Ok(Self {
            error: fields.remove("error").filter(|v| !v.is_null()),
            value: fields.remove("value").filter(|v| !v.is_null()),
        })
    }

    /// Serialise to a single compact JSON line, without the trailing `\n`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Protocol`] if serialisation fails.
    pub fn to_line(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| AppError::Protocol(format!("failed to serialise reply: {e}")))
    }
}
