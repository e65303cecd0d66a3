//! Shim configuration parsing, validation, and environment overrides.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{AppError, Result};

/// Environment variable that turns on verbose line tracing.
pub const DEBUG_ENV_VAR: &str = "DEBUG_SHIM";

/// What the bridge does with a child output line that is not valid JSON.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MalformedLinePolicy {
    /// Treat the line as a protocol fault and terminate the host.
    #[default]
    Fatal,
    /// Log the line and drop it; the pending call stays armed.
    Skip,
}

fn default_command() -> String {
    "./main".into()
}

fn default_max_line_bytes() -> usize {
    1_048_576
}

fn default_shutdown_grace_ms() -> u64 {
    2000
}

/// Command-line values that take precedence over the config file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overrides {
    /// Replacement child executable.
    pub command: Option<String>,
    /// Replacement child arguments; empty keeps the configured ones.
    pub args: Vec<String>,
    /// Force line tracing on.
    pub debug: bool,
}

/// Bridge configuration parsed from `shim.toml`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct ShimConfig {
    /// Child executable: a path, or a bare name looked up on `PATH`.
    #[serde(default = "default_command")]
    pub command: String,
    /// Arguments passed to the child executable.
    #[serde(default)]
    pub args: Vec<String>,
    /// Working directory for the child; inherits the host's when unset.
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
    /// When set, the child environment is cleared and only these variables
    /// are copied from the host.
    #[serde(default)]
    pub env_allowlist: Option<Vec<String>>,
    /// Trace every child output line before it is parsed.
    #[serde(default)]
    pub debug: bool,
    /// Handling of child output lines that are not valid JSON.
    #[serde(default)]
    pub on_malformed: MalformedLinePolicy,
    /// Longest child output line accepted by the codec.
    #[serde(default = "default_max_line_bytes")]
    pub max_line_bytes: usize,
    /// Grace period between SIGTERM and SIGKILL on a host-initiated shutdown.
    #[serde(default = "default_shutdown_grace_ms")]
    pub shutdown_grace_ms: u64,
}

impl Default for ShimConfig {
    fn default() -> Self {
        Self {
            command: default_command(),
            args: Vec::new(),
            working_dir: None,
            env_allowlist: None,
            debug: false,
            on_malformed: MalformedLinePolicy::default(),
            max_line_bytes: default_max_line_bytes(),
            shutdown_grace_ms: default_shutdown_grace_ms(),
        }
    }
}

impl ShimConfig {
    /// Build a configuration that runs `command` with `args` and defaults
    /// for everything else.
    #[must_use]
    pub fn for_command(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
            ..Self::default()
        }
    }

    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or contains
    /// invalid TOML, or if validation fails.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string and normalize paths.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let mut config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply command-line overrides, then re-validate.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the result fails validation.
    pub fn apply_overrides(&mut self, overrides: Overrides) -> Result<()> {
        if let Some(command) = overrides.command {
            self.command = command;
        }
        if !overrides.args.is_empty() {
            self.args = overrides.args;
        }
        self.debug |= overrides.debug;
        self.validate()
    }

    /// Apply the `DEBUG_SHIM` toggle from the process environment.
    pub fn apply_env(&mut self) {
        let raw = env::var(DEBUG_ENV_VAR).ok();
        self.apply_debug_toggle(raw.as_deref());
    }

    /// Apply a raw `DEBUG_SHIM` value. `None` leaves `debug` untouched.
    pub fn apply_debug_toggle(&mut self, raw: Option<&str>) {
        if let Some(value) = raw {
            self.debug = debug_flag_enabled(value);
        }
    }

    /// Grace period used when stopping the child on purpose.
    #[must_use]
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }

    /// Check invariants that serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` when the command is blank, the line limit is
    /// zero, or `working_dir` does not resolve.
    pub fn validate(&mut self) -> Result<()> {
        if self.command.trim().is_empty() {
            return Err(AppError::Config("command must not be empty".into()));
        }

        if self.max_line_bytes == 0 {
            return Err(AppError::Config(
                "max_line_bytes must be greater than zero".into(),
            ));
        }

        if let Some(dir) = &self.working_dir {
            let canonical = dir
                .canonicalize()
                .map_err(|err| AppError::Config(format!("working_dir invalid: {err}")))?;
            self.working_dir = Some(canonical);
        }

        Ok(())
    }
}

/// Interpret a `DEBUG_SHIM` value. Empty, `0`, `false`, `off` and `no` are off.
#[must_use]
pub fn debug_flag_enabled(raw: &str) -> bool {
    let value = raw.trim();
    !(value.is_empty()
        || value == "0"
        || value.eq_ignore_ascii_case("false")
        || value.eq_ignore_ascii_case("off")
        || value.eq_ignore_ascii_case("no"))
}
