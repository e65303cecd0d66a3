//! Unit tests for `ShimConfig` parsing, overrides, and the debug toggle.

use std::io::Write;

use serial_test::serial;

use ndjson_shim::config::{debug_flag_enabled, MalformedLinePolicy, Overrides, DEBUG_ENV_VAR};
use ndjson_shim::{AppError, ShimConfig};

#[test]
fn empty_file_uses_defaults() {
    let config = ShimConfig::from_toml_str("").expect("empty config is valid");

    assert_eq!(config, ShimConfig::default());
    assert_eq!(config.command, "./main");
    assert!(config.args.is_empty());
    assert!(!config.debug);
    assert_eq!(config.on_malformed, MalformedLinePolicy::Fatal);
    assert_eq!(config.max_line_bytes, 1_048_576);
    assert_eq!(config.shutdown_grace().as_millis(), 2000);
}

#[test]
fn full_config_parses() {
    let dir = tempfile::tempdir().expect("tempdir");
    let toml = format!(
        r#"
command = "/usr/bin/node"
args = ["index.js", "--quiet"]
working_dir = '{}'
env_allowlist = ["PATH", "HOME"]
debug = true
on_malformed = "skip"
max_line_bytes = 4096
shutdown_grace_ms = 250
"#,
        dir.path().display()
    );

    let config = ShimConfig::from_toml_str(&toml).expect("valid config");

    assert_eq!(config.command, "/usr/bin/node");
    assert_eq!(config.args, vec!["index.js", "--quiet"]);
    assert_eq!(
        config.working_dir,
        Some(dir.path().canonicalize().expect("canonical"))
    );
    assert_eq!(
        config.env_allowlist,
        Some(vec!["PATH".to_owned(), "HOME".to_owned()])
    );
    assert!(config.debug);
    assert_eq!(config.on_malformed, MalformedLinePolicy::Skip);
    assert_eq!(config.max_line_bytes, 4096);
    assert_eq!(config.shutdown_grace_ms, 250);
}

#[test]
fn load_from_path_reads_file() {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    writeln!(file, "command = \"python3\"\nargs = [\"main.py\"]").expect("write");

    let config = ShimConfig::load_from_path(file.path()).expect("load");
    assert_eq!(config.command, "python3");
    assert_eq!(config.args, vec!["main.py"]);
}

#[test]
fn missing_file_is_config_error() {
    let result = ShimConfig::load_from_path("/nonexistent/shim.toml");
    assert!(matches!(result, Err(AppError::Config(_))));
}

#[test]
fn blank_command_is_rejected() {
    let result = ShimConfig::from_toml_str("command = \"  \"");
    assert!(matches!(result, Err(AppError::Config(ref msg)) if msg.contains("command")));
}

#[test]
fn zero_line_limit_is_rejected() {
    let result = ShimConfig::from_toml_str("max_line_bytes = 0");
    assert!(matches!(result, Err(AppError::Config(ref msg)) if msg.contains("max_line_bytes")));
}

#[test]
fn unknown_policy_is_rejected() {
    let result = ShimConfig::from_toml_str("on_malformed = \"retry\"");
    assert!(matches!(result, Err(AppError::Config(_))));
}

#[test]
fn missing_working_dir_is_rejected() {
    let result = ShimConfig::from_toml_str("working_dir = \"/definitely/not/here\"");
    assert!(matches!(result, Err(AppError::Config(ref msg)) if msg.contains("working_dir")));
}

// ── Overrides ────────────────────────────────────────────────────────────────

#[test]
fn overrides_replace_command_and_args() {
    let mut config = ShimConfig::for_command("./main", vec!["a".into()]);
    config
        .apply_overrides(Overrides {
            command: Some("./other".into()),
            args: vec!["b".into(), "c".into()],
            debug: true,
        })
        .expect("overrides valid");

    assert_eq!(config.command, "./other");
    assert_eq!(config.args, vec!["b", "c"]);
    assert!(config.debug);
}

/// Empty override args keep the configured ones and `debug: false` never
/// clears a configured `true`.
#[test]
fn empty_overrides_keep_configured_values() {
    let mut config = ShimConfig::for_command("./main", vec!["a".into()]);
    config.debug = true;
    config
        .apply_overrides(Overrides::default())
        .expect("overrides valid");

    assert_eq!(config.command, "./main");
    assert_eq!(config.args, vec!["a"]);
    assert!(config.debug);
}

#[test]
fn blank_override_command_is_rejected() {
    let mut config = ShimConfig::default();
    let result = config.apply_overrides(Overrides {
        command: Some(String::new()),
        ..Overrides::default()
    });
    assert!(matches!(result, Err(AppError::Config(_))));
}

// ── Debug toggle ─────────────────────────────────────────────────────────────

#[test]
fn debug_flag_values() {
    for on in ["1", "true", "TRUE", "yes", "on", "anything"] {
        assert!(debug_flag_enabled(on), "{on:?} should enable tracing");
    }
    for off in ["", " ", "0", "false", "False", "off", "NO"] {
        assert!(!debug_flag_enabled(off), "{off:?} should disable tracing");
    }
}

#[test]
fn unset_toggle_leaves_debug_untouched() {
    let mut config = ShimConfig::default();
    config.debug = true;
    config.apply_debug_toggle(None);
    assert!(config.debug);

    config.apply_debug_toggle(Some("0"));
    assert!(!config.debug);
}

#[test]
#[serial]
fn env_var_enables_debug() {
    std::env::set_var(DEBUG_ENV_VAR, "1");
    let mut config = ShimConfig::default();
    config.apply_env();
    std::env::remove_var(DEBUG_ENV_VAR);

    assert!(config.debug);
}

#[test]
#[serial]
fn absent_env_var_keeps_default() {
    std::env::remove_var(DEBUG_ENV_VAR);
    let mut config = ShimConfig::default();
    config.apply_env();

    assert!(!config.debug);
}
