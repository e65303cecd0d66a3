//! Unit tests for `AppError` display and conversions.

use ndjson_shim::AppError;

#[test]
fn display_prefixes_error_class() {
    let cases = [
        (AppError::Config("bad".into()), "config: bad"),
        (AppError::Spawn("missing".into()), "spawn: missing"),
        (AppError::Exited("code 3".into()), "exited: code 3"),
        (AppError::Protocol("not json".into()), "protocol: not json"),
        (AppError::Io("broken pipe".into()), "io: broken pipe"),
        (AppError::Closed("done".into()), "closed: done"),
    ];

    for (err, expected) in cases {
        assert_eq!(err.to_string(), expected);
    }
}

#[test]
fn io_error_converts_to_io_variant() {
    let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed");
    let err: AppError = io.into();
    assert!(matches!(err, AppError::Io(ref msg) if msg.contains("pipe closed")));
}

#[test]
fn toml_error_converts_to_config_variant() {
    let toml_err = toml::from_str::<toml::Value>("= nope").expect_err("invalid toml");
    let err: AppError = toml_err.into();
    assert!(matches!(err, AppError::Config(ref msg) if msg.starts_with("invalid config")));
}
