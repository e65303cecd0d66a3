//! Unit tests for the invocation and reply envelopes.

use serde_json::{json, Value};

use ndjson_shim::shim::envelope::{Invocation, Reply};
use ndjson_shim::AppError;

#[test]
fn invocation_serialises_event_and_context() {
    let line = Invocation::new(json!({"n": 1}), json!({"functionName": "f"}))
        .to_line()
        .expect("serialise");
    let parsed: Value = serde_json::from_str(&line).expect("valid json");

    assert_eq!(parsed["event"], json!({"n": 1}));
    assert_eq!(parsed["context"]["functionName"], "f");
}

/// A host invocation without `context` still deserialises.
#[test]
fn invocation_missing_context_defaults_to_null() {
    let inv: Invocation = serde_json::from_str(r#"{"event":{"n":1}}"#).expect("parse");
    assert_eq!(inv.context, Value::Null);
}

#[test]
fn value_reply_is_success() {
    let reply = Reply::parse_line(r#"{"value":2}"#).expect("parse");
    assert!(!reply.is_error());
    assert_eq!(reply.into_result(), Ok(json!(2)));
}

#[test]
fn error_reply_carries_error_value() {
    let reply = Reply::parse_line(r#"{"error":"bad input"}"#).expect("parse");
    assert!(reply.is_error());
    assert_eq!(reply.value, None);
    assert_eq!(reply.into_result(), Err(json!("bad input")));
}

/// Both fields absent is a success with no value.
#[test]
fn empty_object_is_success_with_null_value() {
    let reply = Reply::parse_line("{}").expect("parse");
    assert_eq!(reply, Reply::default());
    assert_eq!(reply.into_result(), Ok(Value::Null));
}

/// An error takes precedence when both fields are present.
#[test]
fn error_wins_over_value() {
    let reply = Reply::parse_line(r#"{"error":{"code":7},"value":1}"#).expect("parse");
    assert_eq!(reply.into_result(), Err(json!({"code": 7})));
}

#[test]
fn non_json_line_is_malformed() {
    match Reply::parse_line("not json") {
        Err(AppError::Protocol(msg)) => assert!(msg.starts_with("malformed json"), "got: {msg}"),
        other => panic!("expected protocol error, got {other:?}"),
    }
}

#[test]
fn scalar_json_is_not_an_envelope() {
    assert!(matches!(
        Reply::parse_line("42"),
        Err(AppError::Protocol(_))
    ));
}

#[test]
fn reply_line_omits_absent_fields() {
    let line = Reply::value(json!([1, 2])).to_line().expect("serialise");
    assert_eq!(line, r#"{"value":[1,2]}"#);

    let line = Reply::error(json!("boom")).to_line().expect("serialise");
    assert_eq!(line, r#"{"error":"boom"}"#);
}
