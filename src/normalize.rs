//! Error normalizer: one display message out of a heterogeneous failure.
//!
//! Failures are viewed as a JSON document shaped like
//! `{"response": {"status", "data"}, "message"}` and a fixed list of
//! optional paths is walked in priority order. The first non-empty string
//! wins; otherwise [`FALLBACK_MESSAGE`].

use serde_json::{json, Value};

use crate::error::ClientError;

pub const FALLBACK_MESSAGE: &str = "Something went wrong";

/// Priority order: server detail, server message, transport message,
/// then the nested envelopes some endpoints wrap errors in.
const MESSAGE_PATHS: &[&str] = &[
    "/response/data/detail",
    "/response/data/message",
    "/message",
    "/data/message",
    "/data/data/message",
];

/// Message for an arbitrary raw error document. Never panics.
pub fn normalize_value(raw: &Value) -> String {
    MESSAGE_PATHS
        .iter()
        .filter_map(|path| raw.pointer(path))
        .filter_map(Value::as_str)
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| FALLBACK_MESSAGE.to_string())
}

/// Raw document view of a client error.
pub fn raw_error(err: &ClientError) -> Value {
    match err {
        ClientError::Transport(t) => json!({
            "response": {
                "status": t.status,
                "data": t.body,
            },
            "message": t.message,
        }),
        other => json!({ "message": other.to_string() }),
    }
}

pub fn error_message(err: &ClientError) -> String {
    normalize_value(&raw_error(err))
}
