//! Reply envelopes written back on stdout, one JSON object per line.

use crate::error::ImportError;
use serde_json::json;

pub fn ok(id: &str, result: serde_json::Value) -> serde_json::Value {
    json!({
        "id": id,
        "ok": true,
        "result": result
    })
}

pub fn err(
    id: &str,
    code: &str,
    message: impl Into<String>,
    details: Option<serde_json::Value>,
) -> serde_json::Value {
    let mut error = json!({
        "code": code,
        "message": message.into(),
    });
    if let Some(d) = details {
        error["details"] = d;
    }
    json!({
        "id": id,
        "ok": false,
        "error": error,
    })
}

/// Reply to a line that is not a request. There is no id to echo.
pub fn bad_json(message: impl Into<String>) -> serde_json::Value {
    json!({
        "ok": false,
        "error": { "code": "bad_json", "message": message.into() },
    })
}

/// Every method touching participants or archives needs an open workspace.
pub fn no_workspace(id: &str) -> serde_json::Value {
    err(id, "no_workspace", "select a workspace first", None)
}

pub fn import_failed(id: &str, e: &ImportError) -> serde_json::Value {
    err(id, e.code(), e.to_string(), None)
}
