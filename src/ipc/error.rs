use crate::error::LmsError;
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

/// Maps a domain failure onto the wire error object.
pub fn lms_err(id: &str, e: &LmsError) -> serde_json::Value {
    match e {
        LmsError::Db(_) | LmsError::Json(_) | LmsError::Other(_) => {
            tracing::error!(request_id = id, error = %e, "request failed");
        }
        _ => tracing::debug!(request_id = id, code = e.code(), "request rejected"),
    }
    err(id, e.code(), e.to_string(), e.details())
}
