use crate::error::{AttendanceError, StoreError};
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

#[derive(Debug)]
pub struct HandlerErr {
    pub code: &'static str,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl HandlerErr {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        HandlerErr {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn bad_params(message: impl Into<String>) -> Self {
        Self::new("bad_params", message)
    }

    pub fn response(self, id: &str) -> serde_json::Value {
        err(id, self.code, self.message, self.details)
    }
}

impl From<AttendanceError> for HandlerErr {
    fn from(e: AttendanceError) -> Self {
        let message = e.to_string();
        match e {
            AttendanceError::Validation(_) => HandlerErr::new("bad_params", message),
            AttendanceError::NotFound(_) => HandlerErr::new("not_found", message),
            AttendanceError::Unauthorized(_) => HandlerErr::new("unauthorized", message),
            AttendanceError::Forbidden(_) => HandlerErr::new("forbidden", message),
            AttendanceError::Persistence(_) => HandlerErr::new("db_query_failed", message),
            AttendanceError::PartialApplication { committed, failed } => HandlerErr {
                code: if committed.is_empty() {
                    "db_update_failed"
                } else {
                    "partial_failure"
                },
                message,
                details: Some(json!({
                    "committed": committed,
                    "failed": failed,
                })),
            },
        }
    }
}

impl From<StoreError> for HandlerErr {
    fn from(e: StoreError) -> Self {
        AttendanceError::from(e).into()
    }
}
