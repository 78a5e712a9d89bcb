// src/common/response.rs

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---
// The uniform envelope every endpoint answers with:
// { code, result?, message?, error?, success }
// ---
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub code: u16,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<T>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,

    pub success: bool,
}

impl<T> ApiResponse<T> {
    /// Successful response carrying a payload.
    pub fn ok(status: StatusCode, result: T, message: impl Into<String>) -> Self {
        Self {
            code: status.as_u16(),
            result: Some(result),
            message: Some(message.into()),
            error: None,
            success: true,
        }
    }
}

impl ApiResponse<()> {
    /// Successful response with nothing but a message (delete, link).
    pub fn done(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            code: status.as_u16(),
            result: None,
            message: Some(message.into()),
            error: None,
            success: true,
        }
    }

    pub fn failure(status: StatusCode, message: Option<String>, error: Value) -> Self {
        Self {
            code: status.as_u16(),
            result: None,
            message,
            error: Some(error),
            success: false,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self)).into_response()
    }
}
