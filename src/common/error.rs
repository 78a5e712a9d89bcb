// src/common/error.rs

use std::{collections::HashMap, time::Duration};

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use validator::{ValidationErrors, ValidationErrorsKind};

use crate::common::response::ApiResponse;

const UNEXPECTED: &str = "An unexpected error has occurred";
const VALIDATION_INVALID: &str = "Validation invalid";

#[derive(Debug, Error)]
pub enum AppError {
    #[error("validation failed")]
    ValidationError(#[from] ValidationErrors),

    // Bad path ids, bad query strings, unknown search/order columns, bad coordinates
    #[error("{0}")]
    InvalidInput(String),

    // JSON body that could not be parsed into the payload
    #[error("{0}")]
    UnprocessableEntity(String),

    #[error("{entity} '{key}' not found")]
    NotFound { entity: &'static str, key: String },

    #[error("{0}")]
    Conflict(String),

    #[error("method {method} is not allowed on '{path}'")]
    MethodNotAllowed { method: String, path: String },

    #[error("query did not finish within {0:?}")]
    Timeout(Duration),

    #[error("database error")]
    DatabaseError(#[from] sqlx::Error),

    #[error("internal server error")]
    InternalServerError(#[from] anyhow::Error),
}

impl AppError {
    pub fn not_found(entity: &'static str, key: impl ToString) -> Self {
        AppError::NotFound { entity, key: key.to_string() }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_) | AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::UnprocessableEntity(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            AppError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            AppError::DatabaseError(_) | AppError::InternalServerError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        let envelope = match self {
            AppError::ValidationError(errors) => {
                let mut details = HashMap::new();
                collect_field_messages("", &errors, &mut details);
                ApiResponse::failure(status, Some(VALIDATION_INVALID.to_string()), json!(details))
            }
            AppError::InvalidInput(detail) | AppError::UnprocessableEntity(detail) => {
                ApiResponse::failure(status, Some(UNEXPECTED.to_string()), json!(detail))
            }
            ref e @ (AppError::NotFound { .. } | AppError::Conflict(_) | AppError::MethodNotAllowed { .. }) => {
                ApiResponse::failure(status, None, json!(e.to_string()))
            }
            ref e @ AppError::Timeout(_) => {
                tracing::warn!("Request timed out: {}", e);
                ApiResponse::failure(status, Some(UNEXPECTED.to_string()), json!(e.to_string()))
            }
            // Database and internal errors: the detail goes to the log, the client gets the short form.
            AppError::DatabaseError(ref source) => {
                tracing::error!("Database error: {:?}", source);
                ApiResponse::failure(status, Some(UNEXPECTED.to_string()), json!("database error"))
            }
            AppError::InternalServerError(ref source) => {
                tracing::error!("Internal server error: {:#}", source);
                ApiResponse::failure(status, Some(UNEXPECTED.to_string()), json!("internal server error"))
            }
        };

        envelope.into_response()
    }
}

// Nested payloads are reported as `parent.field`.
fn collect_field_messages(prefix: &str, errors: &ValidationErrors, out: &mut HashMap<String, Vec<String>>) {
    for (field, kind) in errors.errors() {
        let path = if prefix.is_empty() { field.to_string() } else { format!("{prefix}.{field}") };
        match kind {
            ValidationErrorsKind::Field(field_errors) => {
                let messages = field_errors.iter().map(|e| match &e.message {
                    Some(m) => m.to_string(),
                    None => e.code.to_string(),
                });
                out.entry(path).or_default().extend(messages);
            }
            ValidationErrorsKind::Struct(inner) => collect_field_messages(&path, inner, out),
            ValidationErrorsKind::List(items) => {
                for (index, inner) in items {
                    collect_field_messages(&format!("{path}[{index}]"), inner, out);
                }
            }
        }
    }
}

/// Maps a database error raised by an insert/update onto the error taxonomy:
/// unique violations become conflicts, foreign-key violations become not-found.
pub(crate) fn map_write_error(
    e: sqlx::Error,
    conflict: impl FnOnce() -> AppError,
    missing: impl FnOnce() -> AppError,
) -> AppError {
    if let sqlx::Error::Database(db_err) = &e {
        if db_err.is_unique_violation() {
            return conflict();
        }
        if db_err.is_foreign_key_violation() {
            return missing();
        }
    }
    e.into()
}
