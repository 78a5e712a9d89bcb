// src/middleware/server_header.rs

use axum::{
    extract::{Request, State},
    http::{header, HeaderValue},
    middleware::Next,
    response::Response,
};

use crate::config::AppState;

/// Stamps every response, errors included, with `Server: <APP_NAME>`.
pub async fn server_header(State(app_state): State<AppState>, request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;

    match HeaderValue::from_str(&app_state.config.app_name) {
        Ok(value) => {
            response.headers_mut().insert(header::SERVER, value);
        }
        Err(_) => tracing::warn!(app_name = %app_state.config.app_name, "APP_NAME is not a valid header value"),
    }
    response
}
