pub mod branch;
pub mod meal_plan;

use axum::{extract::State, response::IntoResponse, Json};
use serde_json::json;

use crate::config::AppState;

// GET /
pub async fn index(State(app_state): State<AppState>) -> impl IntoResponse {
    Json(json!({ "status": 202, "app": app_state.config.app_name }))
}
