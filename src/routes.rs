// src/routes.rs

use axum::{
    http::{header, Method, Uri},
    middleware as axum_middleware,
    routing::{delete, get, post, put},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    common::error::AppError,
    config::AppState,
    docs::ApiDoc,
    handlers,
    middleware::server_header::server_header,
};

pub fn build_router(app_state: AppState) -> Router {
    let branch_routes = Router::new()
        .route("/branches", get(handlers::branch::fetch).post(handlers::branch::store))
        .route("/branches/{id}", get(handlers::branch::get_by_id))
        .route("/branches/branch/{name}", get(handlers::branch::get_by_name))
        .route("/branches/mealplans", post(handlers::branch::store_meal_plan))
        .route("/nearest/branches", get(handlers::branch::find_nearest_location))
        .route("/update/branches/{id}", put(handlers::branch::update))
        .route("/delete/branches/{id}", delete(handlers::branch::delete))
        .route("/search/branches", post(handlers::branch::search));

    let meal_plan_routes = Router::new()
        .route("/mealplans", get(handlers::meal_plan::fetch).post(handlers::meal_plan::store))
        .route("/mealplans/{id}", get(handlers::meal_plan::get_by_id))
        .route("/mealplans/meal/{name}", get(handlers::meal_plan::get_by_name))
        .route("/update/mealplans/{id}", put(handlers::meal_plan::update))
        .route("/delete/mealplans/{id}", delete(handlers::meal_plan::delete))
        .route("/search/mealplans", post(handlers::meal_plan::search));

    let api_routes = branch_routes
        .merge(meal_plan_routes)
        .method_not_allowed_fallback(unsupported_method);

    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::PUT, Method::POST, Method::DELETE])
        .allow_headers([
            header::ORIGIN,
            header::CONTENT_TYPE,
            header::ACCEPT,
            header::HeaderName::from_static("x-requested-with"),
        ]);

    Router::new()
        .route("/", get(handlers::index))
        .route("/api/health", get(|| async { "OK" }))
        .nest("/api", api_routes)
        .merge(SwaggerUi::new("/api/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .method_not_allowed_fallback(unsupported_method)
        .fallback(unknown_route)
        .layer(cors)
        .layer(axum_middleware::from_fn_with_state(app_state.clone(), server_header))
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

async fn unknown_route(uri: Uri) -> AppError {
    AppError::not_found("route", uri.path())
}

async fn unsupported_method(method: Method, uri: Uri) -> AppError {
    AppError::MethodNotAllowed { method: method.to_string(), path: uri.path().to_string() }
}
