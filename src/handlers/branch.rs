// src/handlers/branch.rs

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::{error::AppError, geo::Coordinates, response::ApiResponse},
    config::AppState,
    middleware::extract::{EntityId, JsonBody, QueryParams},
    models::branch::{Branch, BranchChanges, BranchLocation, BranchMealPlan, NewBranch},
};

// ---
// Query strings
// ---
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListParams {
    /// Page size, 10 when missing or not positive
    #[param(example = 10)]
    pub limit: Option<i64>,
    /// 1-based page number
    #[param(example = 1)]
    pub page: Option<i64>,
    /// `<column> [asc|desc]`
    #[param(example = "created_at desc")]
    pub order: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct NearestParams {
    #[param(example = 40.7306)]
    pub lat: f64,
    pub long: f64,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SearchParams {
    #[param(example = "branch_name")]
    pub column: Option<String>,
    #[param(example = "down")]
    pub q: Option<String>,
    #[param(example = "branch_name asc")]
    pub order: Option<String>,
}

// ---
// Bodies
// ---
#[derive(Debug, Clone, Copy, Deserialize, Validate, ToSchema)]
pub struct LocationPayload {
    #[validate(range(min = -90.0, max = 90.0, message = "latitude must be between -90 and 90"))]
    #[schema(example = 40.7128)]
    pub latitude: f64,

    #[validate(range(min = -180.0, max = 180.0, message = "longitude must be between -180 and 180"))]
    pub longitude: f64,
}

impl LocationPayload {
    fn coordinates(self) -> Result<Coordinates, AppError> {
        Coordinates::new(self.latitude, self.longitude)
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateBranchPayload {
    #[validate(length(min = 3, message = "branch_name must be at least 3 characters"))]
    #[schema(example = "Downtown")]
    pub branch_name: String,

    #[validate(range(min = 1, max = 24, message = "opening_hours must be between 1 and 24"))]
    #[schema(example = 10)]
    pub opening_hours: i16,

    #[validate(nested)]
    pub locations: Option<LocationPayload>,
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateBranchPayload {
    #[validate(length(min = 3, message = "branch_name must be at least 3 characters"))]
    pub branch_name: Option<String>,

    #[validate(range(min = 1, max = 24, message = "opening_hours must be between 1 and 24"))]
    pub opening_hours: Option<i16>,

    #[validate(nested)]
    pub locations: Option<LocationPayload>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct StoreBranchMealPlanPayload {
    pub branch_id: Uuid,
    pub meal_plan_id: Uuid,
}

// GET /api/branches
#[utoipa::path(
    get,
    path = "/api/branches",
    tag = "Branches",
    params(ListParams),
    responses(
        (status = 200, description = "Fetched data successfully", body = Vec<Branch>),
        (status = 400, description = "Unknown order column")
    )
)]
pub async fn fetch(
    State(app_state): State<AppState>,
    QueryParams(params): QueryParams<ListParams>,
) -> Result<impl IntoResponse, AppError> {
    let branches = app_state
        .branch_service
        .fetch(params.limit, params.page, params.order.as_deref())
        .await?;

    Ok(ApiResponse::ok(StatusCode::OK, branches, "Fetched data successfully"))
}

// GET /api/branches/{id}
#[utoipa::path(
    get,
    path = "/api/branches/{id}",
    tag = "Branches",
    params(("id" = Uuid, Path, description = "Branch id")),
    responses(
        (status = 200, description = "Fetched data by id", body = Branch),
        (status = 400, description = "Malformed id"),
        (status = 404, description = "No such branch")
    )
)]
pub async fn get_by_id(
    State(app_state): State<AppState>,
    EntityId(id): EntityId,
) -> Result<impl IntoResponse, AppError> {
    let branch = app_state.branch_service.get_by_id(id).await?;
    Ok(ApiResponse::ok(StatusCode::OK, branch, "Fetched data by id"))
}

// GET /api/branches/branch/{name}
#[utoipa::path(
    get,
    path = "/api/branches/branch/{name}",
    tag = "Branches",
    params(("name" = String, Path, description = "Exact branch name")),
    responses(
        (status = 200, description = "Fetched data by name", body = Branch),
        (status = 404, description = "No such branch")
    )
)]
pub async fn get_by_name(
    State(app_state): State<AppState>,
    axum::extract::Path(name): axum::extract::Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let branch = app_state.branch_service.get_by_name(&name).await?;
    Ok(ApiResponse::ok(StatusCode::OK, branch, "Fetched data by name"))
}

// GET /api/nearest/branches
#[utoipa::path(
    get,
    path = "/api/nearest/branches",
    tag = "Branches",
    params(NearestParams),
    responses(
        (status = 200, description = "Locations nearest first, distance in miles", body = Vec<BranchLocation>),
        (status = 400, description = "Missing or out-of-range coordinates"),
        (status = 504, description = "Query exceeded its deadline")
    )
)]
pub async fn find_nearest_location(
    State(app_state): State<AppState>,
    QueryParams(params): QueryParams<NearestParams>,
) -> Result<impl IntoResponse, AppError> {
    let locations = app_state
        .branch_service
        .find_nearest_location(params.lat, params.long)
        .await?;

    Ok(ApiResponse::ok(StatusCode::OK, locations, "Fetched data successfully"))
}

// POST /api/branches
#[utoipa::path(
    post,
    path = "/api/branches",
    tag = "Branches",
    request_body = CreateBranchPayload,
    responses(
        (status = 201, description = "Branch created successfully", body = Branch),
        (status = 400, description = "Validation invalid"),
        (status = 409, description = "Branch name already taken"),
        (status = 422, description = "Malformed body")
    )
)]
pub async fn store(
    State(app_state): State<AppState>,
    JsonBody(payload): JsonBody<CreateBranchPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let new_branch = NewBranch {
        branch_name: payload.branch_name,
        opening_hours: payload.opening_hours,
        location: payload.locations.map(LocationPayload::coordinates).transpose()?,
    };
    let branch = app_state.branch_service.store(new_branch).await?;

    Ok(ApiResponse::ok(StatusCode::CREATED, branch, "Branch created successfully"))
}

// POST /api/branches/mealplans
#[utoipa::path(
    post,
    path = "/api/branches/mealplans",
    tag = "Branches",
    request_body = StoreBranchMealPlanPayload,
    responses(
        (status = 201, description = "Branch meal plan added successfully", body = BranchMealPlan),
        (status = 404, description = "Branch or meal plan does not exist"),
        (status = 409, description = "Already linked"),
        (status = 422, description = "Malformed body")
    )
)]
pub async fn store_meal_plan(
    State(app_state): State<AppState>,
    JsonBody(payload): JsonBody<StoreBranchMealPlanPayload>,
) -> Result<impl IntoResponse, AppError> {
    let link = BranchMealPlan {
        branch_id: payload.branch_id,
        meal_plan_id: payload.meal_plan_id,
    };
    app_state.branch_service.store_meal_plan(link).await?;

    Ok(ApiResponse::ok(StatusCode::CREATED, link, "Branch meal plan added successfully"))
}

// PUT /api/update/branches/{id}
#[utoipa::path(
    put,
    path = "/api/update/branches/{id}",
    tag = "Branches",
    params(("id" = Uuid, Path, description = "Branch id")),
    request_body = UpdateBranchPayload,
    responses(
        (status = 200, description = "Branch updated successfully", body = Branch),
        (status = 400, description = "Malformed id or validation invalid"),
        (status = 404, description = "No such branch"),
        (status = 409, description = "Branch name already taken"),
        (status = 422, description = "Malformed body")
    )
)]
pub async fn update(
    State(app_state): State<AppState>,
    EntityId(id): EntityId,
    JsonBody(payload): JsonBody<UpdateBranchPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let changes = BranchChanges {
        branch_name: payload.branch_name,
        opening_hours: payload.opening_hours,
        location: payload.locations.map(LocationPayload::coordinates).transpose()?,
    };
    let branch = app_state.branch_service.update(id, changes).await?;

    Ok(ApiResponse::ok(StatusCode::OK, branch, "Branch updated successfully"))
}

// DELETE /api/delete/branches/{id}
#[utoipa::path(
    delete,
    path = "/api/delete/branches/{id}",
    tag = "Branches",
    params(("id" = Uuid, Path, description = "Branch id")),
    responses(
        (status = 200, description = "Branch deleted successfully"),
        (status = 400, description = "Malformed id"),
        (status = 404, description = "No such branch")
    )
)]
pub async fn delete(
    State(app_state): State<AppState>,
    EntityId(id): EntityId,
) -> Result<impl IntoResponse, AppError> {
    app_state.branch_service.delete(id).await?;
    Ok(ApiResponse::done(StatusCode::OK, "Branch deleted successfully"))
}

// POST /api/search/branches
#[utoipa::path(
    post,
    path = "/api/search/branches",
    tag = "Branches",
    params(SearchParams),
    responses(
        (status = 200, description = "Filtered data successfully", body = Vec<Branch>),
        (status = 400, description = "Column or order not allowed")
    )
)]
pub async fn search(
    State(app_state): State<AppState>,
    QueryParams(params): QueryParams<SearchParams>,
) -> Result<impl IntoResponse, AppError> {
    let branches = app_state
        .branch_service
        .search(params.column.as_deref(), params.q.as_deref(), params.order.as_deref())
        .await?;

    Ok(ApiResponse::ok(StatusCode::OK, branches, "Filtered data successfully"))
}
