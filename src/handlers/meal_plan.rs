// src/handlers/meal_plan.rs

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::{error::AppError, response::ApiResponse},
    config::AppState,
    handlers::branch::{ListParams, SearchParams},
    middleware::extract::{EntityId, JsonBody, QueryParams},
    models::meal_plan::{check_schedule, MealPlan, MealPlanChanges, NewMealPlan},
};

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateMealPlanPayload {
    #[validate(length(min = 3, message = "meal_plan_name must be at least 3 characters"))]
    #[schema(example = "Weekend Brunch")]
    pub meal_plan_name: String,

    #[validate(range(min = 1, message = "max_capacity must be at least 1"))]
    #[schema(example = 20)]
    pub max_capacity: i32,

    #[validate(range(min = 1, message = "price must be at least 1"))]
    #[schema(example = 150000)]
    pub price: i64,

    #[validate(length(min = 1, message = "day is required"))]
    #[schema(example = "Saturday")]
    pub day: String,

    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateMealPlanPayload {
    #[validate(length(min = 3, message = "meal_plan_name must be at least 3 characters"))]
    pub meal_plan_name: Option<String>,

    #[validate(range(min = 1, message = "max_capacity must be at least 1"))]
    pub max_capacity: Option<i32>,

    #[validate(range(min = 1, message = "price must be at least 1"))]
    pub price: Option<i64>,

    #[validate(length(min = 1, message = "day is required"))]
    pub day: Option<String>,

    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

impl CreateMealPlanPayload {
    fn check(&self) -> Result<(), AppError> {
        self.validate()?;
        check_schedule(self.start_time, self.end_time)?;
        Ok(())
    }
}

impl UpdateMealPlanPayload {
    // Times given on their own are checked against the stored plan by the service.
    fn check(&self) -> Result<(), AppError> {
        self.validate()?;
        check_schedule(self.start_time, self.end_time)?;
        Ok(())
    }
}

// GET /api/mealplans
#[utoipa::path(
    get,
    path = "/api/mealplans",
    tag = "Meal Plans",
    params(ListParams),
    responses(
        (status = 200, description = "Fetched data successfully", body = Vec<MealPlan>),
        (status = 400, description = "Unknown order column")
    )
)]
pub async fn fetch(
    State(app_state): State<AppState>,
    QueryParams(params): QueryParams<ListParams>,
) -> Result<impl IntoResponse, AppError> {
    let plans = app_state
        .meal_plan_service
        .fetch(params.limit, params.page, params.order.as_deref())
        .await?;

    Ok(ApiResponse::ok(StatusCode::OK, plans, "Fetched data successfully"))
}

// GET /api/mealplans/{id}
#[utoipa::path(
    get,
    path = "/api/mealplans/{id}",
    tag = "Meal Plans",
    params(("id" = Uuid, Path, description = "Meal plan id")),
    responses(
        (status = 200, description = "Fetched data by id", body = MealPlan),
        (status = 400, description = "Malformed id"),
        (status = 404, description = "No such meal plan")
    )
)]
pub async fn get_by_id(
    State(app_state): State<AppState>,
    EntityId(id): EntityId,
) -> Result<impl IntoResponse, AppError> {
    let plan = app_state.meal_plan_service.get_by_id(id).await?;
    Ok(ApiResponse::ok(StatusCode::OK, plan, "Fetched data by id"))
}

// GET /api/mealplans/meal/{name}
#[utoipa::path(
    get,
    path = "/api/mealplans/meal/{name}",
    tag = "Meal Plans",
    params(("name" = String, Path, description = "Exact meal plan name, oldest match wins")),
    responses(
        (status = 200, description = "Fetched data by name", body = MealPlan),
        (status = 404, description = "No such meal plan")
    )
)]
pub async fn get_by_name(
    State(app_state): State<AppState>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let plan = app_state.meal_plan_service.get_by_name(&name).await?;
    Ok(ApiResponse::ok(StatusCode::OK, plan, "Fetched data by name"))
}

// POST /api/mealplans
#[utoipa::path(
    post,
    path = "/api/mealplans",
    tag = "Meal Plans",
    request_body = CreateMealPlanPayload,
    responses(
        (status = 201, description = "Plan created successfully", body = MealPlan),
        (status = 400, description = "Validation invalid"),
        (status = 422, description = "Malformed body")
    )
)]
pub async fn store(
    State(app_state): State<AppState>,
    JsonBody(payload): JsonBody<CreateMealPlanPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.check()?;

    let new_plan = NewMealPlan {
        meal_plan_name: payload.meal_plan_name,
        max_capacity: payload.max_capacity,
        price: payload.price,
        day: payload.day,
        start_time: payload.start_time,
        end_time: payload.end_time,
    };
    let plan = app_state.meal_plan_service.store(new_plan).await?;

    Ok(ApiResponse::ok(StatusCode::CREATED, plan, "Plan created successfully"))
}

// PUT /api/update/mealplans/{id}
#[utoipa::path(
    put,
    path = "/api/update/mealplans/{id}",
    tag = "Meal Plans",
    params(("id" = Uuid, Path, description = "Meal plan id")),
    request_body = UpdateMealPlanPayload,
    responses(
        (status = 200, description = "Plan updated successfully", body = MealPlan),
        (status = 400, description = "Malformed id or validation invalid"),
        (status = 404, description = "No such meal plan"),
        (status = 422, description = "Malformed body")
    )
)]
pub async fn update(
    State(app_state): State<AppState>,
    EntityId(id): EntityId,
    JsonBody(payload): JsonBody<UpdateMealPlanPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.check()?;

    let changes = MealPlanChanges {
        meal_plan_name: payload.meal_plan_name,
        max_capacity: payload.max_capacity,
        price: payload.price,
        day: payload.day,
        start_time: payload.start_time,
        end_time: payload.end_time,
    };
    let plan = app_state.meal_plan_service.update(id, changes).await?;

    Ok(ApiResponse::ok(StatusCode::OK, plan, "Plan updated successfully"))
}

// DELETE /api/delete/mealplans/{id}
#[utoipa::path(
    delete,
    path = "/api/delete/mealplans/{id}",
    tag = "Meal Plans",
    params(("id" = Uuid, Path, description = "Meal plan id")),
    responses(
        (status = 200, description = "Plan deleted successfully"),
        (status = 400, description = "Malformed id"),
        (status = 404, description = "No such meal plan")
    )
)]
pub async fn delete(
    State(app_state): State<AppState>,
    EntityId(id): EntityId,
) -> Result<impl IntoResponse, AppError> {
    app_state.meal_plan_service.delete(id).await?;
    Ok(ApiResponse::done(StatusCode::OK, "Plan deleted successfully"))
}

// POST /api/search/mealplans
#[utoipa::path(
    post,
    path = "/api/search/mealplans",
    tag = "Meal Plans",
    params(SearchParams),
    responses(
        (status = 200, description = "Filtered data successfully", body = Vec<MealPlan>),
        (status = 400, description = "Column or order not allowed")
    )
)]
pub async fn search(
    State(app_state): State<AppState>,
    QueryParams(params): QueryParams<SearchParams>,
) -> Result<impl IntoResponse, AppError> {
    let plans = app_state
        .meal_plan_service
        .search(params.column.as_deref(), params.q.as_deref(), params.order.as_deref())
        .await?;

    Ok(ApiResponse::ok(StatusCode::OK, plans, "Filtered data successfully"))
}
