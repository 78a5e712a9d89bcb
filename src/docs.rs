// src/docs.rs

use utoipa::OpenApi;

use crate::common::geo::Coordinates;
use crate::handlers;
use crate::models;

#[derive(OpenApi)]
#[openapi(
    info(title = "fatbellies", description = "Restaurant branches, their locations and meal plans"),
    paths(
        // --- Branches ---
        handlers::branch::fetch,
        handlers::branch::get_by_id,
        handlers::branch::get_by_name,
        handlers::branch::find_nearest_location,
        handlers::branch::store,
        handlers::branch::store_meal_plan,
        handlers::branch::update,
        handlers::branch::delete,
        handlers::branch::search,

        // --- Meal plans ---
        handlers::meal_plan::fetch,
        handlers::meal_plan::get_by_id,
        handlers::meal_plan::get_by_name,
        handlers::meal_plan::store,
        handlers::meal_plan::update,
        handlers::meal_plan::delete,
        handlers::meal_plan::search,
    ),
    components(
        schemas(
            Coordinates,

            // --- Branches ---
            models::branch::Branch,
            models::branch::BranchSummary,
            models::branch::BranchLocation,
            models::branch::BranchMealPlan,

            // --- Meal plans ---
            models::meal_plan::MealPlan,
            models::meal_plan::MealPlanSummary,

            // --- Payloads ---
            handlers::branch::LocationPayload,
            handlers::branch::CreateBranchPayload,
            handlers::branch::UpdateBranchPayload,
            handlers::branch::StoreBranchMealPlanPayload,
            handlers::meal_plan::CreateMealPlanPayload,
            handlers::meal_plan::UpdateMealPlanPayload,
        )
    ),
    tags(
        (name = "Branches", description = "Branches, their location and the meal plans they offer"),
        (name = "Meal Plans", description = "Meal plans and the branches offering them")
    )
)]
pub struct ApiDoc;
