// src/models/meal_plan.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{ValidationError, ValidationErrors};

use crate::common::query::{ColumnSet, Direction, OrderBy};
use crate::models::branch::BranchSummary;

// ---
// 1. Meal plan row (no associations)
// ---
// This is what a branch lists under `meal_plans`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct MealPlanSummary {
    pub id: Uuid,
    #[schema(example = "Weekend Brunch")]
    pub meal_plan_name: String,
    #[schema(example = 20)]
    pub max_capacity: i32,
    // Minor currency units
    #[schema(example = 150000)]
    pub price: i64,
    #[schema(example = "Saturday")]
    pub day: String,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

// ---
// 2. Meal plan with the branches offering it
// ---
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct MealPlan {
    pub id: Uuid,
    pub meal_plan_name: String,
    pub max_capacity: i32,
    pub price: i64,
    pub day: String,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub branches: Vec<BranchSummary>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl MealPlan {
    pub fn assemble(summary: MealPlanSummary, branches: Vec<BranchSummary>) -> Self {
        Self {
            id: summary.id,
            meal_plan_name: summary.meal_plan_name,
            max_capacity: summary.max_capacity,
            price: summary.price,
            day: summary.day,
            start_time: summary.start_time,
            end_time: summary.end_time,
            branches,
            created_at: summary.created_at,
            updated_at: summary.updated_at,
            deleted_at: summary.deleted_at,
        }
    }

    pub fn summary(&self) -> MealPlanSummary {
        MealPlanSummary {
            id: self.id,
            meal_plan_name: self.meal_plan_name.clone(),
            max_capacity: self.max_capacity,
            price: self.price,
            day: self.day.clone(),
            start_time: self.start_time,
            end_time: self.end_time,
            created_at: self.created_at,
            updated_at: self.updated_at,
            deleted_at: self.deleted_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewMealPlan {
    pub meal_plan_name: String,
    pub max_capacity: i32,
    pub price: i64,
    pub day: String,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MealPlanChanges {
    pub meal_plan_name: Option<String>,
    pub max_capacity: Option<i32>,
    pub price: Option<i64>,
    pub day: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

/// A plan cannot end before it starts. Open ends are not compared.
pub fn check_schedule(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Result<(), ValidationErrors> {
    match (start, end) {
        (Some(start), Some(end)) if end < start => {
            let mut err = ValidationError::new("schedule");
            err.message = Some("end_time must not be before start_time".into());

            let mut errors = ValidationErrors::new();
            errors.add("end_time", err);
            Err(errors)
        }
        _ => Ok(()),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MealPlanColumn {
    MealPlanName,
    MaxCapacity,
    Price,
    Day,
    StartTime,
    EndTime,
    CreatedAt,
    UpdatedAt,
}

impl ColumnSet for MealPlanColumn {
    const ALL: &'static [Self] = &[
        MealPlanColumn::MealPlanName,
        MealPlanColumn::MaxCapacity,
        MealPlanColumn::Price,
        MealPlanColumn::Day,
        MealPlanColumn::StartTime,
        MealPlanColumn::EndTime,
        MealPlanColumn::CreatedAt,
        MealPlanColumn::UpdatedAt,
    ];

    fn name(self) -> &'static str {
        match self {
            MealPlanColumn::MealPlanName => "meal_plan_name",
            MealPlanColumn::MaxCapacity => "max_capacity",
            MealPlanColumn::Price => "price",
            MealPlanColumn::Day => "day",
            MealPlanColumn::StartTime => "start_time",
            MealPlanColumn::EndTime => "end_time",
            MealPlanColumn::CreatedAt => "created_at",
            MealPlanColumn::UpdatedAt => "updated_at",
        }
    }

    fn sort_expr(self) -> &'static str {
        match self {
            MealPlanColumn::MealPlanName => "meal_plans.meal_plan_name",
            MealPlanColumn::MaxCapacity => "meal_plans.max_capacity",
            MealPlanColumn::Price => "meal_plans.price",
            MealPlanColumn::Day => "meal_plans.day",
            MealPlanColumn::StartTime => "meal_plans.start_time",
            MealPlanColumn::EndTime => "meal_plans.end_time",
            MealPlanColumn::CreatedAt => "meal_plans.created_at",
            MealPlanColumn::UpdatedAt => "meal_plans.updated_at",
        }
    }

    fn search_expr(self) -> Option<&'static str> {
        match self {
            MealPlanColumn::MealPlanName => Some("meal_plans.meal_plan_name"),
            MealPlanColumn::Day => Some("meal_plans.day"),
            // Numbers are matched on their text form
            MealPlanColumn::Price => Some("meal_plans.price::text"),
            MealPlanColumn::MaxCapacity => Some("meal_plans.max_capacity::text"),
            _ => None,
        }
    }
}

impl MealPlanColumn {
    pub fn default_order() -> OrderBy<Self> {
        OrderBy::new(MealPlanColumn::CreatedAt, Direction::Desc)
    }
}
