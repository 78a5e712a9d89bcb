// src/models/branch.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::common::{
    geo::Coordinates,
    query::{ColumnSet, Direction, OrderBy},
};
use crate::models::meal_plan::MealPlanSummary;

// ---
// 1. Branch row (no associations)
// ---
// This is also what a meal plan lists under `branches`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct BranchSummary {
    pub id: Uuid,
    #[schema(example = "Downtown")]
    pub branch_name: String,
    #[schema(example = 12)]
    pub opening_hours: i16,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    // Declared for soft delete, but deletes are hard deletes and never set it.
    pub deleted_at: Option<DateTime<Utc>>,
}

// ---
// 2. BranchLocation
// ---
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct BranchLocation {
    pub id: Uuid,
    pub branch_id: Uuid,
    #[schema(example = 40.7128)]
    pub latitude: f64,
    #[schema(example = json!(-74.006))]
    pub longitude: f64,

    // Only filled in by the nearest-location query, never persisted.
    #[sqlx(default)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance: Option<f64>,
}

impl BranchLocation {
    pub fn coordinates(&self) -> Coordinates {
        Coordinates { latitude: self.latitude, longitude: self.longitude }
    }
}

// ---
// 3. Branch with its associations loaded
// ---
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Branch {
    pub id: Uuid,
    pub branch_name: String,
    pub opening_hours: i16,
    pub locations: Option<BranchLocation>,
    pub meal_plans: Vec<MealPlanSummary>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Branch {
    pub fn assemble(
        summary: BranchSummary,
        locations: Option<BranchLocation>,
        meal_plans: Vec<MealPlanSummary>,
    ) -> Self {
        Self {
            id: summary.id,
            branch_name: summary.branch_name,
            opening_hours: summary.opening_hours,
            locations,
            meal_plans,
            created_at: summary.created_at,
            updated_at: summary.updated_at,
            deleted_at: summary.deleted_at,
        }
    }

    pub fn summary(&self) -> BranchSummary {
        BranchSummary {
            id: self.id,
            branch_name: self.branch_name.clone(),
            opening_hours: self.opening_hours,
            created_at: self.created_at,
            updated_at: self.updated_at,
            deleted_at: self.deleted_at,
        }
    }
}

// ---
// 4. Join row
// ---
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct BranchMealPlan {
    pub branch_id: Uuid,
    pub meal_plan_id: Uuid,
}

// ---
// Inputs handed to the repository (already validated)
// ---
#[derive(Debug, Clone, PartialEq)]
pub struct NewBranch {
    pub branch_name: String,
    pub opening_hours: i16,
    pub location: Option<Coordinates>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BranchChanges {
    pub branch_name: Option<String>,
    pub opening_hours: Option<i16>,
    pub location: Option<Coordinates>,
}

// ---
// Columns callers may order or search by
// ---
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchColumn {
    BranchName,
    OpeningHours,
    CreatedAt,
    UpdatedAt,
}

impl ColumnSet for BranchColumn {
    const ALL: &'static [Self] = &[
        BranchColumn::BranchName,
        BranchColumn::OpeningHours,
        BranchColumn::CreatedAt,
        BranchColumn::UpdatedAt,
    ];

    fn name(self) -> &'static str {
        match self {
            BranchColumn::BranchName => "branch_name",
            BranchColumn::OpeningHours => "opening_hours",
            BranchColumn::CreatedAt => "created_at",
            BranchColumn::UpdatedAt => "updated_at",
        }
    }

    fn sort_expr(self) -> &'static str {
        match self {
            BranchColumn::BranchName => "branches.branch_name",
            BranchColumn::OpeningHours => "branches.opening_hours",
            BranchColumn::CreatedAt => "branches.created_at",
            BranchColumn::UpdatedAt => "branches.updated_at",
        }
    }

    fn search_expr(self) -> Option<&'static str> {
        match self {
            BranchColumn::BranchName => Some("branches.branch_name"),
            BranchColumn::OpeningHours => Some("branches.opening_hours::text"),
            BranchColumn::CreatedAt | BranchColumn::UpdatedAt => None,
        }
    }
}

impl BranchColumn {
    pub fn default_order() -> OrderBy<Self> {
        OrderBy::new(BranchColumn::CreatedAt, Direction::Desc)
    }
}
