// src/db/memory_repo.rs
//
// Both repository contracts over plain maps. Used by the test suites and for
// running the API without a database; it follows the same rules as the
// Postgres tables (unique branch names, one location per branch, cascading
// deletes of join rows).

use std::{
    cmp::Ordering,
    collections::{BTreeSet, HashMap},
    sync::Arc,
};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    common::{
        error::AppError,
        geo::Coordinates,
        query::{Direction, OrderBy, PageRequest, SearchFilter},
    },
    db::{branch_repo::branch_exists, BranchRepository, MealPlanRepository},
    models::{
        branch::{Branch, BranchChanges, BranchColumn, BranchLocation, BranchMealPlan, BranchSummary, NewBranch},
        meal_plan::{MealPlan, MealPlanChanges, MealPlanColumn, MealPlanSummary, NewMealPlan},
    },
};

#[derive(Default)]
struct MemoryState {
    branches: HashMap<Uuid, BranchSummary>,
    // keyed by branch id: at most one location per branch
    locations: HashMap<Uuid, BranchLocation>,
    meal_plans: HashMap<Uuid, MealPlanSummary>,
    links: BTreeSet<(Uuid, Uuid)>,
}

impl MemoryState {
    fn branch(&self, summary: &BranchSummary) -> Branch {
        let mut plans: Vec<MealPlanSummary> = self
            .links
            .iter()
            .filter(|(branch_id, _)| *branch_id == summary.id)
            .filter_map(|(_, plan_id)| self.meal_plans.get(plan_id).cloned())
            .collect();
        plans.sort_by_key(|p| p.created_at);

        Branch::assemble(summary.clone(), self.locations.get(&summary.id).cloned(), plans)
    }

    fn meal_plan(&self, summary: &MealPlanSummary) -> MealPlan {
        let mut branches: Vec<BranchSummary> = self
            .links
            .iter()
            .filter(|(_, plan_id)| *plan_id == summary.id)
            .filter_map(|(branch_id, _)| self.branches.get(branch_id).cloned())
            .collect();
        branches.sort_by_key(|b| b.created_at);

        MealPlan::assemble(summary.clone(), branches)
    }

    fn name_taken(&self, name: &str, except: Option<Uuid>) -> bool {
        self.branches.values().any(|b| b.branch_name == name && Some(b.id) != except)
    }

    fn place_location(&mut self, branch_id: Uuid, at: Coordinates) {
        let id = self.locations.get(&branch_id).map(|l| l.id).unwrap_or_else(Uuid::new_v4);
        self.locations.insert(
            branch_id,
            BranchLocation {
                id,
                branch_id,
                latitude: at.latitude,
                longitude: at.longitude,
                distance: None,
            },
        );
    }
}

#[derive(Clone, Default)]
pub struct MemoryRepository {
    state: Arc<RwLock<MemoryState>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

// ---
// Ordering helpers mirroring the ORDER BY expressions (ties broken by id)
// ---
fn directed(ordering: Ordering, direction: Direction) -> Ordering {
    match direction {
        Direction::Asc => ordering,
        Direction::Desc => ordering.reverse(),
    }
}

fn compare_branches(a: &BranchSummary, b: &BranchSummary, order: OrderBy<BranchColumn>) -> Ordering {
    let by_column = match order.column {
        BranchColumn::BranchName => a.branch_name.cmp(&b.branch_name),
        BranchColumn::OpeningHours => a.opening_hours.cmp(&b.opening_hours),
        BranchColumn::CreatedAt => a.created_at.cmp(&b.created_at),
        BranchColumn::UpdatedAt => a.updated_at.cmp(&b.updated_at),
    };
    directed(by_column, order.direction).then_with(|| a.id.cmp(&b.id))
}

fn compare_meal_plans(a: &MealPlanSummary, b: &MealPlanSummary, order: OrderBy<MealPlanColumn>) -> Ordering {
    let by_column = match order.column {
        MealPlanColumn::MealPlanName => a.meal_plan_name.cmp(&b.meal_plan_name),
        MealPlanColumn::MaxCapacity => a.max_capacity.cmp(&b.max_capacity),
        MealPlanColumn::Price => a.price.cmp(&b.price),
        MealPlanColumn::Day => a.day.cmp(&b.day),
        MealPlanColumn::StartTime => a.start_time.cmp(&b.start_time),
        MealPlanColumn::EndTime => a.end_time.cmp(&b.end_time),
        MealPlanColumn::CreatedAt => a.created_at.cmp(&b.created_at),
        MealPlanColumn::UpdatedAt => a.updated_at.cmp(&b.updated_at),
    };
    directed(by_column, order.direction).then_with(|| a.id.cmp(&b.id))
}

fn branch_text(b: &BranchSummary, column: BranchColumn) -> String {
    match column {
        BranchColumn::BranchName => b.branch_name.clone(),
        BranchColumn::OpeningHours => b.opening_hours.to_string(),
        BranchColumn::CreatedAt => b.created_at.to_rfc3339(),
        BranchColumn::UpdatedAt => b.updated_at.to_rfc3339(),
    }
}

fn meal_plan_text(p: &MealPlanSummary, column: MealPlanColumn) -> String {
    match column {
        MealPlanColumn::MealPlanName => p.meal_plan_name.clone(),
        MealPlanColumn::MaxCapacity => p.max_capacity.to_string(),
        MealPlanColumn::Price => p.price.to_string(),
        MealPlanColumn::Day => p.day.clone(),
        MealPlanColumn::StartTime => p.start_time.map(|t| t.to_rfc3339()).unwrap_or_default(),
        MealPlanColumn::EndTime => p.end_time.map(|t| t.to_rfc3339()).unwrap_or_default(),
        MealPlanColumn::CreatedAt => p.created_at.to_rfc3339(),
        MealPlanColumn::UpdatedAt => p.updated_at.to_rfc3339(),
    }
}

fn page_of<T>(items: Vec<T>, page: PageRequest) -> Vec<T> {
    items
        .into_iter()
        .skip(page.offset() as usize)
        .take(page.limit as usize)
        .collect()
}

#[async_trait]
impl BranchRepository for MemoryRepository {
    async fn fetch(&self, page: PageRequest, order: OrderBy<BranchColumn>) -> Result<Vec<Branch>, AppError> {
        let state = self.state.read().await;
        let mut rows: Vec<&BranchSummary> = state.branches.values().collect();
        rows.sort_by(|a, b| compare_branches(a, b, order));

        Ok(page_of(rows, page).into_iter().map(|s| state.branch(s)).collect())
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Branch, AppError> {
        let state = self.state.read().await;
        state
            .branches
            .get(&id)
            .map(|s| state.branch(s))
            .ok_or_else(|| AppError::not_found("branch", id))
    }

    async fn get_by_name(&self, name: &str) -> Result<Branch, AppError> {
        let state = self.state.read().await;
        state
            .branches
            .values()
            .find(|b| b.branch_name == name)
            .map(|s| state.branch(s))
            .ok_or_else(|| AppError::not_found("branch", name))
    }

    async fn find_nearest_location(&self, origin: Coordinates) -> Result<Vec<BranchLocation>, AppError> {
        let state = self.state.read().await;
        let mut located: Vec<BranchLocation> = state
            .locations
            .values()
            .map(|l| BranchLocation {
                distance: Some(origin.distance_miles(&l.coordinates())),
                ..l.clone()
            })
            .collect();

        located.sort_by(|a, b| {
            let (da, db) = (a.distance.unwrap_or_default(), b.distance.unwrap_or_default());
            da.total_cmp(&db).then_with(|| a.branch_id.cmp(&b.branch_id))
        });
        Ok(located)
    }

    async fn store(&self, branch: NewBranch) -> Result<Branch, AppError> {
        let mut state = self.state.write().await;
        if state.name_taken(&branch.branch_name, None) {
            return Err(branch_exists(&branch.branch_name));
        }

        let now = Utc::now();
        let summary = BranchSummary {
            id: Uuid::new_v4(),
            branch_name: branch.branch_name,
            opening_hours: branch.opening_hours,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        if let Some(at) = branch.location {
            state.place_location(summary.id, at);
        }
        state.branches.insert(summary.id, summary.clone());

        Ok(state.branch(&summary))
    }

    async fn store_meal_plan(&self, link: BranchMealPlan) -> Result<(), AppError> {
        let mut state = self.state.write().await;
        if !state.branches.contains_key(&link.branch_id) || !state.meal_plans.contains_key(&link.meal_plan_id) {
            return Err(AppError::not_found(
                "branch or meal plan",
                format!("{}/{}", link.branch_id, link.meal_plan_id),
            ));
        }
        if !state.links.insert((link.branch_id, link.meal_plan_id)) {
            return Err(AppError::Conflict(format!(
                "meal plan '{}' is already offered by branch '{}'",
                link.meal_plan_id, link.branch_id
            )));
        }
        Ok(())
    }

    async fn update(&self, id: Uuid, changes: BranchChanges) -> Result<Branch, AppError> {
        let mut state = self.state.write().await;
        if !state.branches.contains_key(&id) {
            return Err(AppError::not_found("branch", id));
        }
        if let Some(name) = changes.branch_name.as_deref() {
            if state.name_taken(name, Some(id)) {
                return Err(branch_exists(name));
            }
        }

        if let Some(at) = changes.location {
            state.place_location(id, at);
        }
        let summary = state
            .branches
            .get_mut(&id)
            .ok_or_else(|| AppError::not_found("branch", id))?;
        if let Some(name) = changes.branch_name {
            summary.branch_name = name;
        }
        if let Some(hours) = changes.opening_hours {
            summary.opening_hours = hours;
        }
        summary.updated_at = Utc::now();
        let summary = summary.clone();

        Ok(state.branch(&summary))
    }

    async fn delete(&self, id: Uuid) -> Result<(), AppError> {
        let mut state = self.state.write().await;
        if state.branches.remove(&id).is_none() {
            return Err(AppError::not_found("branch", id));
        }
        state.locations.remove(&id);
        state.links.retain(|(branch_id, _)| *branch_id != id);
        Ok(())
    }

    async fn search(
        &self,
        filter: &SearchFilter<BranchColumn>,
        order: OrderBy<BranchColumn>,
    ) -> Result<Vec<Branch>, AppError> {
        let state = self.state.read().await;
        let mut rows: Vec<&BranchSummary> = state
            .branches
            .values()
            .filter(|b| filter.matches(&branch_text(b, filter.column)))
            .collect();
        rows.sort_by(|a, b| compare_branches(a, b, order));

        Ok(rows.into_iter().map(|s| state.branch(s)).collect())
    }
}

#[async_trait]
impl MealPlanRepository for MemoryRepository {
    async fn fetch(&self, page: PageRequest, order: OrderBy<MealPlanColumn>) -> Result<Vec<MealPlan>, AppError> {
        let state = self.state.read().await;
        let mut rows: Vec<&MealPlanSummary> = state.meal_plans.values().collect();
        rows.sort_by(|a, b| compare_meal_plans(a, b, order));

        Ok(page_of(rows, page).into_iter().map(|s| state.meal_plan(s)).collect())
    }

    async fn get_by_id(&self, id: Uuid) -> Result<MealPlan, AppError> {
        let state = self.state.read().await;
        state
            .meal_plans
            .get(&id)
            .map(|s| state.meal_plan(s))
            .ok_or_else(|| AppError::not_found("meal plan", id))
    }

    async fn get_by_name(&self, name: &str) -> Result<MealPlan, AppError> {
        let state = self.state.read().await;
        state
            .meal_plans
            .values()
            .filter(|p| p.meal_plan_name == name)
            .min_by_key(|p| (p.created_at, p.id))
            .map(|s| state.meal_plan(s))
            .ok_or_else(|| AppError::not_found("meal plan", name))
    }

    async fn store(&self, plan: NewMealPlan) -> Result<MealPlan, AppError> {
        let mut state = self.state.write().await;
        let now = Utc::now();
        let summary = MealPlanSummary {
            id: Uuid::new_v4(),
            meal_plan_name: plan.meal_plan_name,
            max_capacity: plan.max_capacity,
            price: plan.price,
            day: plan.day,
            start_time: plan.start_time,
            end_time: plan.end_time,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        state.meal_plans.insert(summary.id, summary.clone());

        Ok(MealPlan::assemble(summary, Vec::new()))
    }

    async fn update(&self, id: Uuid, changes: MealPlanChanges) -> Result<MealPlan, AppError> {
        let mut state = self.state.write().await;
        let summary = state
            .meal_plans
            .get_mut(&id)
            .ok_or_else(|| AppError::not_found("meal plan", id))?;

        if let Some(name) = changes.meal_plan_name {
            summary.meal_plan_name = name;
        }
        if let Some(capacity) = changes.max_capacity {
            summary.max_capacity = capacity;
        }
        if let Some(price) = changes.price {
            summary.price = price;
        }
        if let Some(day) = changes.day {
            summary.day = day;
        }
        if changes.start_time.is_some() {
            summary.start_time = changes.start_time;
        }
        if changes.end_time.is_some() {
            summary.end_time = changes.end_time;
        }
        summary.updated_at = Utc::now();
        let summary = summary.clone();

        Ok(state.meal_plan(&summary))
    }

    async fn delete(&self, id: Uuid) -> Result<(), AppError> {
        let mut state = self.state.write().await;
        if state.meal_plans.remove(&id).is_none() {
            return Err(AppError::not_found("meal plan", id));
        }
        state.links.retain(|(_, plan_id)| *plan_id != id);
        Ok(())
    }

    async fn search(
        &self,
        filter: &SearchFilter<MealPlanColumn>,
        order: OrderBy<MealPlanColumn>,
    ) -> Result<Vec<MealPlan>, AppError> {
        let state = self.state.read().await;
        let mut rows: Vec<&MealPlanSummary> = state
            .meal_plans
            .values()
            .filter(|p| filter.matches(&meal_plan_text(p, filter.column)))
            .collect();
        rows.sort_by(|a, b| compare_meal_plans(a, b, order));

        Ok(rows.into_iter().map(|s| state.meal_plan(s)).collect())
    }
}
