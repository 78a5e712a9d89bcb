// src/db/meal_plan_repo.rs

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::{
    common::{
        error::AppError,
        query::{OrderBy, PageRequest, SearchFilter},
    },
    models::{
        branch::BranchSummary,
        meal_plan::{MealPlan, MealPlanChanges, MealPlanColumn, MealPlanSummary, NewMealPlan},
    },
};

#[async_trait]
pub trait MealPlanRepository: Send + Sync {
    async fn fetch(&self, page: PageRequest, order: OrderBy<MealPlanColumn>) -> Result<Vec<MealPlan>, AppError>;

    async fn get_by_id(&self, id: Uuid) -> Result<MealPlan, AppError>;

    async fn get_by_name(&self, name: &str) -> Result<MealPlan, AppError>;

    async fn store(&self, plan: NewMealPlan) -> Result<MealPlan, AppError>;

    async fn update(&self, id: Uuid, changes: MealPlanChanges) -> Result<MealPlan, AppError>;

    async fn delete(&self, id: Uuid) -> Result<(), AppError>;

    async fn search(
        &self,
        filter: &SearchFilter<MealPlanColumn>,
        order: OrderBy<MealPlanColumn>,
    ) -> Result<Vec<MealPlan>, AppError>;
}

const MEAL_PLAN_COLUMNS: &str = "meal_plans.id, meal_plans.meal_plan_name, meal_plans.max_capacity, \
     meal_plans.price, meal_plans.day, meal_plans.start_time, meal_plans.end_time, \
     meal_plans.created_at, meal_plans.updated_at, meal_plans.deleted_at";

#[derive(FromRow)]
struct LinkedBranch {
    meal_plan_id: Uuid,
    #[sqlx(flatten)]
    branch: BranchSummary,
}

#[derive(Clone)]
pub struct PgMealPlanRepository {
    pool: PgPool,
}

impl PgMealPlanRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn load_branches(&self, rows: Vec<MealPlanSummary>) -> Result<Vec<MealPlan>, AppError> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<Uuid> = rows.iter().map(|p| p.id).collect();

        let linked = sqlx::query_as::<_, LinkedBranch>(
            r#"
            SELECT bmp.meal_plan_id,
                   b.id, b.branch_name, b.opening_hours, b.created_at, b.updated_at, b.deleted_at
            FROM branch_meal_plans bmp
            INNER JOIN branches b ON b.id = bmp.branch_id
            WHERE bmp.meal_plan_id = ANY($1)
            ORDER BY b.created_at ASC
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let mut branches_by_plan: HashMap<Uuid, Vec<BranchSummary>> = HashMap::new();
        for row in linked {
            branches_by_plan.entry(row.meal_plan_id).or_default().push(row.branch);
        }

        Ok(rows
            .into_iter()
            .map(|summary| {
                let branches = branches_by_plan.remove(&summary.id).unwrap_or_default();
                MealPlan::assemble(summary, branches)
            })
            .collect())
    }

    async fn load_one(&self, summary: Option<MealPlanSummary>, key: impl ToString) -> Result<MealPlan, AppError> {
        let summary = summary.ok_or_else(|| AppError::not_found("meal plan", key))?;
        let mut loaded = self.load_branches(vec![summary]).await?;
        loaded
            .pop()
            .ok_or_else(|| AppError::InternalServerError(anyhow::anyhow!("meal plan vanished while loading")))
    }
}

#[async_trait]
impl MealPlanRepository for PgMealPlanRepository {
    async fn fetch(&self, page: PageRequest, order: OrderBy<MealPlanColumn>) -> Result<Vec<MealPlan>, AppError> {
        let mut query =
            QueryBuilder::<Postgres>::new(format!("SELECT {MEAL_PLAN_COLUMNS} FROM meal_plans ORDER BY "));
        query
            .push(order.sql())
            .push(", meal_plans.id LIMIT ")
            .push_bind(page.limit)
            .push(" OFFSET ")
            .push_bind(page.offset());

        let rows = query.build_query_as::<MealPlanSummary>().fetch_all(&self.pool).await?;
        self.load_branches(rows).await
    }

    async fn get_by_id(&self, id: Uuid) -> Result<MealPlan, AppError> {
        let row = sqlx::query_as::<_, MealPlanSummary>(&format!(
            "SELECT {MEAL_PLAN_COLUMNS} FROM meal_plans WHERE meal_plans.id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        self.load_one(row, id).await
    }

    async fn get_by_name(&self, name: &str) -> Result<MealPlan, AppError> {
        // Names are not unique for meal plans; the oldest match wins.
        let row = sqlx::query_as::<_, MealPlanSummary>(&format!(
            "SELECT {MEAL_PLAN_COLUMNS} FROM meal_plans WHERE meal_plans.meal_plan_name = $1 \
             ORDER BY meal_plans.created_at ASC LIMIT 1"
        ))
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        self.load_one(row, name).await
    }

    async fn store(&self, plan: NewMealPlan) -> Result<MealPlan, AppError> {
        let row = sqlx::query_as::<_, MealPlanSummary>(
            r#"
            INSERT INTO meal_plans (meal_plan_name, max_capacity, price, day, start_time, end_time)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, meal_plan_name, max_capacity, price, day, start_time, end_time,
                      created_at, updated_at, deleted_at
            "#,
        )
        .bind(&plan.meal_plan_name)
        .bind(plan.max_capacity)
        .bind(plan.price)
        .bind(&plan.day)
        .bind(plan.start_time)
        .bind(plan.end_time)
        .fetch_one(&self.pool)
        .await?;

        tracing::info!(meal_plan_id = %row.id, "Meal plan created");

        // Brand new: nothing links to it yet.
        Ok(MealPlan::assemble(row, Vec::new()))
    }

    async fn update(&self, id: Uuid, changes: MealPlanChanges) -> Result<MealPlan, AppError> {
        let row = sqlx::query_as::<_, MealPlanSummary>(
            r#"
            UPDATE meal_plans
            SET meal_plan_name = COALESCE($2, meal_plan_name),
                max_capacity = COALESCE($3, max_capacity),
                price = COALESCE($4, price),
                day = COALESCE($5, day),
                start_time = COALESCE($6, start_time),
                end_time = COALESCE($7, end_time),
                updated_at = NOW()
            WHERE id = $1
            RETURNING id, meal_plan_name, max_capacity, price, day, start_time, end_time,
                      created_at, updated_at, deleted_at
            "#,
        )
        .bind(id)
        .bind(changes.meal_plan_name.as_deref())
        .bind(changes.max_capacity)
        .bind(changes.price)
        .bind(changes.day.as_deref())
        .bind(changes.start_time)
        .bind(changes.end_time)
        .fetch_optional(&self.pool)
        .await?;

        self.load_one(row, id).await
    }

    async fn delete(&self, id: Uuid) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM meal_plans WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("meal plan", id));
        }
        Ok(())
    }

    async fn search(
        &self,
        filter: &SearchFilter<MealPlanColumn>,
        order: OrderBy<MealPlanColumn>,
    ) -> Result<Vec<MealPlan>, AppError> {
        let mut query =
            QueryBuilder::<Postgres>::new(format!("SELECT {MEAL_PLAN_COLUMNS} FROM meal_plans WHERE "));
        query
            .push(filter.search_expr())
            .push(" ILIKE ")
            .push_bind(filter.like_pattern())
            .push(" ORDER BY ")
            .push(order.sql())
            .push(", meal_plans.id");

        let rows = query.build_query_as::<MealPlanSummary>().fetch_all(&self.pool).await?;
        self.load_branches(rows).await
    }
}
