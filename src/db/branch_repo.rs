// src/db/branch_repo.rs

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::{
    common::{
        error::{map_write_error, AppError},
        geo::{Coordinates, EARTH_RADIUS_MILES},
        query::{OrderBy, PageRequest, SearchFilter},
    },
    models::{
        branch::{Branch, BranchChanges, BranchColumn, BranchLocation, BranchMealPlan, BranchSummary, NewBranch},
        meal_plan::MealPlanSummary,
    },
};

/// Everything the branch usecases need from storage.
#[async_trait]
pub trait BranchRepository: Send + Sync {
    async fn fetch(&self, page: PageRequest, order: OrderBy<BranchColumn>) -> Result<Vec<Branch>, AppError>;

    async fn get_by_id(&self, id: Uuid) -> Result<Branch, AppError>;

    async fn get_by_name(&self, name: &str) -> Result<Branch, AppError>;

    /// Every location with its distance from `origin`, nearest first.
    async fn find_nearest_location(&self, origin: Coordinates) -> Result<Vec<BranchLocation>, AppError>;

    async fn store(&self, branch: NewBranch) -> Result<Branch, AppError>;

    async fn store_meal_plan(&self, link: BranchMealPlan) -> Result<(), AppError>;

    async fn update(&self, id: Uuid, changes: BranchChanges) -> Result<Branch, AppError>;

    async fn delete(&self, id: Uuid) -> Result<(), AppError>;

    async fn search(
        &self,
        filter: &SearchFilter<BranchColumn>,
        order: OrderBy<BranchColumn>,
    ) -> Result<Vec<Branch>, AppError>;
}

const BRANCH_COLUMNS: &str = "branches.id, branches.branch_name, branches.opening_hours, \
     branches.created_at, branches.updated_at, branches.deleted_at";

#[derive(FromRow)]
struct LinkedMealPlan {
    branch_id: Uuid,
    #[sqlx(flatten)]
    plan: MealPlanSummary,
}

#[derive(Clone)]
pub struct PgBranchRepository {
    pool: PgPool,
}

impl PgBranchRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // ---
    // Eager loading: one query per association for the whole batch of rows.
    // ---
    async fn load_associations(&self, rows: Vec<BranchSummary>) -> Result<Vec<Branch>, AppError> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<Uuid> = rows.iter().map(|b| b.id).collect();

        let locations = sqlx::query_as::<_, BranchLocation>(
            "SELECT id, branch_id, latitude, longitude FROM branch_locations WHERE branch_id = ANY($1)",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let linked = sqlx::query_as::<_, LinkedMealPlan>(
            r#"
            SELECT bmp.branch_id,
                   mp.id, mp.meal_plan_name, mp.max_capacity, mp.price, mp.day,
                   mp.start_time, mp.end_time, mp.created_at, mp.updated_at, mp.deleted_at
            FROM branch_meal_plans bmp
            INNER JOIN meal_plans mp ON mp.id = bmp.meal_plan_id
            WHERE bmp.branch_id = ANY($1)
            ORDER BY mp.created_at ASC
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let mut locations_by_branch: HashMap<Uuid, BranchLocation> =
            locations.into_iter().map(|l| (l.branch_id, l)).collect();

        let mut plans_by_branch: HashMap<Uuid, Vec<MealPlanSummary>> = HashMap::new();
        for row in linked {
            plans_by_branch.entry(row.branch_id).or_default().push(row.plan);
        }

        Ok(rows
            .into_iter()
            .map(|summary| {
                let location = locations_by_branch.remove(&summary.id);
                let plans = plans_by_branch.remove(&summary.id).unwrap_or_default();
                Branch::assemble(summary, location, plans)
            })
            .collect())
    }

    async fn load_one(&self, summary: Option<BranchSummary>, key: impl ToString) -> Result<Branch, AppError> {
        let summary = summary.ok_or_else(|| AppError::not_found("branch", key))?;
        let mut loaded = self.load_associations(vec![summary]).await?;
        loaded.pop().ok_or_else(|| AppError::InternalServerError(anyhow::anyhow!("branch vanished while loading")))
    }
}

#[async_trait]
impl BranchRepository for PgBranchRepository {
    async fn fetch(&self, page: PageRequest, order: OrderBy<BranchColumn>) -> Result<Vec<Branch>, AppError> {
        let mut query = QueryBuilder::<Postgres>::new(format!("SELECT {BRANCH_COLUMNS} FROM branches ORDER BY "));
        query
            .push(order.sql())
            .push(", branches.id LIMIT ")
            .push_bind(page.limit)
            .push(" OFFSET ")
            .push_bind(page.offset());

        let rows = query.build_query_as::<BranchSummary>().fetch_all(&self.pool).await?;
        self.load_associations(rows).await
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Branch, AppError> {
        let row = sqlx::query_as::<_, BranchSummary>(&format!(
            "SELECT {BRANCH_COLUMNS} FROM branches WHERE branches.id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        self.load_one(row, id).await
    }

    async fn get_by_name(&self, name: &str) -> Result<Branch, AppError> {
        let row = sqlx::query_as::<_, BranchSummary>(&format!(
            "SELECT {BRANCH_COLUMNS} FROM branches WHERE branches.branch_name = $1"
        ))
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        self.load_one(row, name).await
    }

    async fn find_nearest_location(&self, origin: Coordinates) -> Result<Vec<BranchLocation>, AppError> {
        // LEAST/GREATEST keep the acos argument inside [-1, 1] when rounding overshoots.
        let locations = sqlx::query_as::<_, BranchLocation>(
            r#"
            SELECT id, branch_id, latitude, longitude,
                   $3 * acos(LEAST(1.0, GREATEST(-1.0,
                       cos(radians($1)) * cos(radians(latitude)) * cos(radians(longitude) - radians($2))
                       + sin(radians($1)) * sin(radians(latitude))
                   ))) AS distance
            FROM branch_locations
            ORDER BY distance ASC, branch_id ASC
            "#,
        )
        .bind(origin.latitude)
        .bind(origin.longitude)
        .bind(EARTH_RADIUS_MILES)
        .fetch_all(&self.pool)
        .await?;

        Ok(locations)
    }

    async fn store(&self, branch: NewBranch) -> Result<Branch, AppError> {
        let mut tx = self.pool.begin().await?;

        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM branches WHERE branch_name = $1)")
            .bind(&branch.branch_name)
            .fetch_one(&mut *tx)
            .await?;
        if exists {
            return Err(branch_exists(&branch.branch_name));
        }

        let id: Uuid = sqlx::query_scalar(
            "INSERT INTO branches (branch_name, opening_hours) VALUES ($1, $2) RETURNING id",
        )
        .bind(&branch.branch_name)
        .bind(branch.opening_hours)
        .fetch_one(&mut *tx)
        .await
        // A concurrent insert can still win the race between the check and the insert.
        .map_err(|e| unique_or(e, || branch_exists(&branch.branch_name)))?;

        if let Some(location) = branch.location {
            sqlx::query("INSERT INTO branch_locations (branch_id, latitude, longitude) VALUES ($1, $2, $3)")
                .bind(id)
                .bind(location.latitude)
                .bind(location.longitude)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        tracing::info!(branch_id = %id, "Branch created");

        self.get_by_id(id).await
    }

    async fn store_meal_plan(&self, link: BranchMealPlan) -> Result<(), AppError> {
        sqlx::query("INSERT INTO branch_meal_plans (branch_id, meal_plan_id) VALUES ($1, $2)")
            .bind(link.branch_id)
            .bind(link.meal_plan_id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                map_write_error(
                    e,
                    || AppError::Conflict(format!(
                        "meal plan '{}' is already offered by branch '{}'",
                        link.meal_plan_id, link.branch_id
                    )),
                    || AppError::not_found("branch or meal plan", format!("{}/{}", link.branch_id, link.meal_plan_id)),
                )
            })?;

        Ok(())
    }

    async fn update(&self, id: Uuid, changes: BranchChanges) -> Result<Branch, AppError> {
        let mut tx = self.pool.begin().await?;

        let updated: Option<Uuid> = sqlx::query_scalar(
            r#"
            UPDATE branches
            SET branch_name = COALESCE($2, branch_name),
                opening_hours = COALESCE($3, opening_hours),
                updated_at = NOW()
            WHERE id = $1
            RETURNING id
            "#,
        )
        .bind(id)
        .bind(changes.branch_name.as_deref())
        .bind(changes.opening_hours)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| unique_or(e, || branch_exists(changes.branch_name.as_deref().unwrap_or_default())))?;

        if updated.is_none() {
            return Err(AppError::not_found("branch", id));
        }

        if let Some(location) = changes.location {
            sqlx::query(
                r#"
                INSERT INTO branch_locations (branch_id, latitude, longitude)
                VALUES ($1, $2, $3)
                ON CONFLICT (branch_id)
                DO UPDATE SET latitude = EXCLUDED.latitude, longitude = EXCLUDED.longitude
                "#,
            )
            .bind(id)
            .bind(location.latitude)
            .bind(location.longitude)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        self.get_by_id(id).await
    }

    async fn delete(&self, id: Uuid) -> Result<(), AppError> {
        // Location and join rows go with it (ON DELETE CASCADE).
        let result = sqlx::query("DELETE FROM branches WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("branch", id));
        }
        Ok(())
    }

    async fn search(
        &self,
        filter: &SearchFilter<BranchColumn>,
        order: OrderBy<BranchColumn>,
    ) -> Result<Vec<Branch>, AppError> {
        let mut query = QueryBuilder::<Postgres>::new(format!("SELECT {BRANCH_COLUMNS} FROM branches WHERE "));
        query
            .push(filter.search_expr())
            .push(" ILIKE ")
            .push_bind(filter.like_pattern())
            .push(" ORDER BY ")
            .push(order.sql())
            .push(", branches.id");

        let rows = query.build_query_as::<BranchSummary>().fetch_all(&self.pool).await?;
        self.load_associations(rows).await
    }
}

fn unique_or(e: sqlx::Error, conflict: impl FnOnce() -> AppError) -> AppError {
    if let sqlx::Error::Database(db_err) = &e {
        if db_err.is_unique_violation() {
            return conflict();
        }
    }
    e.into()
}

pub(crate) fn branch_exists(name: &str) -> AppError {
    AppError::Conflict(format!("branch '{name}' already exists"))
}
