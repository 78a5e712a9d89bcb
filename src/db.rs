pub mod branch_repo;
pub use branch_repo::{BranchRepository, PgBranchRepository};
pub mod meal_plan_repo;
pub use meal_plan_repo::{MealPlanRepository, PgMealPlanRepository};
pub mod memory_repo;
pub use memory_repo::MemoryRepository;

use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::config::Config;

/// Opens the shared connection pool. Built once at startup and handed to
/// every repository.
pub async fn connect(config: &Config) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .acquire_timeout(config.db_acquire_timeout)
        .connect(&config.database_url)
        .await?;

    tracing::info!("Database connection established");
    Ok(pool)
}
