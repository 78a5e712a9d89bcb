// src/config.rs

use std::{env, str::FromStr, sync::Arc, time::Duration};

use anyhow::{anyhow, Context};
use sqlx::PgPool;

use crate::{
    common::cache::{Cache, InMemoryCache},
    db::{BranchRepository, MealPlanRepository, PgBranchRepository, PgMealPlanRepository},
    services::{BranchService, MealPlanService},
};

// ---
// Config: everything read from the environment (.env included)
// ---
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub app_name: String,
    pub bind_addr: String,
    pub database_url: String,
    pub db_max_connections: u32,
    pub db_acquire_timeout: Duration,
    pub cache_enabled: bool,
    pub cache_ttl: Duration,
    pub nearest_timeout: Duration,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app_name: "fatbellies".to_string(),
            bind_addr: "0.0.0.0:5000".to_string(),
            database_url: String::new(),
            db_max_connections: 10,
            db_acquire_timeout: Duration::from_secs(3),
            cache_enabled: false,
            cache_ttl: Duration::from_secs(300),
            nearest_timeout: Duration::from_millis(5000),
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key/value source; `from_env` passes the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let database_url = get("DATABASE_URL").ok_or_else(|| anyhow!("DATABASE_URL must be set"))?;

        Ok(Self {
            app_name: get("APP_NAME").unwrap_or(defaults.app_name),
            bind_addr: get("APP_ADDR").unwrap_or(defaults.bind_addr),
            database_url,
            db_max_connections: parse_or(&get, "DB_MAX_CONNECTIONS", defaults.db_max_connections)?,
            db_acquire_timeout: Duration::from_secs(parse_or(
                &get,
                "DB_ACQUIRE_TIMEOUT_SECS",
                defaults.db_acquire_timeout.as_secs(),
            )?),
            cache_enabled: parse_or(&get, "CACHE_ENABLED", defaults.cache_enabled)?,
            cache_ttl: Duration::from_secs(parse_or(&get, "CACHE_TTL_SECS", defaults.cache_ttl.as_secs())?),
            nearest_timeout: Duration::from_millis(parse_or(
                &get,
                "NEAREST_QUERY_TIMEOUT_MS",
                defaults.nearest_timeout.as_millis() as u64,
            )?),
            log_level: get("LOG_LEVEL").unwrap_or(defaults.log_level),
        })
    }
}

fn parse_or<T>(get: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match get(key) {
        Some(raw) => raw.trim().parse().with_context(|| format!("{key} has an invalid value '{raw}'")),
        None => Ok(default),
    }
}

// ---
// AppState: the dependency graph, built once and cloned into every handler
// ---
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub branch_service: BranchService,
    pub meal_plan_service: MealPlanService,
}

impl AppState {
    /// Wires the Postgres repositories around an already-migrated pool.
    pub fn with_postgres(config: Config, pool: PgPool) -> Self {
        let branch_repo = Arc::new(PgBranchRepository::new(pool.clone()));
        let meal_plan_repo = Arc::new(PgMealPlanRepository::new(pool));
        Self::from_parts(config, branch_repo, meal_plan_repo)
    }

    pub fn from_parts(
        config: Config,
        branch_repo: Arc<dyn BranchRepository>,
        meal_plan_repo: Arc<dyn MealPlanRepository>,
    ) -> Self {
        let cache: Option<Arc<dyn Cache>> = if config.cache_enabled {
            tracing::info!(ttl = ?config.cache_ttl, "In-memory cache enabled");
            Some(Arc::new(InMemoryCache::new(config.cache_ttl)))
        } else {
            None
        };

        let branch_service = BranchService::new(branch_repo, cache.clone(), config.nearest_timeout);
        let meal_plan_service = MealPlanService::new(meal_plan_repo, cache);

        Self {
            config: Arc::new(config),
            branch_service,
            meal_plan_service,
        }
    }
}
