// src/services/meal_plan_service.rs

use std::sync::Arc;

use uuid::Uuid;

use crate::{
    common::{
        cache::{branch_key, load_json, meal_plan_key, store_json, Cache},
        error::AppError,
        query::{OrderBy, PageRequest, SearchFilter},
    },
    db::MealPlanRepository,
    models::meal_plan::{check_schedule, MealPlan, MealPlanChanges, MealPlanColumn, NewMealPlan},
};

#[derive(Clone)]
pub struct MealPlanService {
    repo: Arc<dyn MealPlanRepository>,
    cache: Option<Arc<dyn Cache>>,
}

impl MealPlanService {
    pub fn new(repo: Arc<dyn MealPlanRepository>, cache: Option<Arc<dyn Cache>>) -> Self {
        Self { repo, cache }
    }

    pub async fn fetch(
        &self,
        limit: Option<i64>,
        page: Option<i64>,
        order: Option<&str>,
    ) -> Result<Vec<MealPlan>, AppError> {
        let order = OrderBy::parse(order, MealPlanColumn::default_order())?;
        self.repo.fetch(PageRequest::new(limit, page), order).await
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<MealPlan, AppError> {
        let key = meal_plan_key(id);
        let since = match &self.cache {
            Some(cache) => {
                if let Some(hit) = load_json::<MealPlan>(cache.as_ref(), &key).await {
                    return Ok(hit);
                }
                Some(cache.generation().await)
            }
            None => None,
        };

        let plan = self.repo.get_by_id(id).await?;

        if let (Some(cache), Some(since)) = (&self.cache, since) {
            store_json(cache.as_ref(), &key, &plan, since).await;
        }
        Ok(plan)
    }

    pub async fn get_by_name(&self, name: &str) -> Result<MealPlan, AppError> {
        self.repo.get_by_name(name).await
    }

    pub async fn store(&self, plan: NewMealPlan) -> Result<MealPlan, AppError> {
        self.repo.store(plan).await
    }

    pub async fn update(&self, id: Uuid, changes: MealPlanChanges) -> Result<MealPlan, AppError> {
        // A single new end is checked against the stored start and vice versa.
        if changes.start_time.is_some() || changes.end_time.is_some() {
            let current = self.repo.get_by_id(id).await?;
            check_schedule(
                changes.start_time.or(current.start_time),
                changes.end_time.or(current.end_time),
            )?;
        }

        let plan = self.repo.update(id, changes).await?;

        let mut stale = vec![meal_plan_key(id)];
        stale.extend(plan.branches.iter().map(|b| branch_key(b.id)));
        self.forget(&stale).await;

        Ok(plan)
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), AppError> {
        let linked_branches: Vec<Uuid> = match &self.cache {
            Some(_) => self.repo.get_by_id(id).await?.branches.iter().map(|b| b.id).collect(),
            None => Vec::new(),
        };

        self.repo.delete(id).await?;

        let mut stale = vec![meal_plan_key(id)];
        stale.extend(linked_branches.into_iter().map(branch_key));
        self.forget(&stale).await;

        tracing::info!(meal_plan_id = %id, "Meal plan deleted");
        Ok(())
    }

    pub async fn search(
        &self,
        column: Option<&str>,
        query: Option<&str>,
        order: Option<&str>,
    ) -> Result<Vec<MealPlan>, AppError> {
        let filter = SearchFilter::<MealPlanColumn>::parse(column, query)?;
        let order = OrderBy::parse(order, MealPlanColumn::default_order())?;

        self.repo.search(&filter, order).await
    }

    async fn forget(&self, keys: &[String]) {
        if let Some(cache) = &self.cache {
            for key in keys {
                cache.invalidate(key).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        common::{cache::InMemoryCache, geo::Coordinates},
        db::{BranchRepository, MemoryRepository},
        models::branch::{BranchMealPlan, NewBranch},
        services::BranchService,
    };
    use chrono::{TimeZone, Utc};
    use std::time::Duration;

    fn brunch(name: &str, price: i64) -> NewMealPlan {
        NewMealPlan {
            meal_plan_name: name.to_string(),
            max_capacity: 20,
            price,
            day: "Saturday".to_string(),
            start_time: None,
            end_time: None,
        }
    }

    #[tokio::test]
    async fn meal_plan_names_may_repeat() {
        let svc = MealPlanService::new(Arc::new(MemoryRepository::new()), None);

        let first = svc.store(brunch("Brunch", 150_000)).await.unwrap();
        let second = svc.store(brunch("Brunch", 90_000)).await.unwrap();

        assert_ne!(first.id, second.id);
        assert_eq!(svc.get_by_name("Brunch").await.unwrap().id, first.id);
    }

    #[tokio::test]
    async fn search_by_price_matches_text_form() {
        let svc = MealPlanService::new(Arc::new(MemoryRepository::new()), None);
        svc.store(brunch("Brunch", 150_000)).await.unwrap();
        svc.store(brunch("Dinner", 90_000)).await.unwrap();

        let hits = svc.search(Some("price"), Some("150"), None).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].meal_plan_name, "Brunch");
    }

    #[tokio::test]
    async fn search_rejects_unknown_column_and_order() {
        let svc = MealPlanService::new(Arc::new(MemoryRepository::new()), None);

        assert!(matches!(
            svc.search(Some("id"), Some("x"), None).await,
            Err(AppError::InvalidInput(_))
        ));
        assert!(matches!(
            svc.search(Some("day"), Some("x"), Some("price sideways")).await,
            Err(AppError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn renaming_a_plan_refreshes_cached_branches() {
        let repo = Arc::new(MemoryRepository::new());
        let cache: Arc<dyn Cache> = Arc::new(InMemoryCache::new(Duration::from_secs(60)));
        let branches = BranchService::new(repo.clone(), Some(cache.clone()), Duration::from_secs(5));
        let plans = MealPlanService::new(repo.clone(), Some(cache));

        let branch = BranchRepository::store(
            repo.as_ref(),
            NewBranch {
                branch_name: "Downtown".into(),
                opening_hours: 10,
                location: Some(Coordinates::new(40.7128, -74.0060).unwrap()),
            },
        )
        .await
        .unwrap();
        let plan = plans.store(brunch("Brunch", 150_000)).await.unwrap();
        branches
            .store_meal_plan(BranchMealPlan { branch_id: branch.id, meal_plan_id: plan.id })
            .await
            .unwrap();

        // Warm the cache, then rename through the other service.
        assert_eq!(branches.get_by_id(branch.id).await.unwrap().meal_plans[0].meal_plan_name, "Brunch");
        let changes = MealPlanChanges { meal_plan_name: Some("Late Brunch".into()), ..Default::default() };
        plans.update(plan.id, changes).await.unwrap();

        let refreshed = branches.get_by_id(branch.id).await.unwrap();
        assert_eq!(refreshed.meal_plans[0].meal_plan_name, "Late Brunch");
    }

    #[tokio::test]
    async fn deleting_a_missing_plan_is_not_found() {
        let svc = MealPlanService::new(Arc::new(MemoryRepository::new()), None);
        assert!(matches!(svc.delete(Uuid::new_v4()).await, Err(AppError::NotFound { .. })));
    }

    #[tokio::test]
    async fn moving_one_end_past_the_other_is_rejected() {
        let svc = MealPlanService::new(Arc::new(MemoryRepository::new()), None);
        let at = |hour| Utc.with_ymd_and_hms(2024, 1, 1, hour, 0, 0).unwrap();
        let plan = svc
            .store(NewMealPlan { start_time: Some(at(10)), end_time: Some(at(12)), ..brunch("Brunch", 150_000) })
            .await
            .unwrap();

        let early_end = MealPlanChanges { end_time: Some(at(8)), ..Default::default() };
        assert!(matches!(svc.update(plan.id, early_end).await, Err(AppError::ValidationError(_))));

        let late_start = MealPlanChanges { start_time: Some(at(13)), ..Default::default() };
        assert!(matches!(svc.update(plan.id, late_start).await, Err(AppError::ValidationError(_))));

        let stored = svc.get_by_id(plan.id).await.unwrap();
        assert_eq!((stored.start_time, stored.end_time), (Some(at(10)), Some(at(12))));

        let later_end = MealPlanChanges { end_time: Some(at(14)), ..Default::default() };
        assert_eq!(svc.update(plan.id, later_end).await.unwrap().end_time, Some(at(14)));
    }

    #[tokio::test]
    async fn schedule_change_on_a_missing_plan_is_not_found() {
        let svc = MealPlanService::new(Arc::new(MemoryRepository::new()), None);
        let changes = MealPlanChanges { end_time: Some(Utc::now()), ..Default::default() };
        assert!(matches!(svc.update(Uuid::new_v4(), changes).await, Err(AppError::NotFound { .. })));
    }
}
