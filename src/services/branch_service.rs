// src/services/branch_service.rs

use std::{sync::Arc, time::Duration};

use uuid::Uuid;

use crate::{
    common::{
        cache::{branch_key, load_json, meal_plan_key, store_json, Cache},
        error::AppError,
        geo::Coordinates,
        query::{OrderBy, PageRequest, SearchFilter},
    },
    db::BranchRepository,
    models::branch::{Branch, BranchChanges, BranchColumn, BranchLocation, BranchMealPlan, NewBranch},
};

#[derive(Clone)]
pub struct BranchService {
    repo: Arc<dyn BranchRepository>,
    cache: Option<Arc<dyn Cache>>,
    nearest_timeout: Duration,
}

impl BranchService {
    pub fn new(repo: Arc<dyn BranchRepository>, cache: Option<Arc<dyn Cache>>, nearest_timeout: Duration) -> Self {
        Self { repo, cache, nearest_timeout }
    }

    // --- FETCH (paginated) ---
    pub async fn fetch(
        &self,
        limit: Option<i64>,
        page: Option<i64>,
        order: Option<&str>,
    ) -> Result<Vec<Branch>, AppError> {
        let order = OrderBy::parse(order, BranchColumn::default_order())?;
        self.repo.fetch(PageRequest::new(limit, page), order).await
    }

    // --- GET BY ID (cache-aside) ---
    pub async fn get_by_id(&self, id: Uuid) -> Result<Branch, AppError> {
        let key = branch_key(id);
        let since = match &self.cache {
            Some(cache) => {
                if let Some(hit) = load_json::<Branch>(cache.as_ref(), &key).await {
                    return Ok(hit);
                }
                // Taken before the read: an update landing meanwhile keeps this result out of the cache.
                Some(cache.generation().await)
            }
            None => None,
        };

        let branch = self.repo.get_by_id(id).await?;

        if let (Some(cache), Some(since)) = (&self.cache, since) {
            store_json(cache.as_ref(), &key, &branch, since).await;
        }
        Ok(branch)
    }

    pub async fn get_by_name(&self, name: &str) -> Result<Branch, AppError> {
        self.repo.get_by_name(name).await
    }

    // --- NEAREST ---
    // Full scan of branch_locations, bounded by `nearest_timeout`.
    pub async fn find_nearest_location(&self, latitude: f64, longitude: f64) -> Result<Vec<BranchLocation>, AppError> {
        let origin = Coordinates::new(latitude, longitude)?;

        tokio::time::timeout(self.nearest_timeout, self.repo.find_nearest_location(origin))
            .await
            .map_err(|_| AppError::Timeout(self.nearest_timeout))?
    }

    // --- STORE ---
    pub async fn store(&self, branch: NewBranch) -> Result<Branch, AppError> {
        self.repo.store(branch).await
    }

    pub async fn store_meal_plan(&self, link: BranchMealPlan) -> Result<(), AppError> {
        self.repo.store_meal_plan(link).await?;
        self.forget(&[branch_key(link.branch_id), meal_plan_key(link.meal_plan_id)]).await;
        Ok(())
    }

    // --- UPDATE ---
    pub async fn update(&self, id: Uuid, changes: BranchChanges) -> Result<Branch, AppError> {
        let branch = self.repo.update(id, changes).await?;

        // Meal plans embed a summary of this branch, so theirs are stale too.
        let mut stale = vec![branch_key(id)];
        stale.extend(branch.meal_plans.iter().map(|p| meal_plan_key(p.id)));
        self.forget(&stale).await;

        Ok(branch)
    }

    // --- DELETE ---
    pub async fn delete(&self, id: Uuid) -> Result<(), AppError> {
        // Linked plans are only needed for cache invalidation. A failed lookup stops the
        // delete, otherwise their cached copies would outlive the branch.
        let linked_plans: Vec<Uuid> = match &self.cache {
            Some(_) => self.repo.get_by_id(id).await?.meal_plans.iter().map(|p| p.id).collect(),
            None => Vec::new(),
        };

        self.repo.delete(id).await?;

        let mut stale = vec![branch_key(id)];
        stale.extend(linked_plans.into_iter().map(meal_plan_key));
        self.forget(&stale).await;

        tracing::info!(branch_id = %id, "Branch deleted");
        Ok(())
    }

    // --- SEARCH ---
    // Column and order are checked against the allow-lists before storage is touched.
    pub async fn search(
        &self,
        column: Option<&str>,
        query: Option<&str>,
        order: Option<&str>,
    ) -> Result<Vec<Branch>, AppError> {
        let filter = SearchFilter::<BranchColumn>::parse(column, query)?;
        let order = OrderBy::parse(order, BranchColumn::default_order())?;

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
        common::cache::InMemoryCache,
        common::query::Direction,
        db::MemoryRepository,
        models::branch::BranchSummary,
    };
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Records the calls that reach storage; everything else delegates to the in-memory store.
    #[derive(Default)]
    struct CountingRepo {
        inner: MemoryRepository,
        calls: AtomicUsize,
        last_page: std::sync::Mutex<Option<PageRequest>>,
        last_order: std::sync::Mutex<Option<OrderBy<BranchColumn>>>,
        nearest_delay: Option<Duration>,
        // Applied after `get_by_id` has read its row.
        read_delay: Option<Duration>,
        fail_reads: bool,
    }

    impl CountingRepo {
        fn branches(&self) -> &dyn BranchRepository {
            &self.inner
        }

        fn hit(&self) {
            self.calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl BranchRepository for CountingRepo {
        async fn fetch(&self, page: PageRequest, order: OrderBy<BranchColumn>) -> Result<Vec<Branch>, AppError> {
            self.hit();
            *self.last_page.lock().unwrap() = Some(page);
            *self.last_order.lock().unwrap() = Some(order);
            self.branches().fetch(page, order).await
        }
        async fn get_by_id(&self, id: Uuid) -> Result<Branch, AppError> {
            self.hit();
            if self.fail_reads {
                return Err(AppError::DatabaseError(sqlx::Error::PoolTimedOut));
            }
            let branch = self.branches().get_by_id(id).await;
            if let Some(delay) = self.read_delay {
                tokio::time::sleep(delay).await;
            }
            branch
        }
        async fn get_by_name(&self, name: &str) -> Result<Branch, AppError> {
            self.hit();
            self.branches().get_by_name(name).await
        }
        async fn find_nearest_location(&self, origin: Coordinates) -> Result<Vec<BranchLocation>, AppError> {
            self.hit();
            if let Some(delay) = self.nearest_delay {
                tokio::time::sleep(delay).await;
            }
            self.branches().find_nearest_location(origin).await
        }
        async fn store(&self, branch: NewBranch) -> Result<Branch, AppError> {
            self.hit();
            self.branches().store(branch).await
        }
        async fn store_meal_plan(&self, link: BranchMealPlan) -> Result<(), AppError> {
            self.hit();
            self.branches().store_meal_plan(link).await
        }
        async fn update(&self, id: Uuid, changes: BranchChanges) -> Result<Branch, AppError> {
            self.hit();
            self.branches().update(id, changes).await
        }
        async fn delete(&self, id: Uuid) -> Result<(), AppError> {
            self.hit();
            self.branches().delete(id).await
        }
        async fn search(
            &self,
            filter: &SearchFilter<BranchColumn>,
            order: OrderBy<BranchColumn>,
        ) -> Result<Vec<Branch>, AppError> {
            self.hit();
            self.branches().search(filter, order).await
        }
    }

    fn service(repo: Arc<CountingRepo>, cache: Option<Arc<dyn Cache>>) -> BranchService {
        BranchService::new(repo, cache, Duration::from_secs(5))
    }

    fn new_branch(name: &str, lat: f64, long: f64) -> NewBranch {
        NewBranch {
            branch_name: name.to_string(),
            opening_hours: 10,
            location: Some(Coordinates::new(lat, long).unwrap()),
        }
    }

    #[tokio::test]
    async fn fetch_applies_default_limit_and_order() {
        let repo = Arc::new(CountingRepo::default());
        let svc = service(repo.clone(), None);

        svc.fetch(Some(0), Some(0), None).await.unwrap();

        let page = repo.last_page.lock().unwrap().unwrap();
        assert_eq!(page.limit, 10);
        assert_eq!(page.offset(), 0);
        assert_eq!(
            repo.last_order.lock().unwrap().unwrap(),
            OrderBy::new(BranchColumn::CreatedAt, Direction::Desc)
        );
    }

    #[tokio::test]
    async fn search_with_unknown_column_never_reaches_storage() {
        let repo = Arc::new(CountingRepo::default());
        let svc = service(repo.clone(), None);

        for column in [None, Some("id"), Some("branch_name; DELETE FROM branches"), Some("created_at")] {
            let err = svc.search(column, Some("x"), None).await.unwrap_err();
            assert!(matches!(err, AppError::InvalidInput(_)), "{column:?}");
        }
        let err = svc.search(Some("branch_name"), Some("x"), Some("secret desc")).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));

        assert_eq!(repo.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn invalid_coordinates_never_reach_storage() {
        let repo = Arc::new(CountingRepo::default());
        let svc = service(repo.clone(), None);

        assert!(svc.find_nearest_location(120.0, 0.0).await.is_err());
        assert!(svc.find_nearest_location(0.0, f64::NAN).await.is_err());
        assert_eq!(repo.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn nearest_results_are_sorted_by_distance() {
        let repo = Arc::new(CountingRepo::default());
        let svc = service(repo.clone(), None);
        let downtown = svc.store(new_branch("Downtown", 40.7128, -74.0060)).await.unwrap();
        let uptown = svc.store(new_branch("Uptown", 40.8448, -73.8648)).await.unwrap();
        svc.store(new_branch("Harbor", 25.7617, -80.1918)).await.unwrap();

        let nearest = svc.find_nearest_location(40.7306, -73.9352).await.unwrap();

        assert_eq!(nearest.len(), 3);
        assert_eq!(nearest[0].branch_id, downtown.id);
        assert_eq!(nearest[1].branch_id, uptown.id);
        let distances: Vec<f64> = nearest.iter().map(|l| l.distance.unwrap()).collect();
        assert!(distances.windows(2).all(|w| w[0] <= w[1]), "{distances:?}");
    }

    #[tokio::test]
    async fn nearest_from_a_branch_location_is_zero_miles() {
        let repo = Arc::new(CountingRepo::default());
        let svc = service(repo.clone(), None);
        svc.store(new_branch("Downtown", 40.7128, -74.0060)).await.unwrap();

        let nearest = svc.find_nearest_location(40.7128, -74.0060).await.unwrap();
        assert!(nearest[0].distance.unwrap().abs() < 1e-3);
    }

    #[tokio::test]
    async fn slow_nearest_query_times_out() {
        let repo = Arc::new(CountingRepo {
            nearest_delay: Some(Duration::from_millis(500)),
            ..Default::default()
        });
        let svc = BranchService::new(repo, None, Duration::from_millis(20));

        let err = svc.find_nearest_location(0.0, 0.0).await.unwrap_err();
        assert!(matches!(err, AppError::Timeout(_)));
    }

    #[tokio::test]
    async fn get_by_id_is_served_from_cache_until_updated() {
        let repo = Arc::new(CountingRepo::default());
        let cache: Arc<dyn Cache> = Arc::new(InMemoryCache::new(Duration::from_secs(60)));
        let svc = service(repo.clone(), Some(cache));
        let branch = svc.store(new_branch("Downtown", 40.7128, -74.0060)).await.unwrap();

        let before = repo.calls.load(Ordering::SeqCst);
        let first = svc.get_by_id(branch.id).await.unwrap();
        let second = svc.get_by_id(branch.id).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(repo.calls.load(Ordering::SeqCst), before + 1);

        let changes = BranchChanges { opening_hours: Some(8), ..Default::default() };
        svc.update(branch.id, changes).await.unwrap();

        let fresh = svc.get_by_id(branch.id).await.unwrap();
        assert_eq!(fresh.opening_hours, 8);
    }

    #[tokio::test]
    async fn deleted_branch_is_not_served_from_cache() {
        let repo = Arc::new(CountingRepo::default());
        let cache: Arc<dyn Cache> = Arc::new(InMemoryCache::new(Duration::from_secs(60)));
        let svc = service(repo, Some(cache));
        let branch = svc.store(new_branch("Downtown", 40.7128, -74.0060)).await.unwrap();

        svc.get_by_id(branch.id).await.unwrap();
        svc.delete(branch.id).await.unwrap();

        assert!(matches!(svc.get_by_id(branch.id).await, Err(AppError::NotFound { .. })));
    }

    #[tokio::test]
    async fn duplicate_name_is_a_conflict_and_inserts_nothing() {
        let repo = Arc::new(CountingRepo::default());
        let svc = service(repo, None);
        svc.store(new_branch("Downtown", 40.7128, -74.0060)).await.unwrap();

        let err = svc.store(new_branch("Downtown", 1.0, 1.0)).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        let all = svc.fetch(Some(100), None, None).await.unwrap();
        let names: Vec<BranchSummary> = all.iter().map(Branch::summary).collect();
        assert_eq!(names.len(), 1);
    }

    #[tokio::test]
    async fn updating_a_missing_branch_is_not_found() {
        let repo = Arc::new(CountingRepo::default());
        let svc = service(repo, None);
        svc.store(new_branch("Downtown", 40.7128, -74.0060)).await.unwrap();
        let before = svc.fetch(None, None, None).await.unwrap();

        let changes = BranchChanges { branch_name: Some("Elsewhere".into()), ..Default::default() };
        let err = svc.update(Uuid::new_v4(), changes).await.unwrap_err();

        assert!(matches!(err, AppError::NotFound { .. }));
        assert_eq!(svc.fetch(None, None, None).await.unwrap(), before);
    }

    #[tokio::test]
    async fn read_racing_an_update_does_not_cache_the_old_row() {
        let repo = Arc::new(CountingRepo {
            read_delay: Some(Duration::from_millis(100)),
            ..Default::default()
        });
        let cache: Arc<dyn Cache> = Arc::new(InMemoryCache::new(Duration::from_secs(60)));
        let svc = service(repo, Some(cache));
        let branch = svc.store(new_branch("Downtown", 40.7128, -74.0060)).await.unwrap();

        let slow_read = tokio::spawn({
            let svc = svc.clone();
            async move { svc.get_by_id(branch.id).await }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        let changes = BranchChanges { opening_hours: Some(6), ..Default::default() };
        svc.update(branch.id, changes).await.unwrap();

        // The slow read saw the old row, but must not have cached it.
        assert_eq!(slow_read.await.unwrap().unwrap().opening_hours, 10);
        assert_eq!(svc.get_by_id(branch.id).await.unwrap().opening_hours, 6);
    }

    #[tokio::test]
    async fn delete_stops_when_the_linked_lookup_fails() {
        let repo = Arc::new(CountingRepo { fail_reads: true, ..Default::default() });
        let cache: Arc<dyn Cache> = Arc::new(InMemoryCache::new(Duration::from_secs(60)));
        let svc = service(repo.clone(), Some(cache));
        let branch = svc.store(new_branch("Downtown", 40.7128, -74.0060)).await.unwrap();

        let err = svc.delete(branch.id).await.unwrap_err();

        assert!(matches!(err, AppError::DatabaseError(_)));
        assert!(repo.branches().get_by_id(branch.id).await.is_ok());
    }
}
