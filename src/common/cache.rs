// src/common/cache.rs

use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::{Duration, Instant},
};

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{de::DeserializeOwned, Serialize};
use uuid::Uuid;

/// Side-table cache used cache-aside by the services. Never load-bearing:
/// a miss, an expired entry or no cache at all only costs a query.
#[async_trait]
pub trait Cache: Send + Sync {
    async fn get(&self, key: &str) -> Option<String>;

    /// Marker for a later `set`. Take it before reading the value from storage.
    async fn generation(&self) -> u64;

    /// Stores `value` unless `key` was invalidated after `since` was taken.
    /// Returns whether the value was stored.
    async fn set(&self, key: &str, value: String, since: u64) -> bool;

    async fn invalidate(&self, key: &str);
}

pub fn branch_key(id: Uuid) -> String {
    format!("branch:{id}")
}

pub fn meal_plan_key(id: Uuid) -> String {
    format!("meal_plan:{id}")
}

/// Cache hit decoded as `T`. Entries that no longer decode are dropped and count as a miss.
pub async fn load_json<T: DeserializeOwned>(cache: &dyn Cache, key: &str) -> Option<T> {
    let raw = cache.get(key).await?;
    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(key, error = %e, "Discarding undecodable cache entry");
            cache.invalidate(key).await;
            None
        }
    }
}

pub async fn store_json<T: Serialize>(cache: &dyn Cache, key: &str, value: &T, since: u64) {
    match serde_json::to_string(value) {
        Ok(raw) => {
            if !cache.set(key, raw, since).await {
                tracing::debug!(key, "Read raced an invalidation, not cached");
            }
        }
        Err(e) => tracing::warn!(key, error = %e, "Value not cached"),
    }
}

// ---
// In-process implementation
// ---
const SWEEP_EVERY: u64 = 64;

#[derive(Default)]
struct Slot {
    value: Option<(String, Instant)>,
    // Generation of the last invalidation, 0 if never invalidated.
    invalidated_at: u64,
}

pub struct InMemoryCache {
    entries: DashMap<String, Slot>,
    ttl: Duration,
    clock: AtomicU64,
    // Highest invalidation generation among slots that were evicted.
    evicted_floor: AtomicU64,
    writes: AtomicU64,
}

impl InMemoryCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            clock: AtomicU64::new(0),
            evicted_floor: AtomicU64::new(0),
            writes: AtomicU64::new(0),
        }
    }

    /// Slots held, including invalidation markers the sweep has not dropped yet.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops expired values and invalidation markers. Runs on its own every `SWEEP_EVERY` writes.
    pub fn sweep(&self) {
        self.entries.retain(|_, slot| !self.evictable(slot));
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::SeqCst) + 1
    }

    // Called with the shard lock held, so a concurrent `set` sees the raised floor.
    fn evictable(&self, slot: &Slot) -> bool {
        let live = matches!(&slot.value, Some((_, stored_at)) if stored_at.elapsed() < self.ttl);
        if !live {
            self.evicted_floor.fetch_max(slot.invalidated_at, Ordering::SeqCst);
        }
        !live
    }

    // Must not be called while holding a guard into `entries`.
    fn after_write(&self) {
        if self.writes.fetch_add(1, Ordering::Relaxed) % SWEEP_EVERY == SWEEP_EVERY - 1 {
            self.sweep();
        }
    }
}

#[async_trait]
impl Cache for InMemoryCache {
    async fn get(&self, key: &str) -> Option<String> {
        let expired = match self.entries.get(key) {
            Some(slot) => match &slot.value {
                Some((value, stored_at)) if stored_at.elapsed() < self.ttl => return Some(value.clone()),
                Some(_) => true,
                None => false,
            },
            None => false,
        };

        // The read guard is dropped above; removing while holding it would deadlock the shard.
        if expired {
            self.entries.remove_if(key, |_, slot| self.evictable(slot));
        }
        None
    }

    async fn generation(&self) -> u64 {
        self.tick()
    }

    async fn set(&self, key: &str, value: String, since: u64) -> bool {
        let stored = {
            let mut slot = self.entries.entry(key.to_string()).or_default();
            if slot.invalidated_at > since || self.evicted_floor.load(Ordering::SeqCst) > since {
                false
            } else {
                slot.value = Some((value, Instant::now()));
                true
            }
        };
        self.after_write();
        stored
    }

    async fn invalidate(&self, key: &str) {
        let generation = self.tick();
        {
            let mut slot = self.entries.entry(key.to_string()).or_default();
            slot.value = None;
            slot.invalidated_at = generation;
        }
        self.after_write();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn put(cache: &InMemoryCache, key: &str, value: &str) {
        let since = cache.generation().await;
        assert!(cache.set(key, value.to_string(), since).await);
    }

    #[tokio::test]
    async fn set_get_invalidate() {
        let cache = InMemoryCache::new(Duration::from_secs(60));
        let id = Uuid::new_v4();

        assert_eq!(cache.get(&branch_key(id)).await, None);

        put(&cache, &branch_key(id), "{\"id\":1}").await;
        assert_eq!(cache.get(&branch_key(id)).await.as_deref(), Some("{\"id\":1}"));
        assert_eq!(cache.get(&meal_plan_key(id)).await, None);

        cache.invalidate(&branch_key(id)).await;
        assert_eq!(cache.get(&branch_key(id)).await, None);

        cache.sweep();
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn json_helpers_round_trip_and_discard_garbage() {
        let cache = InMemoryCache::new(Duration::from_secs(60));

        let since = cache.generation().await;
        store_json(&cache, "nums", &vec![1, 2, 3], since).await;
        assert_eq!(load_json::<Vec<i32>>(&cache, "nums").await, Some(vec![1, 2, 3]));

        put(&cache, "broken", "{not json").await;
        assert_eq!(load_json::<Vec<i32>>(&cache, "broken").await, None);
        assert_eq!(cache.get("broken").await, None);
    }

    #[tokio::test]
    async fn expired_entries_are_dropped() {
        let cache = InMemoryCache::new(Duration::ZERO);

        put(&cache, "k", "v").await;
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("k").await, None);
        assert_eq!(cache.len(), 0);
    }

    #[tokio::test]
    async fn value_read_before_an_invalidation_is_not_stored() {
        let cache = InMemoryCache::new(Duration::from_secs(60));

        let since = cache.generation().await;
        cache.invalidate("k").await;
        assert!(!cache.set("k", "old".into(), since).await);
        assert_eq!(cache.get("k").await, None);

        // Other keys are unaffected by the invalidation.
        assert!(cache.set("other", "v".into(), since).await);

        let since = cache.generation().await;
        assert!(cache.set("k", "new".into(), since).await);
        assert_eq!(cache.get("k").await.as_deref(), Some("new"));
    }

    #[tokio::test]
    async fn invalidation_survives_its_marker_being_swept() {
        let cache = InMemoryCache::new(Duration::from_secs(60));

        let since = cache.generation().await;
        cache.invalidate("k").await;
        cache.sweep();
        assert!(cache.is_empty());

        assert!(!cache.set("k", "old".into(), since).await);
        assert_eq!(cache.get("k").await, None);
    }

    #[tokio::test]
    async fn keys_never_read_again_are_swept_by_later_writes() {
        let cache = InMemoryCache::new(Duration::ZERO);

        for i in 0..SWEEP_EVERY {
            put(&cache, &format!("k{i}"), "v").await;
        }
        assert_eq!(cache.len(), 0);
    }

    #[tokio::test]
    async fn sweep_keeps_fresh_entries() {
        let cache = InMemoryCache::new(Duration::from_secs(60));

        put(&cache, "fresh", "v").await;
        cache.sweep();
        assert_eq!(cache.get("fresh").await.as_deref(), Some("v"));
    }
}
