use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use clavis_core::{AppResult, PrincipalId};
use clavis_domain::ResolvedPermissionSet;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

/// Default lifetime of a cached permission set across both tiers.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

/// Port for the distributed cache tier shared between processes.
#[async_trait]
pub trait DistributedPermissionSetCache: Send + Sync {
    /// Reads the cached set for a principal, `None` on miss.
    async fn get(&self, principal_id: PrincipalId) -> AppResult<Option<ResolvedPermissionSet>>;

    /// Writes the set for a principal with the given lifetime.
    async fn set(
        &self,
        principal_id: PrincipalId,
        set: &ResolvedPermissionSet,
        ttl: Duration,
    ) -> AppResult<()>;

    /// Removes the cached set and any session-scoped copies for a principal.
    async fn invalidate(&self, principal_id: PrincipalId) -> AppResult<()>;
}

#[derive(Debug, Clone)]
struct MemoryEntry {
    set: ResolvedPermissionSet,
    stored_at: Instant,
}

/// Snapshot of the in-process tier for operational introspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of entries currently held, including not-yet-swept expired ones.
    pub entries: usize,
}

/// Two-tier cache for resolved permission sets.
///
/// The in-process tier is a TTL-bounded map accessed synchronously; the
/// optional distributed tier keeps sibling processes warm. A distributed-tier
/// outage degrades every operation to the in-process tier alone; it is never
/// surfaced to callers.
pub struct PermissionSetCache {
    ttl: Duration,
    entries: RwLock<HashMap<PrincipalId, MemoryEntry>>,
    distributed: Option<Arc<dyn DistributedPermissionSetCache>>,
}

impl PermissionSetCache {
    /// Creates a cache with only the in-process tier.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
            distributed: None,
        }
    }

    /// Creates a cache backed by a distributed tier for cross-process reads.
    #[must_use]
    pub fn with_distributed(
        ttl: Duration,
        distributed: Arc<dyn DistributedPermissionSetCache>,
    ) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
            distributed: Some(distributed),
        }
    }

    /// Returns the configured entry lifetime.
    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Reads the cached set for a principal.
    ///
    /// Consults the in-process tier first; a distributed hit repopulates the
    /// in-process tier. Returns `None` on a full miss, signalling the caller
    /// to recompute from the catalog.
    pub async fn get(&self, principal_id: PrincipalId) -> Option<ResolvedPermissionSet> {
        if let Some(set) = self.memory_get(principal_id) {
            return Some(set);
        }

        let distributed = self.distributed.as_ref()?;
        match distributed.get(principal_id).await {
            Ok(Some(set)) => {
                self.memory_put(principal_id, set.clone());
                Some(set)
            }
            Ok(None) => None,
            Err(error) => {
                debug!(
                    principal_id = %principal_id,
                    error = %error,
                    "distributed cache read failed, treating as miss"
                );
                None
            }
        }
    }

    /// Stores a freshly resolved set in both tiers, last writer wins.
    pub async fn store(&self, principal_id: PrincipalId, set: ResolvedPermissionSet) {
        self.memory_put(principal_id, set.clone());

        if let Some(distributed) = &self.distributed
            && let Err(error) = distributed.set(principal_id, &set, self.ttl).await
        {
            warn!(
                principal_id = %principal_id,
                error = %error,
                "distributed cache write failed, entry held in process only"
            );
        }
    }

    /// Removes the principal's entry from both tiers.
    ///
    /// A distributed-tier failure leaves the shared entry to lapse with its
    /// TTL; the in-process removal always takes effect.
    pub async fn invalidate(&self, principal_id: PrincipalId) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&principal_id);

        if let Some(distributed) = &self.distributed
            && let Err(error) = distributed.invalidate(principal_id).await
        {
            warn!(
                principal_id = %principal_id,
                error = %error,
                "distributed cache invalidation failed, entry expires with its TTL"
            );
        }
    }

    /// Evicts expired in-process entries, returning the evicted count.
    pub fn sweep_expired(&self) -> usize {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let before = entries.len();
        entries.retain(|_, entry| entry.stored_at.elapsed() < self.ttl);
        before - entries.len()
    }

    /// Returns a snapshot of the in-process tier.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self
                .entries
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .len(),
        }
    }

    /// Spawns the periodic eviction task for the in-process tier.
    ///
    /// Runs on its own timer, decoupled from request handling; each sweep
    /// takes the write lock only briefly.
    pub fn spawn_sweeper(self: Arc<Self>, period: Duration) -> JoinHandle<()> {
        let cache = self;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                let evicted = cache.sweep_expired();
                if evicted > 0 {
                    debug!(evicted, "evicted expired permission set cache entries");
                }
            }
        })
    }

    fn memory_get(&self, principal_id: PrincipalId) -> Option<ResolvedPermissionSet> {
        {
            let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
            match entries.get(&principal_id) {
                Some(entry) if entry.stored_at.elapsed() < self.ttl => {
                    return Some(entry.set.clone());
                }
                Some(_) => {}
                None => return None,
            }
        }

        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if entries
            .get(&principal_id)
            .is_some_and(|entry| entry.stored_at.elapsed() >= self.ttl)
        {
            entries.remove(&principal_id);
        }

        None
    }

    fn memory_put(&self, principal_id: PrincipalId, set: ResolvedPermissionSet) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                principal_id,
                MemoryEntry {
                    set,
                    stored_at: Instant::now(),
                },
            );
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use clavis_core::{AppError, AppResult, PrincipalId};
    use clavis_domain::ResolvedPermissionSet;
    use tokio::sync::Mutex;

    use super::{DistributedPermissionSetCache, PermissionSetCache};

    #[derive(Default)]
    struct FakeDistributedCache {
        entries: Mutex<HashMap<PrincipalId, ResolvedPermissionSet>>,
        fail: AtomicBool,
    }

    #[async_trait]
    impl DistributedPermissionSetCache for FakeDistributedCache {
        async fn get(
            &self,
            principal_id: PrincipalId,
        ) -> AppResult<Option<ResolvedPermissionSet>> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(AppError::CacheUnavailable("redis offline".to_owned()));
            }
            Ok(self.entries.lock().await.get(&principal_id).cloned())
        }

        async fn set(
            &self,
            principal_id: PrincipalId,
            set: &ResolvedPermissionSet,
            _ttl: Duration,
        ) -> AppResult<()> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(AppError::CacheUnavailable("redis offline".to_owned()));
            }
            self.entries.lock().await.insert(principal_id, set.clone());
            Ok(())
        }

        async fn invalidate(&self, principal_id: PrincipalId) -> AppResult<()> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(AppError::CacheUnavailable("redis offline".to_owned()));
            }
            self.entries.lock().await.remove(&principal_id);
            Ok(())
        }
    }

    fn sample_set(permission: &str) -> ResolvedPermissionSet {
        ResolvedPermissionSet {
            permissions: [permission.to_owned()].into_iter().collect(),
            roles: vec!["COLABORADOR".to_owned()],
            max_level: 10,
        }
    }

    #[tokio::test]
    async fn store_then_get_hits_memory_tier() {
        let cache = PermissionSetCache::new(Duration::from_secs(300));
        let principal_id = PrincipalId::new(42);

        cache
            .store(principal_id, sample_set("timerecords:create"))
            .await;

        let hit = cache.get(principal_id).await;
        assert!(hit.is_some_and(|set| set.permissions.contains("timerecords:create")));
    }

    #[tokio::test]
    async fn invalidate_removes_memory_entry() {
        let cache = PermissionSetCache::new(Duration::from_secs(300));
        let principal_id = PrincipalId::new(42);

        cache
            .store(principal_id, sample_set("timerecords:create"))
            .await;
        cache.invalidate(principal_id).await;

        assert!(cache.get(principal_id).await.is_none());
        assert_eq!(cache.stats().entries, 0);
    }

    #[tokio::test]
    async fn zero_ttl_always_misses() {
        let cache = PermissionSetCache::new(Duration::ZERO);
        let principal_id = PrincipalId::new(42);

        cache
            .store(principal_id, sample_set("timerecords:create"))
            .await;

        assert!(cache.get(principal_id).await.is_none());
    }

    #[tokio::test]
    async fn sweep_evicts_expired_entries() {
        let cache = PermissionSetCache::new(Duration::ZERO);
        let principal_id = PrincipalId::new(42);

        cache
            .store(principal_id, sample_set("timerecords:create"))
            .await;
        assert_eq!(cache.stats().entries, 1);

        assert_eq!(cache.sweep_expired(), 1);
        assert_eq!(cache.stats().entries, 0);
    }

    #[tokio::test]
    async fn distributed_hit_populates_memory_tier() {
        let distributed = Arc::new(FakeDistributedCache::default());
        let cache = PermissionSetCache::with_distributed(
            Duration::from_secs(300),
            distributed.clone(),
        );
        let principal_id = PrincipalId::new(42);

        distributed
            .entries
            .lock()
            .await
            .insert(principal_id, sample_set("timerecords:create"));

        assert!(cache.get(principal_id).await.is_some());

        // A second read must be served from the in-process tier.
        distributed.entries.lock().await.clear();
        assert!(cache.get(principal_id).await.is_some());
    }

    #[tokio::test]
    async fn distributed_outage_degrades_to_miss() {
        let distributed = Arc::new(FakeDistributedCache::default());
        let cache = PermissionSetCache::with_distributed(
            Duration::from_secs(300),
            distributed.clone(),
        );
        let principal_id = PrincipalId::new(42);

        distributed.fail.store(true, Ordering::SeqCst);

        assert!(cache.get(principal_id).await.is_none());
        cache.store(principal_id, sample_set("timerecords:create")).await;
        cache.invalidate(principal_id).await;
        assert!(cache.get(principal_id).await.is_none());
    }

    #[tokio::test]
    async fn invalidate_reaches_distributed_tier() {
        let distributed = Arc::new(FakeDistributedCache::default());
        let cache = PermissionSetCache::with_distributed(
            Duration::from_secs(300),
            distributed.clone(),
        );
        let principal_id = PrincipalId::new(42);

        cache
            .store(principal_id, sample_set("timerecords:create"))
            .await;
        assert!(distributed.entries.lock().await.contains_key(&principal_id));

        cache.invalidate(principal_id).await;
        assert!(!distributed.entries.lock().await.contains_key(&principal_id));
    }
}
