//! Agent Cache & Assembly (spec.md §4.G): bounded FIFO caches for constructed
//! agents, keyed by agent id and by `(provider, model)`, with single-flight
//! construction so concurrent cache misses for the same key share one build.

use std::collections::VecDeque;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::Notify;

const AGENT_CACHE_CAPACITY: usize = 100;
const CHAT_AGENT_CACHE_CAPACITY: usize = 20;

/// A size-bounded cache with first-in-first-out eviction.
pub struct FifoCache<K, V> {
    capacity: usize,
    entries: DashMap<K, V>,
    order: Mutex<VecDeque<K>>,
}

impl<K, V> FifoCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: DashMap::new(),
            order: Mutex::new(VecDeque::new()),
        }
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.entries.get(key).map(|v| v.clone())
    }

    /// Inserts `value`, evicting the oldest entry if this pushes the cache
    /// over capacity. Re-inserting an existing key does not change its
    /// eviction order.
    pub fn insert(&self, key: K, value: V) {
        if !self.entries.contains_key(&key) {
            let mut order = self.order.lock().unwrap();
            order.push_back(key.clone());
            if order.len() > self.capacity {
                if let Some(oldest) = order.pop_front() {
                    self.entries.remove(&oldest);
                }
            }
        }
        self.entries.insert(key, value);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
        self.order.lock().unwrap().clear();
    }
}

/// A [`FifoCache`] with single-flight construction: concurrent cache misses
/// for the same key await one in-flight build instead of each starting their
/// own, mirroring the "pending-promise" behaviour spec.md names.
pub struct SingleFlightCache<K, V> {
    cache: FifoCache<K, V>,
    pending: DashMap<K, Arc<Notify>>,
}

impl<K, V> SingleFlightCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(capacity: usize) -> Self {
        Self {
            cache: FifoCache::new(capacity),
            pending: DashMap::new(),
        }
    }

    pub fn peek(&self, key: &K) -> Option<V> {
        self.cache.get(key)
    }

    pub fn clear(&self) {
        self.cache.clear();
        self.pending.clear();
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Returns the cached value for `key`, or runs `build` once - sharing the
    /// result with any other caller that arrives while the build is in
    /// flight. If the in-flight build this caller waited on failed, it runs
    /// its own build rather than propagating a stranger's error; in the rare
    /// case that races a third caller's fresh attempt, both just build once
    /// each (best-effort dedup, never incorrect, just occasionally redundant).
    pub async fn get_or_build<E, F, Fut>(&self, key: K, build: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(v) = self.cache.get(&key) {
            return Ok(v);
        }

        let Some(notify) = self.claim_pending_slot(&key) else {
            // someone else is already building; wait for them, then take the
            // result if they succeeded.
            let notify = self.pending.get(&key).map(|n| n.clone());
            if let Some(notify) = notify {
                notify.notified().await;
            }
            if let Some(v) = self.cache.get(&key) {
                return Ok(v);
            }
            return self.build_and_publish(key, build).await;
        };

        let result = build().await;
        if let Ok(v) = &result {
            self.cache.insert(key.clone(), v.clone());
        }
        self.pending.remove(&key);
        notify.notify_waiters();
        result
    }

    /// Atomically inserts a fresh `Notify` if no build is pending for `key`,
    /// returning it; returns `None` if one already exists.
    fn claim_pending_slot(&self, key: &K) -> Option<Arc<Notify>> {
        match self.pending.entry(key.clone()) {
            Entry::Occupied(_) => None,
            Entry::Vacant(slot) => {
                let notify = Arc::new(Notify::new());
                slot.insert(notify.clone());
                Some(notify)
            }
        }
    }

    async fn build_and_publish<E, F, Fut>(&self, key: K, build: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        let Some(notify) = self.claim_pending_slot(&key) else {
            return build().await;
        };
        let result = build().await;
        if let Ok(v) = &result {
            self.cache.insert(key.clone(), v.clone());
        }
        self.pending.remove(&key);
        notify.notify_waiters();
        result
    }
}

/// Owns the two agent caches and their single-flight dedup maps. Construction
/// (resolving provider/model, assembling the tool registry and system prompt)
/// is the caller's responsibility via the `build` closures passed to
/// `get_or_build_agent`/`get_or_build_chat_agent` - this type only owns
/// eviction and dedup policy.
pub struct AgentCacheManager<A, C> {
    agents: SingleFlightCache<String, A>,
    chat_agents: SingleFlightCache<(String, String), C>,
}

impl<A, C> Default for AgentCacheManager<A, C>
where
    A: Clone,
    C: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<A, C> AgentCacheManager<A, C>
where
    A: Clone,
    C: Clone,
{
    pub fn new() -> Self {
        Self {
            agents: SingleFlightCache::new(AGENT_CACHE_CAPACITY),
            chat_agents: SingleFlightCache::new(CHAT_AGENT_CACHE_CAPACITY),
        }
    }

    pub async fn get_or_build_agent<E, F, Fut>(&self, agent_id: impl Into<String>, build: F) -> Result<A, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<A, E>>,
    {
        self.agents.get_or_build(agent_id.into(), build).await
    }

    pub async fn get_or_build_chat_agent<E, F, Fut>(
        &self,
        provider: impl Into<String>,
        model: impl Into<String>,
        build: F,
    ) -> Result<C, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<C, E>>,
    {
        self.chat_agents.get_or_build((provider.into(), model.into()), build).await
    }

    /// Drops everything from both caches (and both pending maps). Used on
    /// tool-registry or config changes that invalidate every constructed agent.
    pub fn invalidate_all(&self) {
        self.agents.clear();
        self.chat_agents.clear();
    }

    pub fn agent_count(&self) -> usize {
        self.agents.cache.len()
    }

    pub fn chat_agent_count(&self) -> usize {
        self.chat_agents.cache.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// **Scenario**: inserting past capacity evicts the oldest entry, not the newest.
    #[test]
    fn fifo_cache_evicts_oldest_past_capacity() {
        let cache: FifoCache<u32, &'static str> = FifoCache::new(2);
        cache.insert(1, "a");
        cache.insert(2, "b");
        cache.insert(3, "c");
        assert_eq!(cache.get(&1), None);
        assert_eq!(cache.get(&2), Some("b"));
        assert_eq!(cache.get(&3), Some("c"));
    }

    /// **Scenario**: a cache hit never invokes `build`.
    #[tokio::test]
    async fn cache_hit_skips_build() {
        let cache: SingleFlightCache<String, u32> = SingleFlightCache::new(10);
        cache.cache.insert("k".to_string(), 7);
        let calls = Arc::new(AtomicUsize::new(0));
        let c = calls.clone();
        let v: Result<u32, String> = cache
            .get_or_build("k".to_string(), move || async move {
                c.fetch_add(1, Ordering::SeqCst);
                Ok(99)
            })
            .await;
        assert_eq!(v.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    /// **Scenario**: two concurrent misses for the same key only run `build` once.
    #[tokio::test]
    async fn concurrent_misses_share_one_build() {
        let cache: Arc<SingleFlightCache<String, u32>> = Arc::new(SingleFlightCache::new(10));
        let calls = Arc::new(AtomicUsize::new(0));

        let c1 = cache.clone();
        let n1 = calls.clone();
        let t1 = tokio::spawn(async move {
            c1.get_or_build::<String, _, _>("shared".to_string(), move || async move {
                n1.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(30)).await;
                Ok(42)
            })
            .await
        });

        tokio::time::sleep(Duration::from_millis(5)).await;

        let c2 = cache.clone();
        let n2 = calls.clone();
        let t2 = tokio::spawn(async move {
            c2.get_or_build::<String, _, _>("shared".to_string(), move || async move {
                n2.fetch_add(1, Ordering::SeqCst);
                Ok(0)
            })
            .await
        });

        let (r1, r2) = tokio::join!(t1, t2);
        assert_eq!(r1.unwrap().unwrap(), 42);
        assert_eq!(r2.unwrap().unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    /// **Scenario**: `invalidate_all` drops cached entries from both caches.
    #[test]
    fn invalidate_all_clears_both_caches() {
        let manager: AgentCacheManager<u32, u32> = AgentCacheManager::new();
        manager.agents.cache.insert("a".to_string(), 1);
        manager.chat_agents.cache.insert(("p".to_string(), "m".to_string()), 2);
        manager.invalidate_all();
        assert_eq!(manager.agent_count(), 0);
        assert_eq!(manager.chat_agent_count(), 0);
    }
}
