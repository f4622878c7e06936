//! Short-TTL market data cache (§4.9): `get` misses on absence or
//! expiry, `set` evicts the oldest-by-insertion entry once the cache is
//! full, and a background sweeper purges expired entries on its own
//! cadence. Every operation is safe under concurrent access.

use std::collections::VecDeque;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;

use common::Ts;

use crate::compressor::{Compressor, RunLengthCompressor};
use crate::config::CacheConfig;

struct CacheEntry {
    data: Vec<u8>,
    compressed: bool,
    expires_at: Ts,
    seq: u64,
}

/// A TTL'd, size-bounded cache keyed by `K`, storing `V` serialized
/// through `serde_json` so large entries can be transparently
/// compressed. `K`/`V` are left generic rather than fixed to one market
/// data shape, since §4.9 describes the cache mechanics independent of
/// payload type (quotes, bars, and indicator values all pass through it
/// in §4.11's processor chain).
pub struct MarketDataCache<K, V> {
    entries: DashMap<K, CacheEntry>,
    insertion_order: Mutex<VecDeque<(u64, K)>>,
    next_seq: AtomicU64,
    config: CacheConfig,
    compressor: Arc<dyn Compressor>,
    _value: std::marker::PhantomData<fn() -> V>,
}

impl<K, V> MarketDataCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    /// An empty cache using the default [`RunLengthCompressor`].
    #[must_use]
    pub fn new(config: CacheConfig) -> Self {
        Self::with_compressor(config, Arc::new(RunLengthCompressor))
    }

    /// An empty cache using a caller-supplied compressor.
    #[must_use]
    pub fn with_compressor(config: CacheConfig, compressor: Arc<dyn Compressor>) -> Self {
        Self {
            entries: DashMap::new(),
            insertion_order: Mutex::new(VecDeque::new()),
            next_seq: AtomicU64::new(0),
            config,
            compressor,
            _value: std::marker::PhantomData,
        }
    }

    /// `None` on a miss (absent or expired); expired entries are removed
    /// lazily on the read that discovers them.
    #[must_use]
    pub fn get(&self, key: &K) -> Option<V> {
        let now = Ts::now();
        let hit = {
            let entry = self.entries.get(key)?;
            if now.as_millis() >= entry.expires_at.as_millis() {
                None
            } else {
                let raw =
                    if entry.compressed { self.compressor.decompress(&entry.data) } else { entry.data.clone() };
                Some(raw)
            }
        };

        match hit {
            Some(raw) => serde_json::from_slice(&raw).ok(),
            None => {
                self.entries.remove(key);
                None
            }
        }
    }

    /// Insert/overwrite `key`, evicting the oldest entry first if the
    /// cache is already at [`CacheConfig::max_size`]. Values whose
    /// serialized size is at or above `compress_threshold_bytes` are
    /// compressed before being stored.
    pub fn set(&self, key: K, value: &V) {
        if self.entries.len() >= self.config.max_size && !self.entries.contains_key(&key) {
            self.evict_oldest();
        }

        let raw = serde_json::to_vec(value).unwrap_or_default();
        let compressed = raw.len() >= self.config.compress_threshold_bytes;
        let data = if compressed { self.compressor.compress(&raw) } else { raw };

        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let expires_at = Ts::from_millis(Ts::now().as_millis() + self.config.ttl_ms);

        let is_new = self.entries.insert(key.clone(), CacheEntry { data, compressed, expires_at, seq }).is_none();
        if is_new {
            self.insertion_order.lock().push_back((seq, key));
        }
    }

    fn evict_oldest(&self) {
        let mut order = self.insertion_order.lock();
        while let Some((seq, key)) = order.pop_front() {
            if let Some(entry) = self.entries.get(&key) {
                if entry.seq != seq {
                    // superseded by a later re-insert under the same key; keep looking
                    continue;
                }
            } else {
                continue;
            }
            self.entries.remove(&key);
            return;
        }
    }

    /// Remove every expired entry. Intended to run on
    /// [`CacheConfig::cleanup_interval_ms`] cadence.
    pub fn sweep_expired(&self) {
        let now = Ts::now();
        self.entries.retain(|_, entry| now.as_millis() < entry.expires_at.as_millis());
    }

    /// Current entry count, including not-yet-swept expired entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K, V> MarketDataCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    /// Spawn the background sweeper on the current Tokio runtime. The
    /// returned handle may be aborted to stop it.
    pub fn spawn_sweeper(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let cache = Arc::clone(self);
        let interval_ms = cache.config.cleanup_interval_ms;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(std::time::Duration::from_millis(interval_ms));
            loop {
                ticker.tick().await;
                cache.sweep_expired();
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn miss_on_absent_key() {
        let cache: MarketDataCache<&str, i32> = MarketDataCache::new(CacheConfig::default());
        assert_eq!(cache.get(&"k"), None);
    }

    #[test]
    fn hit_returns_the_stored_value() {
        let cache: MarketDataCache<&str, i32> = MarketDataCache::new(CacheConfig::default());
        cache.set("k", &42);
        assert_eq!(cache.get(&"k"), Some(42));
    }

    #[test]
    fn expired_entry_is_a_miss_and_is_removed() {
        let cache: MarketDataCache<&str, i32> =
            MarketDataCache::new(CacheConfig { ttl_ms: 0, ..CacheConfig::default() });
        cache.set("k", &42);
        std::thread::sleep(std::time::Duration::from_millis(5));
        assert_eq!(cache.get(&"k"), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn eviction_removes_oldest_by_insertion_once_full() {
        let cache: MarketDataCache<i32, i32> =
            MarketDataCache::new(CacheConfig { max_size: 2, ..CacheConfig::default() });
        cache.set(1, &1);
        cache.set(2, &2);
        cache.set(3, &3);

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&1), None, "oldest entry should have been evicted");
        assert_eq!(cache.get(&2), Some(2));
        assert_eq!(cache.get(&3), Some(3));
    }

    #[test]
    fn large_values_are_compressed_and_still_round_trip() {
        let cache: MarketDataCache<&str, Vec<u8>> =
            MarketDataCache::new(CacheConfig { compress_threshold_bytes: 16, ..CacheConfig::default() });
        let big = vec![9u8; 500];
        cache.set("blob", &big);
        assert_eq!(cache.get(&"blob"), Some(big));
    }

    #[tokio::test]
    async fn sweeper_purges_expired_entries_in_the_background() {
        let cache = Arc::new(MarketDataCache::<&str, i32>::new(CacheConfig {
            ttl_ms: 5,
            cleanup_interval_ms: 10,
            ..CacheConfig::default()
        }));
        cache.set("k", &1);
        let handle = cache.spawn_sweeper();
        tokio::time::sleep(std::time::Duration::from_millis(60)).await;
        handle.abort();
        assert!(cache.is_empty());
    }
}
