//! Caches shared between resolutions.
//!
//! [`TtlCache`] backs the bootstrap snapshot and the authoritative WHOIS host
//! map. Expiry is measured against an injectable [`Clock`] so TTL behavior can
//! be tested without sleeping. [`ResultCache`] holds finished lookups for the
//! high-level client.

use crate::{config::Config, record::NormalizedRecord};
use moka::future::Cache;
use std::{
    collections::HashMap,
    hash::Hash,
    sync::{Arc, Mutex, RwLock},
    time::{Duration, Instant},
};
use tracing::{debug, warn};

/// Monotonic time source.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    offset: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut offset = match self.offset.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *offset += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        let offset = match self.offset.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        };
        self.origin + offset
    }
}

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

/// Key/value cache with per-entry expiry.
///
/// Values are cloned out on read, so callers storing large values should wrap
/// them in `Arc`. A reader sees either the previous whole value or the new one.
pub struct TtlCache<K, V> {
    entries: RwLock<HashMap<K, CacheEntry<V>>>,
    clock: Arc<dyn Clock>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone + std::fmt::Debug,
    V: Clone,
{
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            clock,
        }
    }

    /// Returns the value if present and not expired. Expired entries are evicted.
    pub fn get(&self, key: &K) -> Option<V> {
        let now = self.clock.now();
        {
            let entries = match self.entries.read() {
                Ok(guard) => guard,
                Err(poisoned) => {
                    warn!("Cache read lock poisoned, recovering");
                    poisoned.into_inner()
                }
            };
            match entries.get(key) {
                None => return None,
                Some(entry) if now < entry.expires_at => return Some(entry.value.clone()),
                Some(_) => {}
            }
        }

        let mut entries = match self.entries.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("Cache write lock poisoned, recovering");
                poisoned.into_inner()
            }
        };
        // Re-check: another writer may have refreshed the entry meanwhile
        if let Some(entry) = entries.get(key) {
            if now < entry.expires_at {
                return Some(entry.value.clone());
            }
            debug!(?key, "Evicting expired cache entry");
            entries.remove(key);
        }
        None
    }

    /// Returns the value even if it has expired.
    pub fn get_stale(&self, key: &K) -> Option<V> {
        let entries = match self.entries.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("Cache read lock poisoned, recovering");
                poisoned.into_inner()
            }
        };
        entries.get(key).map(|entry| entry.value.clone())
    }

    pub fn put(&self, key: K, value: V, ttl: Duration) {
        let expires_at = self.clock.now() + ttl;
        let mut entries = match self.entries.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("Cache write lock poisoned, recovering");
                poisoned.into_inner()
            }
        };
        entries.insert(key, CacheEntry { value, expires_at });
    }

    pub fn len(&self) -> usize {
        match self.entries.read() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Finished lookups keyed by normalized domain.
pub struct ResultCache {
    cache: Cache<String, NormalizedRecord>,
}

impl ResultCache {
    pub fn new(config: &Config) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.cache_max_entries)
            .time_to_live(Duration::from_secs(config.cache_ttl_seconds))
            .build();

        Self { cache }
    }

    pub async fn get(&self, domain: &str) -> Option<NormalizedRecord> {
        match self.cache.get(domain).await {
            Some(mut record) => {
                debug!("Cache hit for domain: {}", domain);
                record.cached = true;
                Some(record)
            }
            None => {
                debug!("Cache miss for domain: {}", domain);
                None
            }
        }
    }

    pub async fn insert(&self, domain: &str, record: &NormalizedRecord) {
        self.cache.insert(domain.to_string(), record.clone()).await;
        debug!("Cached record for domain: {}", domain);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_expires_after_ttl() {
        let clock = Arc::new(ManualClock::new());
        let cache: TtlCache<String, String> = TtlCache::new(clock.clone());

        cache.put("io".into(), "whois.nic.io".into(), Duration::from_secs(60));
        assert_eq!(cache.get(&"io".to_string()).as_deref(), Some("whois.nic.io"));

        clock.advance(Duration::from_secs(59));
        assert!(cache.get(&"io".to_string()).is_some());

        clock.advance(Duration::from_secs(1));
        assert!(cache.get(&"io".to_string()).is_none());
        assert!(cache.is_empty(), "expired entry should be evicted on read");
    }

    #[test]
    fn test_stale_read_survives_expiry() {
        let clock = Arc::new(ManualClock::new());
        let cache: TtlCache<&'static str, u32> = TtlCache::new(clock.clone());

        cache.put("snapshot", 7, Duration::from_secs(10));
        clock.advance(Duration::from_secs(11));

        assert_eq!(cache.get_stale(&"snapshot"), Some(7));
        assert_eq!(cache.get(&"snapshot"), None);
    }

    #[test]
    fn test_put_replaces_whole_value() {
        let cache: TtlCache<u8, Arc<Vec<u8>>> = TtlCache::new(Arc::new(SystemClock));
        cache.put(1, Arc::new(vec![1, 2]), Duration::from_secs(60));
        cache.put(1, Arc::new(vec![3]), Duration::from_secs(60));
        assert_eq!(*cache.get(&1).unwrap(), vec![3]);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_result_cache_flags_hits() {
        let cache = ResultCache::new(&Config::default());
        let record = NormalizedRecord::test_fixture("example.com");

        assert!(cache.get("example.com").await.is_none());
        cache.insert("example.com", &record).await;

        let hit = cache.get("example.com").await.unwrap();
        assert!(hit.cached);
        assert_eq!(hit.domain, "example.com");
    }
}
