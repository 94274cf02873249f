//! In-memory response cache with TTL expiry and LRU eviction.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::RwLock;
use std::time::Instant;

use bytes::Bytes;
use lru::LruCache;
use tracing::debug;

use crate::infra::telemetry::{
    CACHE_CLEAR_TOTAL, CACHE_EVICT_TOTAL, CACHE_EXPIRED_TOTAL, CACHE_HIT_TOTAL, CACHE_MISS_TOTAL,
};

use super::config::CacheConfig;
use super::lock::{rw_read, rw_write};

const SOURCE: &str = "cache::store";

/// Identifies one cached response: request path plus a hash of the query string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResponseKey {
    pub path: String,
    pub query_hash: u64,
}

impl ResponseKey {
    pub fn new(path: &str, query: Option<&str>) -> Self {
        Self {
            path: path.to_string(),
            query_hash: hash_query(query.unwrap_or("")),
        }
    }
}

fn hash_query(query: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    query.hash(&mut hasher);
    hasher.finish()
}

#[derive(Debug, Clone)]
pub struct CachedResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

struct Entry {
    response: CachedResponse,
    stored_at: Instant,
}

/// Explicit cache service handed to the HTTP layer.
///
/// Entries live until their TTL elapses, capacity pushes them out, or
/// [`ResponseCache::clear`] drops everything.
pub struct ResponseCache {
    config: CacheConfig,
    entries: RwLock<LruCache<ResponseKey, Entry>>,
}

impl ResponseCache {
    pub fn new(config: CacheConfig) -> Self {
        let capacity = config.capacity_non_zero();
        Self {
            config,
            entries: RwLock::new(LruCache::new(capacity)),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    pub fn get(&self, key: &ResponseKey) -> Option<CachedResponse> {
        self.get_at(key, Instant::now())
    }

    fn get_at(&self, key: &ResponseKey, now: Instant) -> Option<CachedResponse> {
        let mut entries = rw_write(&self.entries, SOURCE, "get");
        let expired = match entries.get(key) {
            Some(entry) if now.saturating_duration_since(entry.stored_at) < self.config.ttl => {
                metrics::counter!(CACHE_HIT_TOTAL).increment(1);
                return Some(entry.response.clone());
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            entries.pop(key);
            metrics::counter!(CACHE_EXPIRED_TOTAL).increment(1);
        }
        metrics::counter!(CACHE_MISS_TOTAL).increment(1);
        None
    }

    /// Store a response. Returns the key evicted to make room, if any.
    pub fn set(&self, key: ResponseKey, response: CachedResponse) -> Option<ResponseKey> {
        self.set_at(key, response, Instant::now())
    }

    fn set_at(
        &self,
        key: ResponseKey,
        response: CachedResponse,
        now: Instant,
    ) -> Option<ResponseKey> {
        let entry = Entry {
            response,
            stored_at: now,
        };
        let evicted = rw_write(&self.entries, SOURCE, "set")
            .push(key.clone(), entry)
            .map(|(evicted_key, _)| evicted_key)
            .filter(|evicted_key| *evicted_key != key);

        if let Some(evicted_key) = &evicted {
            metrics::counter!(CACHE_EVICT_TOTAL).increment(1);
            debug!(
                target = SOURCE,
                path = %evicted_key.path,
                "evicted cached response"
            );
        }
        evicted
    }

    /// Drop every cached response.
    pub fn clear(&self) {
        rw_write(&self.entries, SOURCE, "clear").clear();
        metrics::counter!(CACHE_CLEAR_TOTAL).increment(1);
        debug!(target = SOURCE, "response cache cleared");
    }

    pub fn len(&self) -> usize {
        rw_read(&self.entries, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn response(body: &'static str) -> CachedResponse {
        CachedResponse {
            status: 200,
            headers: vec![("content-type".to_string(), "application/json".to_string())],
            body: Bytes::from_static(body.as_bytes()),
        }
    }

    fn cache(ttl: Duration, capacity: usize) -> ResponseCache {
        ResponseCache::new(CacheConfig {
            enabled: true,
            ttl,
            capacity,
        })
    }

    #[test]
    fn fresh_entries_are_served() {
        let cache = cache(Duration::from_secs(20), 10);
        let key = ResponseKey::new("/", Some("page=2"));
        cache.set(key.clone(), response("cached"));

        let hit = cache.get(&key).expect("hit");
        assert_eq!(hit.body, Bytes::from_static(b"cached"));
        assert!(cache.get(&ResponseKey::new("/", None)).is_none());
    }

    #[test]
    fn entries_expire_after_ttl() {
        let cache = cache(Duration::from_secs(20), 10);
        let key = ResponseKey::new("/", None);
        let stored_at = Instant::now();
        cache.set_at(key.clone(), response("old"), stored_at);

        assert!(
            cache
                .get_at(&key, stored_at + Duration::from_secs(19))
                .is_some()
        );
        assert!(
            cache
                .get_at(&key, stored_at + Duration::from_secs(20))
                .is_none()
        );
        assert!(cache.is_empty());
    }

    #[test]
    fn clear_drops_everything() {
        let cache = cache(Duration::from_secs(20), 10);
        cache.set(ResponseKey::new("/", None), response("a"));
        cache.set(ResponseKey::new("/", Some("page=2")), response("b"));
        assert_eq!(cache.len(), 2);

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn capacity_evicts_least_recently_used() {
        let cache = cache(Duration::from_secs(20), 1);
        let first = ResponseKey::new("/", None);
        let second = ResponseKey::new("/", Some("page=2"));

        assert!(cache.set(first.clone(), response("a")).is_none());
        assert_eq!(cache.set(second, response("b")), Some(first.clone()));
        assert!(cache.get(&first).is_none());
    }

    #[test]
    fn replacing_a_key_is_not_an_eviction() {
        let cache = cache(Duration::from_secs(20), 1);
        let key = ResponseKey::new("/", None);
        cache.set(key.clone(), response("a"));
        assert!(cache.set(key.clone(), response("b")).is_none());
        assert_eq!(
            cache.get(&key).expect("hit").body,
            Bytes::from_static(b"b")
        );
    }
}
