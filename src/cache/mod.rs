//! Time-windowed cache layer.
//!
//! A bounded key/value store with per-entry TTL, insertion-order eviction,
//! lazy expiry on read and an eager periodic sweep. Contents are derived
//! data only and must always be rebuildable from the store.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde_json::Value;

/// Parameter name carrying the tenant tag in cache keys.
const TENANT_PARAM: &str = "companyId";

struct Entry {
    value: Value,
    expires_at: Instant,
}

struct CacheInner {
    entries: HashMap<String, Entry>,
    /// Insertion order, oldest first. Eviction pops from the front; this is
    /// deliberately not LRU.
    order: VecDeque<String>,
}

/// Bounded TTL cache, safe for concurrent access from request handlers.
pub struct TtlCache {
    capacity: usize,
    inner: Mutex<CacheInner>,
}

impl TtlCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: Mutex::new(CacheInner {
                entries: HashMap::new(),
                order: VecDeque::new(),
            }),
        }
    }

    /// Insert a value with a TTL. When at capacity, the oldest-inserted
    /// entry is evicted to make room.
    pub fn set(&self, key: &str, value: Value, ttl: Duration) {
        let mut inner = self.inner.lock().unwrap();

        if inner.entries.contains_key(key) {
            // Refresh in place; insertion order is unchanged.
            inner.entries.insert(
                key.to_string(),
                Entry {
                    value,
                    expires_at: Instant::now() + ttl,
                },
            );
            return;
        }

        while inner.entries.len() >= self.capacity {
            match inner.order.pop_front() {
                Some(oldest) => {
                    inner.entries.remove(&oldest);
                }
                None => break,
            }
        }

        inner.order.push_back(key.to_string());
        inner.entries.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    /// Look up a key. An expired entry reads as absent and is purged.
    pub fn get(&self, key: &str) -> Option<Value> {
        let mut inner = self.inner.lock().unwrap();

        let expired = match inner.entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => return Some(entry.value.clone()),
            Some(_) => true,
            None => false,
        };

        if expired {
            inner.entries.remove(key);
            inner.order.retain(|k| k != key);
        }
        None
    }

    /// Remove one key.
    pub fn delete(&self, key: &str) {
        let mut inner = self.inner.lock().unwrap();
        if inner.entries.remove(key).is_some() {
            inner.order.retain(|k| k != key);
        }
    }

    /// Remove all keys starting with `prefix`. With a tenant tag, only keys
    /// carrying that tenant's `companyId` parameter are removed. Returns the
    /// number of entries removed.
    ///
    /// Every write path that changes cached resources must call this right
    /// after a successful commit; a forgotten invalidation produces stale
    /// reads for the remainder of the TTL.
    pub fn invalidate_by_prefix(&self, prefix: &str, company_id: Option<&str>) -> usize {
        let mut inner = self.inner.lock().unwrap();
        let tenant_pair = company_id.map(|id| format!("{}={}", TENANT_PARAM, id));

        let doomed: Vec<String> = inner
            .entries
            .keys()
            .filter(|k| k.starts_with(prefix))
            .filter(|k| match &tenant_pair {
                Some(pair) => k.contains(pair.as_str()),
                None => true,
            })
            .cloned()
            .collect();

        for key in &doomed {
            inner.entries.remove(key);
        }
        inner.order.retain(|k| !doomed.contains(k));
        doomed.len()
    }

    /// Eagerly purge expired entries. Invoked periodically from bootstrap.
    pub fn sweep(&self) -> usize {
        let mut inner = self.inner.lock().unwrap();
        let now = Instant::now();

        let doomed: Vec<String> = inner
            .entries
            .iter()
            .filter(|(_, e)| e.expires_at <= now)
            .map(|(k, _)| k.clone())
            .collect();

        for key in &doomed {
            inner.entries.remove(key);
        }
        inner.order.retain(|k| !doomed.contains(k));
        doomed.len()
    }

    /// Number of live entries (including not-yet-purged expired ones).
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Build a deterministic cache key from an endpoint name and parameters.
/// Parameters are sorted so identical logical queries collide on the same
/// key regardless of argument order. The tenant belongs in a `companyId`
/// parameter so prefix invalidation can target it.
pub fn cache_key(endpoint: &str, params: &[(&str, &str)]) -> String {
    let mut sorted: Vec<(&str, &str)> = params.to_vec();
    sorted.sort();

    let mut key = endpoint.to_string();
    for (name, value) in sorted {
        key.push('|');
        key.push_str(name);
        key.push('=');
        key.push_str(value);
    }
    key
}
