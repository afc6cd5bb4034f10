//! Short-lived result cache for `GET /crime`.
//!
//! Entries are keyed by the validated query and expire after a fixed TTL.
//! Every insert sweeps out expired entries.
//! Two requests that miss at the same time may both populate the same key;
//! the later write wins.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use data_coyote_server_models::ApiIncident;

use crate::proxy::CrimeQuery;

/// How long a cached result stays fresh.
pub const CACHE_TTL: Duration = Duration::from_secs(60);

struct Entry {
    stored_at: Instant,
    incidents: Arc<Vec<ApiIncident>>,
}

/// Thread-safe TTL cache of reshaped incidents.
pub struct ResultCache {
    ttl: Duration,
    entries: Mutex<BTreeMap<CrimeQuery, Entry>>,
}

impl Default for ResultCache {
    fn default() -> Self {
        Self::new(CACHE_TTL)
    }
}

impl ResultCache {
    /// Creates an empty cache with the given TTL.
    #[must_use]
    pub const fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(BTreeMap::new()),
        }
    }

    /// Returns the fresh entry for `key`, if any.
    #[must_use]
    pub fn get(&self, key: CrimeQuery) -> Option<Arc<Vec<ApiIncident>>> {
        self.get_at(key, Instant::now())
    }

    /// Stores `incidents` under `key`.
    pub fn insert(&self, key: CrimeQuery, incidents: Arc<Vec<ApiIncident>>) {
        self.insert_at(key, incidents, Instant::now());
    }

    fn get_at(&self, key: CrimeQuery, now: Instant) -> Option<Arc<Vec<ApiIncident>>> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        match entries.get(&key) {
            Some(entry) if now.saturating_duration_since(entry.stored_at) < self.ttl => {
                Some(Arc::clone(&entry.incidents))
            }
            Some(_) => {
                entries.remove(&key);
                None
            }
            None => None,
        }
    }

    fn insert_at(&self, key: CrimeQuery, incidents: Arc<Vec<ApiIncident>>, now: Instant) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.retain(|_, entry| now.saturating_duration_since(entry.stored_at) < self.ttl);
        entries.insert(
            key,
            Entry {
                stored_at: now,
                incidents,
            },
        );
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn incidents(offense: &str) -> Arc<Vec<ApiIncident>> {
        Arc::new(vec![ApiIncident {
            datetime: None,
            offense: Some(offense.to_string()),
            latitude: None,
            longitude: None,
        }])
    }

    const KEY: CrimeQuery = CrimeQuery { days: 7, limit: 200 };

    #[test]
    fn hit_within_ttl() {
        let cache = ResultCache::default();
        let t0 = Instant::now();
        cache.insert_at(KEY, incidents("A"), t0);

        let hit = cache.get_at(KEY, t0 + Duration::from_secs(59)).unwrap();
        assert_eq!(hit[0].offense.as_deref(), Some("A"));
    }

    #[test]
    fn expires_after_ttl() {
        let cache = ResultCache::default();
        let t0 = Instant::now();
        cache.insert_at(KEY, incidents("A"), t0);

        assert!(cache.get_at(KEY, t0 + CACHE_TTL).is_none());
        // Expired entries are evicted on read.
        assert!(cache.get_at(KEY, t0).is_none());
    }

    #[test]
    fn insert_sweeps_expired_keys() {
        let cache = ResultCache::default();
        let t0 = Instant::now();
        for limit in 1..=1000 {
            cache.insert_at(CrimeQuery { days: 7, limit }, incidents("A"), t0);
        }
        assert_eq!(cache.len(), 1000);

        let later = t0 + Duration::from_secs(3600);
        cache.insert_at(CrimeQuery { days: 1, limit: 1 }, incidents("B"), later);
        assert_eq!(cache.len(), 1);
        assert!(cache.get_at(KEY, later).is_none());
    }

    #[test]
    fn insert_keeps_fresh_keys() {
        let cache = ResultCache::default();
        let t0 = Instant::now();
        cache.insert_at(KEY, incidents("A"), t0);

        let other = CrimeQuery { days: 1, limit: 1 };
        cache.insert_at(other, incidents("B"), t0 + Duration::from_secs(30));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn keys_are_distinct_per_query() {
        let cache = ResultCache::default();
        let t0 = Instant::now();
        cache.insert_at(KEY, incidents("A"), t0);

        let other = CrimeQuery { days: 7, limit: 100 };
        assert!(cache.get_at(other, t0).is_none());
    }

    #[test]
    fn later_insert_replaces_entry() {
        let cache = ResultCache::default();
        let t0 = Instant::now();
        cache.insert_at(KEY, incidents("A"), t0);
        cache.insert_at(KEY, incidents("B"), t0);

        let hit = cache.get_at(KEY, t0).unwrap();
        assert_eq!(hit[0].offense.as_deref(), Some("B"));
    }
}
