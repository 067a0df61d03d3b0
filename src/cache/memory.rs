//! Tier M: per-request in-memory TTL + size-bounded cache (spec §4.4).
//!
//! Three logical instances back the metadata service: `track_cache` (TTL 1h, cap
//! 1000), `release_cache` (TTL 4h, cap 500), `search_cache` (TTL 1h, cap 1000).
//! Backed by `moka::sync`, which does not suspend (spec §5: "the memory cache ...
//! does not suspend") and is safe under concurrent `get`/`set` without an
//! external lock (spec §5 "Locking discipline").

use moka::sync::Cache;
use std::time::Duration;

use crate::telemetry::Telemetry;

/// A single TTL + capacity bounded cache tier over values of type `T`.
#[derive(Clone)]
pub struct TtlCache<T: Clone + Send + Sync + 'static> {
    inner: Cache<String, T>,
}

impl<T: Clone + Send + Sync + 'static> TtlCache<T> {
    pub fn new(capacity: u64, ttl: Duration) -> Self {
        let inner = Cache::builder()
            .max_capacity(capacity)
            .time_to_live(ttl)
            .build();
        Self { inner }
    }

    /// Reads bypass entirely when `skip_cache` is set; a hit records `memory_hits`.
    pub fn get(&self, key: &str, skip_cache: bool, telemetry: &Telemetry) -> Option<T> {
        if skip_cache {
            return None;
        }
        let hit = self.inner.get(key);
        if hit.is_some() {
            telemetry.record_memory_hit();
        }
        hit
    }

    /// `None` writes are suppressed so negative results never poison the cache.
    pub fn set(&self, key: String, value: Option<T>, skip_cache: bool) {
        if skip_cache {
            return;
        }
        if let Some(v) = value {
            self.inner.insert(key, v);
        }
    }

    #[cfg(test)]
    pub fn entry_count(&self) -> u64 {
        self.inner.run_pending_tasks();
        self.inner.entry_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn telemetry() -> Telemetry {
        Telemetry::new()
    }

    #[test]
    fn set_then_get_round_trips() {
        let cache: TtlCache<String> = TtlCache::new(10, Duration::from_secs(60));
        let t = telemetry();
        cache.set("k".into(), Some("v".to_string()), false);
        assert_eq!(cache.get("k", false, &t), Some("v".to_string()));
        assert_eq!(t.snapshot().memory_hits, 1);
    }

    #[test]
    fn none_writes_are_suppressed() {
        let cache: TtlCache<String> = TtlCache::new(10, Duration::from_secs(60));
        cache.set("k".into(), None, false);
        assert_eq!(cache.get("k", false, &telemetry()), None);
    }

    #[test]
    fn skip_cache_bypasses_reads_and_writes() {
        let cache: TtlCache<String> = TtlCache::new(10, Duration::from_secs(60));
        cache.set("k".into(), Some("v".to_string()), true);
        assert_eq!(cache.get("k", true, &telemetry()), None);
        // And a normal read after a skipped write still misses.
        assert_eq!(cache.get("k", false, &telemetry()), None);
    }

    #[test]
    fn miss_does_not_record_a_hit() {
        let cache: TtlCache<String> = TtlCache::new(10, Duration::from_secs(60));
        let t = telemetry();
        assert_eq!(cache.get("missing", false, &t), None);
        assert_eq!(t.snapshot().memory_hits, 0);
    }
}
