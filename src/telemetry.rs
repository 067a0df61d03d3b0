//! Per-request counters and step timing (spec §3 "Per-request counters", §9).
//!
//! There is no implicit task-local scope threaded automatically here (spec §9
//! design notes): every cache/HTTP call that should account against a request
//! takes a `&Telemetry` explicitly, the way the teacher's services take a
//! `&DatabaseConnection` rather than reach into ambient state.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::models::RequestCounters;

/// Cheaply cloneable, race-free by construction: each request owns its own instance.
#[derive(Clone, Default)]
pub struct Telemetry {
    inner: Arc<Counters>,
}

#[derive(Default)]
struct Counters {
    memory_hits: AtomicU64,
    pg_hits: AtomicU64,
    pg_misses: AtomicU64,
    api_calls: AtomicU64,
    pg_time_ms: AtomicU64,
    api_time_ms: AtomicU64,
}

impl Telemetry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_memory_hit(&self) {
        self.inner.memory_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_pg_hit(&self, elapsed_ms: u64) {
        self.inner.pg_hits.fetch_add(1, Ordering::Relaxed);
        self.inner.pg_time_ms.fetch_add(elapsed_ms, Ordering::Relaxed);
    }

    pub fn record_pg_miss(&self, elapsed_ms: u64) {
        self.inner.pg_misses.fetch_add(1, Ordering::Relaxed);
        self.inner.pg_time_ms.fetch_add(elapsed_ms, Ordering::Relaxed);
    }

    pub fn record_api_call(&self, elapsed_ms: u64) {
        self.inner.api_calls.fetch_add(1, Ordering::Relaxed);
        self.inner.api_time_ms.fetch_add(elapsed_ms, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> RequestCounters {
        RequestCounters {
            memory_hits: self.inner.memory_hits.load(Ordering::Relaxed),
            pg_hits: self.inner.pg_hits.load(Ordering::Relaxed),
            pg_misses: self.inner.pg_misses.load(Ordering::Relaxed),
            api_calls: self.inner.api_calls.load(Ordering::Relaxed),
            pg_time_ms: self.inner.pg_time_ms.load(Ordering::Relaxed),
            api_time_ms: self.inner.api_time_ms.load(Ordering::Relaxed),
        }
    }
}

/// Times a fallible async block and logs it under `step`, matching the teacher's
/// `tracing::debug!` breadcrumb style in its service layer.
pub async fn timed_step<F, Fut, T>(step: &'static str, f: F) -> T
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = T>,
{
    let start = Instant::now();
    let result = f().await;
    tracing::debug!(step, elapsed_ms = start.elapsed().as_millis() as u64, "pipeline step complete");
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_start_at_zero_and_accumulate() {
        let t = Telemetry::new();
        assert_eq!(t.snapshot().memory_hits, 0);
        t.record_memory_hit();
        t.record_memory_hit();
        t.record_pg_hit(5);
        t.record_api_call(10);
        let snap = t.snapshot();
        assert_eq!(snap.memory_hits, 2);
        assert_eq!(snap.pg_hits, 1);
        assert_eq!(snap.pg_time_ms, 5);
        assert_eq!(snap.api_calls, 1);
        assert_eq!(snap.api_time_ms, 10);
    }

    #[test]
    fn clones_share_the_same_counters() {
        let t = Telemetry::new();
        let t2 = t.clone();
        t2.record_memory_hit();
        assert_eq!(t.snapshot().memory_hits, 1);
    }
}
