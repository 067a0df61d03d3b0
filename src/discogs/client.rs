//! Rate-limited client for the external release API (spec §4.6). Throughput
//! is gated by a `governor` token bucket (R requests/minute), concurrency by
//! a semaphore (C in-flight), and transient failures are retried with
//! exponential backoff up to `MAX_RETRIES`.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::{Duration, Instant};

use governor::{clock::DefaultClock, state::direct::NotKeyed, state::InMemoryState, Quota, RateLimiter};
use reqwest::{Client, StatusCode};
use tokio::sync::Semaphore;

use crate::discogs::models::{DiscogsRelease, DiscogsSearchResponse};
use crate::error::{AppError, Result};
use crate::telemetry::Telemetry;

const API_BASE: &str = "https://api.discogs.com";

pub struct DiscogsClient {
    http: Client,
    token: String,
    base_url: String,
    rate_limiter: Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>,
    concurrency: Arc<Semaphore>,
    max_retries: u32,
}

impl DiscogsClient {
    pub fn new(token: String, requests_per_minute: u32, concurrency: usize, max_retries: u32) -> Self {
        Self::with_base_url(API_BASE.to_string(), token, requests_per_minute, concurrency, max_retries)
    }

    /// Used in tests to point at a local `wiremock` server instead of the real API.
    #[cfg(test)]
    pub fn with_test_base_url(
        base_url: String,
        token: String,
        requests_per_minute: u32,
        concurrency: usize,
        max_retries: u32,
    ) -> Self {
        Self::with_base_url(base_url, token, requests_per_minute, concurrency, max_retries)
    }

    fn with_base_url(
        base_url: String,
        token: String,
        requests_per_minute: u32,
        concurrency: usize,
        max_retries: u32,
    ) -> Self {
        let per_minute = NonZeroU32::new(requests_per_minute.max(1)).expect("clamped to >= 1");
        let quota = Quota::per_minute(per_minute);

        Self {
            http: Client::new(),
            token,
            base_url,
            rate_limiter: Arc::new(RateLimiter::direct(quota)),
            concurrency: Arc::new(Semaphore::new(concurrency.max(1))),
            max_retries,
        }
    }

    pub async fn search_release(
        &self,
        artist: &str,
        track: &str,
        telemetry: &Telemetry,
    ) -> Result<DiscogsSearchResponse> {
        let url = format!(
            "{}/database/search?artist={}&track={}&type=release",
            self.base_url,
            urlencode(artist),
            urlencode(track)
        );
        self.get_json(&url, telemetry).await
    }

    pub async fn get_release(&self, release_id: i64, telemetry: &Telemetry) -> Result<DiscogsRelease> {
        let url = format!("{}/releases/{release_id}", self.base_url);
        self.get_json(&url, telemetry).await
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        telemetry: &Telemetry,
    ) -> Result<T> {
        let mut attempt = 0;
        loop {
            // Gates are acquired strictly in the order (throughput -> concurrency)
            // and released in reverse (spec §5 "Locking discipline"): waiting on
            // the rate limiter never happens while holding a concurrency permit,
            // so a burst of callers can't starve the concurrency gate by queuing
            // on it before the token bucket has capacity.
            self.rate_limiter.until_ready().await;
            let _permit = self
                .concurrency
                .acquire()
                .await
                .map_err(|e| AppError::Internal(format!("upstream semaphore closed: {e}")))?;

            let started = Instant::now();
            let response = self
                .http
                .get(url)
                .header("Authorization", format!("Discogs token={}", self.token))
                .header("User-Agent", "LookupService/1.0")
                .send()
                .await;
            let elapsed_ms = started.elapsed().as_millis() as u64;
            telemetry.record_api_call(elapsed_ms);

            match response {
                Ok(resp) if resp.status().is_success() => {
                    return resp.json::<T>().await.map_err(AppError::from);
                }
                Ok(resp) if is_retryable(resp.status()) && attempt < self.max_retries => {
                    tracing::warn!(
                        status = %resp.status(),
                        attempt,
                        "upstream release API request retrying"
                    );
                    self.backoff(attempt).await;
                    attempt += 1;
                }
                Ok(resp) => {
                    let status = resp.status();
                    let body = resp.text().await.unwrap_or_default();
                    return Err(AppError::UpstreamError(format!(
                        "release API returned {status}: {body}"
                    )));
                }
                Err(e) if attempt < self.max_retries => {
                    tracing::warn!(error = %e, attempt, "upstream release API request failed, retrying");
                    self.backoff(attempt).await;
                    attempt += 1;
                }
                Err(e) => return Err(AppError::UpstreamError(format!("release API request failed: {e}"))),
            }
        }
    }

    /// Used by `/health` (spec §6): a bare reachability probe that bypasses the
    /// rate-limit and concurrency gates entirely, since a health check should
    /// never be starved by inbound lookup traffic.
    pub async fn health_check(&self) -> bool {
        let probe = self.http.get(&self.base_url).send();
        matches!(
            tokio::time::timeout(Duration::from_secs(3), probe).await,
            Ok(Ok(resp)) if resp.status().as_u16() < 500
        )
    }

    async fn backoff(&self, attempt: u32) {
        let secs = 2u64.saturating_pow(attempt);
        tokio::time::sleep(Duration::from_secs(secs)).await;
    }
}

fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

fn urlencode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => out.push(b as char),
            _ => out.push_str(&format!("%{b:02X}")),
        }
    }
    out
}
