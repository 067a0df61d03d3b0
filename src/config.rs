use anyhow::{Context, Result};
use serde::Deserialize;
use std::env;
use std::time::Duration;

/// Environment configuration recognized by the service (spec §6).
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server_host: String,
    pub server_port: u16,

    /// Bearer token for the external release API. Required.
    pub discogs_api_token: String,
    /// `None` disables the persistent metadata cache tier; operations report miss.
    pub persistent_cache_url: Option<String>,
    /// Path to the catalog SQLite file. Absence is tolerated (`store_unavailable`).
    pub catalog_path: String,

    pub track_cache_ttl_secs: u64,
    pub track_cache_capacity: u64,
    pub release_cache_ttl_secs: u64,
    pub release_cache_capacity: u64,
    pub search_cache_ttl_secs: u64,
    pub search_cache_capacity: u64,

    /// Upstream requests allowed per minute (throughput gate, spec §4.6).
    pub rate_limit_per_minute: u32,
    /// Max in-flight upstream requests (concurrency gate, spec §4.6).
    pub rate_limit_concurrency: usize,
    pub max_retries: u32,

    pub log_level: String,
    /// Bearer token gating the non-core catalog-reload endpoint.
    pub admin_token: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .context("SERVER_PORT must be a valid port number")?,
            discogs_api_token: env::var("DISCOGS_API_TOKEN")
                .context("DISCOGS_API_TOKEN must be set")?,
            persistent_cache_url: env::var("PERSISTENT_CACHE_URL").ok(),
            catalog_path: env::var("CATALOG_PATH").unwrap_or_else(|_| "library.db".to_string()),
            track_cache_ttl_secs: parse_env_or("TRACK_CACHE_TTL_SECS", 3600)?,
            track_cache_capacity: parse_env_or("TRACK_CACHE_CAPACITY", 1000)?,
            release_cache_ttl_secs: parse_env_or("RELEASE_CACHE_TTL_SECS", 4 * 3600)?,
            release_cache_capacity: parse_env_or("RELEASE_CACHE_CAPACITY", 500)?,
            search_cache_ttl_secs: parse_env_or("SEARCH_CACHE_TTL_SECS", 3600)?,
            search_cache_capacity: parse_env_or("SEARCH_CACHE_CAPACITY", 1000)?,
            rate_limit_per_minute: parse_env_or("RATE_LIMIT_PER_MINUTE", 50)?,
            rate_limit_concurrency: parse_env_or("RATE_LIMIT_CONCURRENCY", 5)?,
            max_retries: parse_env_or("MAX_RETRIES", 2)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            admin_token: env::var("ADMIN_TOKEN").ok(),
        })
    }

    pub fn track_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.track_cache_ttl_secs)
    }

    pub fn release_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.release_cache_ttl_secs)
    }

    pub fn search_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.search_cache_ttl_secs)
    }
}

fn parse_env_or<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(v) => v
            .parse()
            .map_err(|e| anyhow::anyhow!("{key} must be valid: {e}")),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_env_or_falls_back_to_default() {
        std::env::remove_var("SOME_TOTALLY_UNSET_KEY_FOR_TEST");
        let v: u32 = parse_env_or("SOME_TOTALLY_UNSET_KEY_FOR_TEST", 42).unwrap();
        assert_eq!(v, 42);
    }
}
