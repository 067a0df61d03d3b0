//! `POST /api/v1/admin/reload-catalog` (spec §6 "admin bearer token ... used by
//! the non-core upload endpoint"): gated by a bearer token compared against
//! `ADMIN_TOKEN`, this just drops the library store's cached connection so the
//! next query reopens the catalog file an external collaborator replaced.
//! Anything past that single check (who is allowed to replace the file, how
//! the upload itself happens) is out of scope (spec §1).

use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};

use crate::state::AppState;

pub async fn reload_catalog(State(state): State<AppState>, headers: HeaderMap) -> StatusCode {
    let Some(expected) = state.config.admin_token.as_deref() else {
        return StatusCode::NOT_FOUND;
    };

    let provided = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    if provided != Some(expected) {
        return StatusCode::UNAUTHORIZED;
    }

    state.library.invalidate();
    StatusCode::NO_CONTENT
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::library::LibraryStore;
    use crate::metadata_service::MetadataService;
    use crate::orchestrator::LookupOrchestrator;
    use crate::persistent_cache::PersistentMetadataCache;
    use crate::discogs::DiscogsClient;
    use crate::cache::TtlCache;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::NamedTempFile;

    fn state_with_token(token: Option<&str>) -> AppState {
        let catalog = NamedTempFile::new().unwrap();
        let library = Arc::new(LibraryStore::new(catalog.path()));
        let metadata = Arc::new(MetadataService::new(
            TtlCache::new(10, Duration::from_secs(60)),
            TtlCache::new(10, Duration::from_secs(60)),
            TtlCache::new(10, Duration::from_secs(60)),
            Arc::new(PersistentMetadataCache::disabled()),
            Arc::new(DiscogsClient::new("token".into(), 50, 5, 2)),
        ));
        let orchestrator = Arc::new(LookupOrchestrator::new(library.clone(), metadata.clone(), 8));
        let config = Config {
            server_host: "0.0.0.0".into(),
            server_port: 3000,
            discogs_api_token: "token".into(),
            persistent_cache_url: None,
            catalog_path: catalog.path().to_string_lossy().into_owned(),
            track_cache_ttl_secs: 60,
            track_cache_capacity: 10,
            release_cache_ttl_secs: 60,
            release_cache_capacity: 10,
            search_cache_ttl_secs: 60,
            search_cache_capacity: 10,
            rate_limit_per_minute: 50,
            rate_limit_concurrency: 5,
            max_retries: 2,
            log_level: "info".into(),
            admin_token: token.map(str::to_string),
        };
        AppState::new(library, metadata, orchestrator, config)
    }

    #[tokio::test]
    async fn missing_admin_token_disables_endpoint() {
        let state = state_with_token(None);
        let status = reload_catalog(State(state), HeaderMap::new()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn wrong_bearer_token_is_rejected() {
        let state = state_with_token(Some("secret"));
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, "Bearer wrong".parse().unwrap());
        let status = reload_catalog(State(state), headers).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn correct_bearer_token_invalidates_the_store() {
        let state = state_with_token(Some("secret"));
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, "Bearer secret".parse().unwrap());
        let status = reload_catalog(State(state), headers).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
    }
}
