use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::{routing::get, Router};
use dotenvy::dotenv;
use tower_http::{compression::CompressionLayer, cors::Any, cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod cache;
mod catalog_watch;
mod config;
mod discogs;
mod error;
mod fuzzy;
mod handlers;
mod library;
mod metadata_service;
mod models;
mod normalize;
mod orchestrator;
mod persistent_cache;
mod state;
mod strategies;
mod telemetry;

use cache::TtlCache;
use config::Config;
use discogs::DiscogsClient;
use library::LibraryStore;
use metadata_service::MetadataService;
use orchestrator::LookupOrchestrator;
use persistent_cache::PersistentMetadataCache;
use state::AppState;

/// Concurrency bound for the orchestrator's track-validation and artwork-fetch
/// fan-outs (spec §4.9 steps 4–5); the true bound is enforced by the discogs
/// client's own semaphore (spec §4.6), this just avoids spawning more futures
/// than could ever run concurrently anyway.
const FAN_OUT_CONCURRENCY: usize = 8;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    let config = Config::from_env()?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            format!("lookup_service={},tower_http=info,axum=info", config.log_level).into()
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("starting lookup service");

    let library = Arc::new(LibraryStore::new(&config.catalog_path));

    let persistent = Arc::new(PersistentMetadataCache::connect(config.persistent_cache_url.as_deref()).await);
    tracing::info!(enabled = persistent.is_enabled(), "persistent metadata cache tier configured");

    let discogs = Arc::new(DiscogsClient::new(
        config.discogs_api_token.clone(),
        config.rate_limit_per_minute,
        config.rate_limit_concurrency,
        config.max_retries,
    ));

    let metadata = Arc::new(MetadataService::new(
        TtlCache::new(config.track_cache_capacity, config.track_cache_ttl()),
        TtlCache::new(config.release_cache_capacity, config.release_cache_ttl()),
        TtlCache::new(config.search_cache_capacity, config.search_cache_ttl()),
        persistent,
        discogs,
    ));

    let orchestrator = Arc::new(LookupOrchestrator::new(
        library.clone(),
        metadata.clone(),
        FAN_OUT_CONCURRENCY,
    ));

    // Keep the watcher handle alive for the process lifetime; dropping it stops
    // watching (spec §6 "The file is replaceable at runtime").
    let _catalog_watcher = match catalog_watch::start(library.clone(), &config.catalog_path) {
        Ok(watcher) => Some(watcher),
        Err(e) => {
            tracing::warn!("catalog file watcher failed to start: {e}");
            None
        }
    };

    let state = AppState::new(library, metadata, orchestrator, config.clone());

    let app = Router::new()
        .route("/health", get(handlers::health::health_check))
        .nest("/api", handlers::api_routes())
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "lookup service listening");

    axum::serve(listener, app).await?;

    Ok(())
}
