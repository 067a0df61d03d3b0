pub mod admin;
pub mod discogs;
pub mod health;
pub mod library;
pub mod lookup;

use axum::{
    routing::{get, post},
    Router,
};

use crate::state::AppState;

/// JSON API routes (spec §6 "Inbound HTTP surface"). Routing, deserialization,
/// and administrative auth are thin wrappers delegating to the core (spec §1
/// "Out of scope").
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/v1/lookup", post(lookup::lookup))
        .route("/v1/library/search", get(library::search))
        .route("/v1/discogs/search", post(discogs::search))
        .route("/v1/discogs/track-releases", get(discogs::track_releases))
        .route("/v1/discogs/release/:id", get(discogs::get_release))
        .route("/v1/admin/reload-catalog", post(admin::reload_catalog))
}
