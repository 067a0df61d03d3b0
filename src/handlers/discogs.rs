//! `/api/v1/discogs/*` (spec §6): direct access to the metadata service
//! façade, bypassing the lookup orchestrator's strategy pipeline.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;

use crate::error::{AppError, Result};
use crate::models::ExternalReleaseRef;
use crate::state::AppState;
use crate::telemetry::Telemetry;

#[derive(Debug, Deserialize)]
pub struct DiscogsSearchRequest {
    artist: Option<String>,
    track: Option<String>,
    q: Option<String>,
}

/// `POST /api/v1/discogs/search`: `{artist, track}` uses the track-resolution
/// path (spec §4.7 `search_releases_by_track`); `q` alone falls back to the
/// general-purpose `search` used for artwork lookups.
pub async fn search(
    State(state): State<AppState>,
    Json(body): Json<DiscogsSearchRequest>,
) -> Result<Json<Vec<ExternalReleaseRef>>> {
    let telemetry = Telemetry::new();

    let releases = match (body.artist.as_deref(), body.track.as_deref(), body.q.as_deref()) {
        (Some(artist), Some(track), _) => state
            .metadata
            .search_releases_by_track(artist, track, false, &telemetry)
            .await?
            .into_iter()
            .map(|scored| scored.release)
            .collect(),
        (_, _, Some(q)) => state.metadata.search(q, false, &telemetry).await?.0,
        _ => {
            return Err(AppError::InvalidInput(
                "either (artist, track) or q must be provided".to_string(),
            ))
        }
    };

    Ok(Json(releases))
}

#[derive(Debug, Deserialize)]
pub struct TrackReleasesQuery {
    artist: String,
    track: String,
}

/// `GET /api/v1/discogs/track-releases`.
pub async fn track_releases(
    State(state): State<AppState>,
    Query(query): Query<TrackReleasesQuery>,
) -> Result<Json<Vec<ExternalReleaseRef>>> {
    let telemetry = Telemetry::new();
    let releases = state
        .metadata
        .search_releases_by_track(&query.artist, &query.track, false, &telemetry)
        .await?
        .into_iter()
        .map(|scored| scored.release)
        .collect::<Vec<_>>();
    Ok(Json(releases))
}

/// `GET /api/v1/discogs/release/{id}`.
pub async fn get_release(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Option<ExternalReleaseRef>>> {
    let telemetry = Telemetry::new();
    let release = state.metadata.get_release(id, false, &telemetry).await?;
    Ok(Json(release))
}
