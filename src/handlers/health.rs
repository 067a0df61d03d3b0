//! `GET /health` (spec §6): probes all three backends in parallel with a 3s
//! per-probe timeout. Catalog unreachable is `unhealthy` (503); upstream API or
//! persistent cache unreachable alone is `degraded` (200); otherwise `healthy`.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use serde_json::json;

use crate::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
enum Status {
    Healthy,
    Degraded,
    Unhealthy,
}

pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let catalog_ok = state.library.health_check().await.is_ok();
    let (persistent_ok, upstream_ok) = state.metadata.health().await;

    let status = if !catalog_ok {
        Status::Unhealthy
    } else if !persistent_ok || !upstream_ok {
        Status::Degraded
    } else {
        Status::Healthy
    };

    let http_status = if status == Status::Unhealthy {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };

    (
        http_status,
        Json(json!({
            "status": status,
            "services": {
                "catalog": if catalog_ok { "healthy" } else { "unhealthy" },
                "persistent_cache": if persistent_ok { "healthy" } else { "degraded" },
                "upstream_api": if upstream_ok { "healthy" } else { "degraded" },
            }
        })),
    )
}
