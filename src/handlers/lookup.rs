//! `POST /api/v1/lookup` (spec §6): the primary entry point into the lookup
//! orchestrator. `?skip_cache=true` overrides the body field of the same name.

use axum::{extract::Query, extract::State, Json};
use serde::Deserialize;

use crate::error::{AppError, Result};
use crate::models::{LookupRequest, LookupResponse};
use crate::state::AppState;
use crate::telemetry::Telemetry;

#[derive(Debug, Deserialize)]
pub struct LookupQuery {
    #[serde(default)]
    skip_cache: Option<bool>,
}

pub async fn lookup(
    State(state): State<AppState>,
    Query(query): Query<LookupQuery>,
    Json(mut request): Json<LookupRequest>,
) -> Result<Json<LookupResponse>> {
    if let Some(skip_cache) = query.skip_cache {
        request.skip_cache = skip_cache;
    }

    if !request.is_valid() {
        return Err(AppError::InvalidInput(
            "at least one of artist, song, or album must be present".to_string(),
        ));
    }

    let telemetry = Telemetry::new();
    let response = state.orchestrator.lookup(request, &telemetry).await?;
    Ok(Json(response))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_request_with_no_searchable_fields() {
        let request = LookupRequest::default();
        assert!(!request.is_valid());
    }
}
