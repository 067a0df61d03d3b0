//! `GET /api/v1/library/search` (spec §6): a thin pass-through to the
//! three-level library cascade (spec §4.3), for callers that want raw catalog
//! results without the lookup orchestrator's strategy pipeline.

use axum::{extract::Query, extract::State, Json};
use serde::Deserialize;

use crate::error::Result;
use crate::models::{LibraryItem, SearchOpts};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct LibrarySearchQuery {
    q: String,
    limit: Option<usize>,
}

pub async fn search(
    State(state): State<AppState>,
    Query(query): Query<LibrarySearchQuery>,
) -> Result<Json<Vec<LibraryItem>>> {
    let opts = SearchOpts {
        limit: query.limit.unwrap_or(50),
        ..Default::default()
    };
    let results = state.library.search(&query.q, &opts).await?;
    Ok(Json(results))
}
