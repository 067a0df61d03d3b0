//! Data model shared across the lookup core (spec §3).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Inbound lookup request. Fields are `None`, not empty strings, when absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LookupRequest {
    pub artist: Option<String>,
    pub song: Option<String>,
    pub album: Option<String>,
    pub raw_message: Option<String>,
    #[serde(default)]
    pub skip_cache: bool,
}

impl LookupRequest {
    /// Invariant: at least one searchable field must be present.
    pub fn is_valid(&self) -> bool {
        self.artist.is_some() || self.song.is_some() || self.album.is_some()
    }
}

/// A catalog entry, immutable within a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LibraryItem {
    pub id: i64,
    pub artist: String,
    pub title: String,
    pub call_letters: Option<String>,
    pub artist_call_number: Option<String>,
    pub release_call_number: Option<String>,
    pub genre: Option<String>,
    pub format: Option<String>,
}

/// A release record from the external metadata provider, identified by `release_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalReleaseRef {
    pub release_id: i64,
    pub release_url: String,
    pub title: String,
    pub artist: String,
    pub year: Option<i32>,
    pub tracklist: Vec<TrackRef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackRef {
    pub position: Option<String>,
    pub title: String,
    pub duration: Option<u32>,
}

/// Artwork attached to a surviving candidate after step 5 of the orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artwork {
    pub album: String,
    pub artist: String,
    pub release_id: i64,
    pub release_url: String,
    pub artwork_url: Option<String>,
    pub confidence: f64,
    pub cached: bool,
}

/// How a search resolved, attached to the final response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchType {
    Direct,
    Swapped,
    Compilation,
    SongAsArtist,
    None,
}

impl Default for SearchType {
    fn default() -> Self {
        SearchType::None
    }
}

/// Name of a strategy, recorded in `strategies_tried` in execution order.
pub type StrategyName = &'static str;

/// Pipeline accumulator threaded through the strategy chain (spec §3 "SearchState").
#[derive(Debug, Clone, Default)]
pub struct SearchState {
    pub results: Vec<LibraryItem>,
    pub song_not_found: bool,
    pub found_on_compilation: bool,
    pub search_type: SearchType,
    pub strategies_tried: Vec<StrategyName>,
    /// Overrides the catalog title when looking up artwork, keyed by `LibraryItem::id`.
    pub external_titles: HashMap<i64, String>,
    pub resolved_albums: Vec<String>,
    pub corrected_artist: Option<String>,
}

impl SearchState {
    /// Invariant: non-empty results imply a recorded search type.
    pub fn invariant_holds(&self) -> bool {
        if !self.results.is_empty() && self.search_type == SearchType::None {
            return false;
        }
        if self.found_on_compilation && !self.strategies_tried.contains(&"TRACK_ON_COMPILATION") {
            return false;
        }
        true
    }
}

/// Per-request telemetry/cache-accounting counters (spec §3, §4.9).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestCounters {
    pub memory_hits: u64,
    pub pg_hits: u64,
    pub pg_misses: u64,
    pub api_calls: u64,
    pub pg_time_ms: u64,
    pub api_time_ms: u64,
}

/// One surviving candidate plus its (optional) artwork, as returned to the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LookupResultItem {
    pub library_item: LibraryItem,
    pub artwork: Option<Artwork>,
}

/// Shape returned by the lookup orchestrator (spec §6 "LookupResponse").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LookupResponse {
    pub results: Vec<LookupResultItem>,
    pub search_type: SearchType,
    pub song_not_found: bool,
    pub found_on_compilation: bool,
    pub context_message: Option<String>,
    pub corrected_artist: Option<String>,
    pub cache_stats: Option<RequestCounters>,
}

/// Search-time options understood by the library store (spec §4.3).
#[derive(Debug, Clone)]
pub struct SearchOpts {
    pub fallback_to_like: bool,
    pub fallback_to_fuzzy: bool,
    pub limit: usize,
    pub artist_filter: Option<String>,
}

impl Default for SearchOpts {
    fn default() -> Self {
        Self {
            fallback_to_like: true,
            fallback_to_fuzzy: true,
            limit: 50,
            artist_filter: None,
        }
    }
}
