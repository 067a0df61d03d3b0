//! Lookup orchestrator (spec §4.9): the six-step pipeline that turns a
//! `LookupRequest` into a `LookupResponse`, coordinating the library store,
//! strategy pipeline, and metadata service.

use std::sync::Arc;

use futures::stream::{self, StreamExt};

use crate::error::{AppError, Result};
use crate::fuzzy::{token_set_ratio, TRACK_MATCH_THRESHOLD};
use crate::library::LibraryStore;
use crate::metadata_service::MetadataService;
use crate::models::{
    Artwork, LibraryItem, LookupRequest, LookupResponse, LookupResultItem, SearchState, SearchType,
};
use crate::normalize::normalize;
use crate::strategies::{self, StrategyContext};
use crate::telemetry::{timed_step, Telemetry};

pub struct LookupOrchestrator {
    library: Arc<LibraryStore>,
    metadata: Arc<MetadataService>,
    fan_out_concurrency: usize,
}

impl LookupOrchestrator {
    pub fn new(library: Arc<LibraryStore>, metadata: Arc<MetadataService>, fan_out_concurrency: usize) -> Self {
        Self { library, metadata, fan_out_concurrency: fan_out_concurrency.max(1) }
    }

    pub async fn lookup(&self, request: LookupRequest, telemetry: &Telemetry) -> Result<LookupResponse> {
        let mut state = SearchState::default();
        let mut working_request = request.clone();

        // Step 1: artist correction.
        timed_step("artist_correction", || async {
            if let Some(artist) = &request.artist {
                match self.library.find_similar_artist(artist).await {
                    Ok(Some(corrected)) if &corrected != artist => {
                        state.corrected_artist = Some(corrected.clone());
                        working_request.artist = Some(corrected);
                    }
                    Ok(_) => {}
                    Err(AppError::StoreUnavailable(msg)) => return Err(AppError::StoreUnavailable(msg)),
                    Err(e) => tracing::warn!("artist correction failed: {e}"),
                }
            }
            Ok(())
        })
        .await?;

        // Step 2: album resolution.
        timed_step("album_resolution", || async {
            if let (Some(artist), Some(song)) = (&working_request.artist, &working_request.song) {
                if working_request.album.is_none() {
                    match self
                        .metadata
                        .search_releases_by_track(artist, song, request.skip_cache, telemetry)
                        .await
                    {
                        Ok(candidates) => {
                            let mut seen = std::collections::HashSet::new();
                            for candidate in candidates {
                                let key = normalize(&candidate.release.title);
                                if seen.insert(key) {
                                    state.resolved_albums.push(candidate.release.title);
                                }
                            }
                        }
                        Err(e) => tracing::warn!("album resolution failed: {e}"),
                    }
                }
            }
        })
        .await;

        // Step 3: strategy pipeline.
        timed_step("strategy_pipeline", || async {
            let pipeline = strategies::default_pipeline();
            let ctx = StrategyContext {
                library: self.library.clone(),
                metadata: self.metadata.clone(),
                skip_cache: request.skip_cache,
            };
            match strategies::run_pipeline(&pipeline, &mut state, &working_request, &ctx, telemetry).await {
                Ok(()) => Ok(()),
                Err(AppError::StoreUnavailable(msg)) => Err(AppError::StoreUnavailable(msg)),
                Err(e) => {
                    tracing::warn!("strategy pipeline step failed: {e}");
                    Ok(())
                }
            }
        })
        .await?;

        debug_assert!(state.invariant_holds(), "SearchState invariant violated after pipeline");

        // Step 4: track validation (only when the song was flagged missing upstream).
        let validated = timed_step("track_validation", || async {
            if state.song_not_found && working_request.song.is_some() {
                Some(self.validate_tracks(&state, &working_request, telemetry).await)
            } else {
                None
            }
        })
        .await;
        if let Some(results) = validated {
            state.results = results;
        }

        // Step 5: artwork fetch, bounded fan-out preserving input order.
        let result_items =
            timed_step("artwork_fetch", || async { self.fetch_artwork(&state, request.skip_cache, telemetry).await })
                .await;

        // Step 6: context message.
        let context_message =
            timed_step("context_message", || async { Some(Self::context_message(&state, &working_request)) }).await;

        Ok(LookupResponse {
            results: result_items,
            search_type: state.search_type,
            song_not_found: state.song_not_found,
            found_on_compilation: state.found_on_compilation,
            context_message,
            corrected_artist: state.corrected_artist,
            cache_stats: Some(telemetry.snapshot()),
        })
    }

    async fn validate_tracks(
        &self,
        state: &SearchState,
        request: &LookupRequest,
        telemetry: &Telemetry,
    ) -> Vec<LibraryItem> {
        let song = match &request.song {
            Some(s) => s.clone(),
            None => return state.results.clone(),
        };

        let bound = self.fan_out_concurrency;
        let metadata = self.metadata.clone();
        let external_titles = state.external_titles.clone();
        let skip_cache = request.skip_cache;
        let telemetry = telemetry.clone();

        let validated: Vec<Option<LibraryItem>> = stream::iter(state.results.clone())
            .map(|item| {
                let metadata = metadata.clone();
                let external_titles = external_titles.clone();
                let song = song.clone();
                let telemetry = telemetry.clone();
                async move {
                    // Locate the release the candidate itself corresponds to (via
                    // external_titles if the compilation strategy recorded one, else
                    // by the library item's own title/artist), then check whether
                    // that release's tracklist contains the requested song.
                    let release_title =
                        external_titles.get(&item.id).cloned().unwrap_or_else(|| item.title.clone());
                    let query = format!("{} {}", item.artist, release_title);
                    let release = metadata
                        .search(&query, skip_cache, &telemetry)
                        .await
                        .ok()
                        .and_then(|(releases, _)| releases.into_iter().next());

                    let survives = release
                        .map(|r| {
                            r.tracklist
                                .iter()
                                .any(|t| token_set_ratio(&t.title, &song) >= TRACK_MATCH_THRESHOLD)
                        })
                        .unwrap_or(false);

                    survives.then_some(item)
                }
            })
            .buffered(bound)
            .collect()
            .await;

        validated.into_iter().flatten().collect()
    }

    async fn fetch_artwork(
        &self,
        state: &SearchState,
        skip_cache: bool,
        telemetry: &Telemetry,
    ) -> Vec<LookupResultItem> {
        let bound = self.fan_out_concurrency;
        let metadata = self.metadata.clone();
        let external_titles = state.external_titles.clone();
        let telemetry = telemetry.clone();

        stream::iter(state.results.clone())
            .map(|item| {
                let metadata = metadata.clone();
                let external_titles = external_titles.clone();
                let telemetry = telemetry.clone();
                async move {
                    let title = external_titles.get(&item.id).cloned().unwrap_or_else(|| item.title.clone());
                    let query = format!("{} {}", item.artist, title);
                    let artwork = match metadata.search(&query, skip_cache, &telemetry).await {
                        Ok((releases, cached)) => releases.into_iter().next().map(|release| Artwork {
                            album: release.title.clone(),
                            artist: release.artist.clone(),
                            release_id: release.release_id,
                            release_url: release.release_url.clone(),
                            artwork_url: None,
                            confidence: token_set_ratio(&release.title, &title) as f64 / 100.0,
                            cached,
                        }),
                        Err(e) => {
                            tracing::warn!("artwork fetch failed for item {}: {e}", item.id);
                            None
                        }
                    };
                    LookupResultItem { library_item: item, artwork }
                }
            })
            .buffered(bound)
            .collect()
            .await
    }

    fn context_message(state: &SearchState, request: &LookupRequest) -> String {
        if let Some(corrected) = &state.corrected_artist {
            return format!("corrected artist to {corrected}");
        }
        match state.search_type {
            SearchType::Compilation => {
                let album = state.results.first().map(|r| r.title.as_str()).unwrap_or("a compilation");
                format!("found on compilation {album}")
            }
            SearchType::Swapped => {
                if let Some((a, b)) = request.raw_message.as_deref().and_then(crate::normalize::detect_ambiguous_format) {
                    format!("interpreted as {b} by {a} (swapped)")
                } else {
                    "interpreted as swapped artist/title".to_string()
                }
            }
            SearchType::SongAsArtist => "interpreted song field as artist".to_string(),
            SearchType::Direct if !state.results.is_empty() => "found directly".to_string(),
            _ => "no matches".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_message_prefers_corrected_artist() {
        let mut state = SearchState::default();
        state.corrected_artist = Some("Lucinda Williams".into());
        let request = LookupRequest::default();
        assert_eq!(
            LookupOrchestrator::context_message(&state, &request),
            "corrected artist to Lucinda Williams"
        );
    }

    #[test]
    fn context_message_reports_no_matches_by_default() {
        let state = SearchState::default();
        let request = LookupRequest::default();
        assert_eq!(LookupOrchestrator::context_message(&state, &request), "no matches");
    }

    #[test]
    fn context_message_reports_swapped_interpretation() {
        let mut state = SearchState::default();
        state.search_type = SearchType::Swapped;
        let request = LookupRequest {
            raw_message: Some("Guerilla Toss - Betty Dreams of Green Men".into()),
            ..Default::default()
        };
        assert_eq!(
            LookupOrchestrator::context_message(&state, &request),
            "interpreted as Betty Dreams of Green Men by Guerilla Toss (swapped)"
        );
    }
}
