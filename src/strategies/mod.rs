//! Strategy pipeline (spec §4.8): declarative, condition-gated search steps
//! executed in a fixed order over a shared `SearchState` accumulator.

mod artist_plus_album;
mod song_as_artist;
mod swapped_interpretation;
mod track_on_compilation;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::library::LibraryStore;
use crate::metadata_service::MetadataService;
use crate::models::{LookupRequest, SearchState, StrategyName};
use crate::telemetry::Telemetry;

pub use artist_plus_album::ArtistPlusAlbum;
pub use song_as_artist::SongAsArtist;
pub use swapped_interpretation::SwappedInterpretation;
pub use track_on_compilation::TrackOnCompilation;

/// Handles to collaborators a strategy's `execute` may need. Constructed once
/// per request, mirroring the teacher's constructor-injection services.
pub struct StrategyContext {
    pub library: Arc<LibraryStore>,
    pub metadata: Arc<MetadataService>,
    pub skip_cache: bool,
}

/// One named, condition-gated search operation (spec §4.8). `condition` is pure;
/// `execute` may perform I/O and mutates `state` in place.
#[async_trait]
pub trait Strategy: Send + Sync {
    fn name(&self) -> StrategyName;
    fn condition(&self, state: &SearchState, request: &LookupRequest) -> bool;
    async fn execute(
        &self,
        state: &mut SearchState,
        request: &LookupRequest,
        ctx: &StrategyContext,
        telemetry: &Telemetry,
    ) -> Result<()>;
}

/// Returns the four strategies in the declaration order from spec §4.8.
pub fn default_pipeline() -> Vec<Box<dyn Strategy>> {
    vec![
        Box::new(ArtistPlusAlbum),
        Box::new(SwappedInterpretation),
        Box::new(TrackOnCompilation),
        Box::new(SongAsArtist),
    ]
}

/// Runs `pipeline` over `state`, honoring the continuation predicate from spec §4.8:
/// a strategy that produces non-empty results without `song_not_found` stops the
/// pipeline; one that produces results but also sets `song_not_found` continues so
/// `TRACK_ON_COMPILATION` gets a chance to upgrade.
pub async fn run_pipeline(
    pipeline: &[Box<dyn Strategy>],
    state: &mut SearchState,
    request: &LookupRequest,
    ctx: &StrategyContext,
    telemetry: &Telemetry,
) -> Result<()> {
    for strategy in pipeline {
        if !strategy.condition(state, request) {
            continue;
        }
        state.strategies_tried.push(strategy.name());
        strategy.execute(state, request, ctx, telemetry).await?;

        if !state.results.is_empty() && !state.song_not_found {
            break;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LibraryItem;

    struct AlwaysHits;

    #[async_trait]
    impl Strategy for AlwaysHits {
        fn name(&self) -> StrategyName {
            "ALWAYS_HITS"
        }
        fn condition(&self, state: &SearchState, _request: &LookupRequest) -> bool {
            state.results.is_empty()
        }
        async fn execute(
            &self,
            state: &mut SearchState,
            _request: &LookupRequest,
            _ctx: &StrategyContext,
            _telemetry: &Telemetry,
        ) -> Result<()> {
            state.results.push(LibraryItem {
                id: 1,
                artist: "A".into(),
                title: "B".into(),
                call_letters: None,
                artist_call_number: None,
                release_call_number: None,
                genre: None,
                format: None,
            });
            state.search_type = crate::models::SearchType::Direct;
            Ok(())
        }
    }

    struct NeverRuns;

    #[async_trait]
    impl Strategy for NeverRuns {
        fn name(&self) -> StrategyName {
            "NEVER_RUNS"
        }
        fn condition(&self, state: &SearchState, _request: &LookupRequest) -> bool {
            state.results.is_empty()
        }
        async fn execute(
            &self,
            state: &mut SearchState,
            _request: &LookupRequest,
            _ctx: &StrategyContext,
            _telemetry: &Telemetry,
        ) -> Result<()> {
            state.strategies_tried.push("NEVER_RUNS_RAN");
            Ok(())
        }
    }

    fn test_context() -> StrategyContext {
        use crate::cache::TtlCache;
        use crate::discogs::DiscogsClient;
        use crate::persistent_cache::PersistentMetadataCache;
        use std::time::Duration;

        StrategyContext {
            library: Arc::new(LibraryStore::new("/nonexistent")),
            metadata: Arc::new(MetadataService::new(
                TtlCache::new(10, Duration::from_secs(60)),
                TtlCache::new(10, Duration::from_secs(60)),
                TtlCache::new(10, Duration::from_secs(60)),
                Arc::new(PersistentMetadataCache::disabled()),
                Arc::new(DiscogsClient::new("test-token".into(), 50, 5, 2)),
            )),
            skip_cache: false,
        }
    }

    #[tokio::test]
    async fn pipeline_stops_after_first_clean_hit() {
        let pipeline: Vec<Box<dyn Strategy>> = vec![Box::new(AlwaysHits), Box::new(NeverRuns)];
        let mut state = SearchState::default();
        let request = LookupRequest::default();
        let ctx = test_context();
        let telemetry = Telemetry::new();

        run_pipeline(&pipeline, &mut state, &request, &ctx, &telemetry).await.unwrap();

        assert_eq!(state.strategies_tried, vec!["ALWAYS_HITS"]);
        assert!(!state.results.is_empty());
    }
}
