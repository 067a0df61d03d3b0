use async_trait::async_trait;

use crate::error::Result;
use crate::fuzzy::{token_set_ratio, TRACK_MATCH_THRESHOLD};
use crate::models::{LookupRequest, SearchOpts, SearchState, SearchType, StrategyName};
use crate::telemetry::Telemetry;

use super::{Strategy, StrategyContext};

const MULTI_ARTIST_MARKERS: &[&str] = &["various", "various artists"];

/// Looks for the requested track on a multi-artist compilation release, then
/// finds that compilation in the library catalog (spec §4.8 `TRACK_ON_COMPILATION`).
pub struct TrackOnCompilation;

#[async_trait]
impl Strategy for TrackOnCompilation {
    fn name(&self) -> StrategyName {
        "TRACK_ON_COMPILATION"
    }

    fn condition(&self, state: &SearchState, request: &LookupRequest) -> bool {
        request.artist.is_some()
            && request.song.is_some()
            && (state.results.is_empty() || state.song_not_found)
    }

    async fn execute(
        &self,
        state: &mut SearchState,
        request: &LookupRequest,
        ctx: &StrategyContext,
        telemetry: &Telemetry,
    ) -> Result<()> {
        let artist = request.artist.as_deref().unwrap_or_default();
        let song = request.song.as_deref().unwrap_or_default();

        let candidates = ctx
            .metadata
            .search_releases_by_track(artist, song, ctx.skip_cache, telemetry)
            .await?;

        for candidate in &candidates {
            let release = &candidate.release;
            let is_multi_artist = MULTI_ARTIST_MARKERS.contains(&release.artist.to_lowercase().as_str())
                || release
                    .tracklist
                    .iter()
                    .any(|t| token_set_ratio(&t.title, song) >= TRACK_MATCH_THRESHOLD);

            if !is_multi_artist {
                continue;
            }

            let results = ctx.library.search(&release.title, &SearchOpts::default()).await?;
            if results.is_empty() {
                continue;
            }

            for item in &results {
                state.external_titles.insert(item.id, release.title.clone());
            }
            state.results = results;
            state.song_not_found = false;
            state.found_on_compilation = true;
            state.search_type = SearchType::Compilation;
            return Ok(());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discogs::DiscogsClient;
    use crate::persistent_cache::PersistentMetadataCache;
    use rusqlite::Connection;
    use std::sync::Arc;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn seed_compilation(path: &std::path::Path) {
        let conn = Connection::open(path).unwrap();
        conn.execute_batch(
            r#"
            CREATE TABLE library (
                id INTEGER PRIMARY KEY, artist TEXT NOT NULL, title TEXT NOT NULL,
                call_letters TEXT, artist_call_number TEXT, release_call_number TEXT,
                genre TEXT, format TEXT
            );
            CREATE VIRTUAL TABLE library_fts USING fts5(
                artist, title, content='library', content_rowid='id', tokenize='trigram'
            );
            INSERT INTO library (id, artist, title) VALUES (1, 'Various', 'Said I Had a Vision');
            INSERT INTO library_fts (rowid, artist, title) VALUES (1, 'Various', 'Said I Had a Vision');
            "#,
        )
        .unwrap();
    }

    #[test]
    fn multi_artist_marker_matches_case_insensitively() {
        assert!(MULTI_ARTIST_MARKERS.contains(&"various"));
    }

    #[tokio::test]
    async fn upgrades_state_when_compilation_found() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("library.db");
        seed_compilation(&path);

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/database/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "results": [{"id": 99, "title": "Said I Had a Vision", "resource_url": "x"}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/releases/99"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": 99,
                "title": "Said I Had a Vision",
                "artists": [{"name": "Various"}],
                "year": 1975,
                "tracklist": [{"position": "A1", "title": "Sweet Love of Mine", "duration": null}],
                "images": [],
                "uri": "https://example.test/release/99"
            })))
            .mount(&server)
            .await;

        let ctx = StrategyContext {
            library: Arc::new(crate::library::LibraryStore::new(&path)),
            metadata: Arc::new(crate::metadata_service::MetadataService::new(
                crate::cache::TtlCache::new(10, Duration::from_secs(60)),
                crate::cache::TtlCache::new(10, Duration::from_secs(60)),
                crate::cache::TtlCache::new(10, Duration::from_secs(60)),
                Arc::new(PersistentMetadataCache::disabled()),
                Arc::new(DiscogsClient::with_test_base_url(
                    server.uri(),
                    "test-token".into(),
                    1000,
                    5,
                    2,
                )),
            )),
            skip_cache: false,
        };

        let mut state = SearchState { song_not_found: true, ..Default::default() };
        let request = crate::models::LookupRequest {
            artist: Some("Brown Sugar Inc".into()),
            song: Some("Sweet Love of Mine".into()),
            album: None,
            raw_message: None,
            skip_cache: false,
        };
        let telemetry = Telemetry::new();

        TrackOnCompilation.execute(&mut state, &request, &ctx, &telemetry).await.unwrap();

        assert!(state.found_on_compilation);
        assert_eq!(state.search_type, SearchType::Compilation);
        assert!(!state.song_not_found);
        assert_eq!(state.external_titles.get(&1), Some(&"Said I Had a Vision".to_string()));
    }
}
