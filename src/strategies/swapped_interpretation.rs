use async_trait::async_trait;

use crate::error::Result;
use crate::models::{LookupRequest, SearchOpts, SearchState, SearchType, StrategyName};
use crate::normalize::detect_ambiguous_format;
use crate::telemetry::Telemetry;

use super::{Strategy, StrategyContext};

/// Tries both readings of an ambiguous `"X - Y"` raw message: `X` as artist/`Y`
/// as title, then the reverse (spec §4.8 `SWAPPED_INTERPRETATION`).
pub struct SwappedInterpretation;

#[async_trait]
impl Strategy for SwappedInterpretation {
    fn name(&self) -> StrategyName {
        "SWAPPED_INTERPRETATION"
    }

    fn condition(&self, state: &SearchState, request: &LookupRequest) -> bool {
        state.results.is_empty()
            && request
                .raw_message
                .as_deref()
                .map(|m| detect_ambiguous_format(m).is_some())
                .unwrap_or(false)
    }

    async fn execute(
        &self,
        state: &mut SearchState,
        request: &LookupRequest,
        ctx: &StrategyContext,
        _telemetry: &Telemetry,
    ) -> Result<()> {
        let (part1, part2) = match request.raw_message.as_deref().and_then(detect_ambiguous_format) {
            Some(parts) => parts,
            None => return Ok(()),
        };

        // "part1 as artist": search blind on part1 alone. The library cascade's
        // full-text/token levels match against artist *or* title, so this finds
        // a release filed under that artist even when its title is unrelated
        // to part2 (e.g. part2 names a track, not the release).
        let direct = ctx.library.search(&part1, &SearchOpts::default()).await?;
        if !direct.is_empty() {
            state.results = direct;
            state.search_type = SearchType::Swapped;
            return Ok(());
        }

        // Swapped reading: part2 as artist.
        let swapped = ctx.library.search(&part2, &SearchOpts::default()).await?;
        if !swapped.is_empty() {
            state.results = swapped;
            state.search_type = SearchType::Swapped;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;
    use std::sync::Arc;

    fn seed(path: &std::path::Path) {
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
            INSERT INTO library (id, artist, title) VALUES (1, 'Guerilla Toss', 'Betty Dreams of Green Men');
            INSERT INTO library_fts (rowid, artist, title) VALUES (1, 'Guerilla Toss', 'Betty Dreams of Green Men');
            "#,
        )
        .unwrap();
    }

    fn test_context(library: crate::library::LibraryStore) -> StrategyContext {
        use crate::cache::TtlCache;
        use crate::discogs::DiscogsClient;
        use crate::persistent_cache::PersistentMetadataCache;
        use std::time::Duration;

        StrategyContext {
            library: Arc::new(library),
            metadata: Arc::new(crate::metadata_service::MetadataService::new(
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
    async fn recovers_correct_reading_of_ambiguous_message() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("library.db");
        seed(&path);
        let ctx = test_context(crate::library::LibraryStore::new(&path));
        let telemetry = Telemetry::new();

        let request = LookupRequest {
            artist: None,
            song: Some("Betty Dreams of Green Men".into()),
            album: None,
            raw_message: Some("Guerilla Toss - Betty Dreams of Green Men".into()),
            skip_cache: false,
        };
        let mut state = SearchState::default();

        SwappedInterpretation.execute(&mut state, &request, &ctx, &telemetry).await.unwrap();

        assert_eq!(state.search_type, SearchType::Swapped);
        assert!(!state.results.is_empty());
    }
}
