use async_trait::async_trait;

use crate::error::Result;
use crate::models::{LookupRequest, SearchOpts, SearchState, SearchType, StrategyName};
use crate::telemetry::Telemetry;

use super::{Strategy, StrategyContext};

/// Last resort: treats the song field as if it were an artist name, for
/// one-word mononym acts mistakenly entered as a song (spec §4.8 `SONG_AS_ARTIST`).
pub struct SongAsArtist;

#[async_trait]
impl Strategy for SongAsArtist {
    fn name(&self) -> StrategyName {
        "SONG_AS_ARTIST"
    }

    fn condition(&self, state: &SearchState, request: &LookupRequest) -> bool {
        state.results.is_empty() && request.song.is_some() && request.artist.is_none()
    }

    async fn execute(
        &self,
        state: &mut SearchState,
        request: &LookupRequest,
        ctx: &StrategyContext,
        _telemetry: &Telemetry,
    ) -> Result<()> {
        let song = request.song.as_deref().unwrap_or_default();
        let results = ctx.library.search(song, &SearchOpts::default()).await?;
        if !results.is_empty() {
            state.results = results;
            state.search_type = SearchType::SongAsArtist;
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
            INSERT INTO library (id, artist, title) VALUES (1, 'Deee-Lite', 'World Clique');
            INSERT INTO library_fts (rowid, artist, title) VALUES (1, 'Deee-Lite', 'World Clique');
            "#,
        )
        .unwrap();
    }

    #[tokio::test]
    async fn matches_mononym_entered_as_song() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("library.db");
        seed(&path);

        let ctx = StrategyContext {
            library: Arc::new(crate::library::LibraryStore::new(&path)),
            metadata: Arc::new(crate::metadata_service::MetadataService::new(
                crate::cache::TtlCache::new(10, Duration::from_secs(60)),
                crate::cache::TtlCache::new(10, Duration::from_secs(60)),
                crate::cache::TtlCache::new(10, Duration::from_secs(60)),
                Arc::new(PersistentMetadataCache::disabled()),
                Arc::new(DiscogsClient::new("test-token".into(), 50, 5, 2)),
            )),
            skip_cache: false,
        };

        let request = LookupRequest {
            artist: None,
            song: Some("Deee-Lite".into()),
            album: None,
            raw_message: None,
            skip_cache: false,
        };
        let mut state = SearchState::default();
        let telemetry = Telemetry::new();

        SongAsArtist.execute(&mut state, &request, &ctx, &telemetry).await.unwrap();

        assert_eq!(state.search_type, SearchType::SongAsArtist);
        assert!(!state.results.is_empty());
    }

    #[test]
    fn condition_requires_absent_artist() {
        let state = SearchState::default();
        let with_artist = LookupRequest {
            artist: Some("X".into()),
            song: Some("Y".into()),
            ..Default::default()
        };
        assert!(!SongAsArtist.condition(&state, &with_artist));
    }
}
