use async_trait::async_trait;

use crate::error::Result;
use crate::models::{LookupRequest, SearchOpts, SearchState, SearchType, StrategyName};
use crate::telemetry::Telemetry;

use super::{Strategy, StrategyContext};

/// Direct artist/album/song search, falling back from album to song to
/// artist-only (spec §4.8 `ARTIST_PLUS_ALBUM`).
pub struct ArtistPlusAlbum;

#[async_trait]
impl Strategy for ArtistPlusAlbum {
    fn name(&self) -> StrategyName {
        "ARTIST_PLUS_ALBUM"
    }

    fn condition(&self, _state: &SearchState, request: &LookupRequest) -> bool {
        request.artist.is_some() || request.album.is_some() || request.song.is_some()
    }

    async fn execute(
        &self,
        state: &mut SearchState,
        request: &LookupRequest,
        ctx: &StrategyContext,
        telemetry: &Telemetry,
    ) -> Result<()> {
        let albums: Vec<String> = if !state.resolved_albums.is_empty() {
            state.resolved_albums.clone()
        } else {
            request.album.iter().cloned().collect()
        };

        let opts = SearchOpts {
            artist_filter: request.artist.clone(),
            ..Default::default()
        };

        for album in &albums {
            let results = ctx.library.search(album, &opts).await?;
            if !results.is_empty() {
                state.results = results;
                state.search_type = SearchType::Direct;
                return Ok(());
            }
        }
        let _ = telemetry;

        if let Some(song) = &request.song {
            let results = ctx.library.search(song, &opts).await?;
            if !results.is_empty() {
                state.results = results;
                state.search_type = SearchType::Direct;
                return Ok(());
            }
        }

        if let Some(artist) = &request.artist {
            let artist_only_opts = SearchOpts { artist_filter: None, ..Default::default() };
            let results = ctx.library.search(artist, &artist_only_opts).await?;
            state.song_not_found = true;
            if !results.is_empty() {
                state.results = results;
                state.search_type = SearchType::Direct;
            }
        }

        Ok(())
    }
}
