//! Tier-cascading façade over the external release API (spec §4.5–§4.7): memory
//! cache (M) → persistent trigram cache (P) → upstream HTTP (H). A hit at any
//! tier writes back to every shallower tier; only H failures are soft (the
//! service degrades to "no candidates", never an error for the caller).

use std::sync::Arc;

use crate::cache::{derive_key, TtlCache};
use crate::discogs::DiscogsClient;
use crate::error::Result;
use crate::models::ExternalReleaseRef;
use crate::persistent_cache::PersistentMetadataCache;
use crate::telemetry::{timed_step, Telemetry};

/// Weight given to title similarity in the combined search confidence (spec §4.7);
/// the remainder (0.4) goes to artist similarity.
const TITLE_WEIGHT: f64 = 0.6;

pub struct MetadataService {
    track_cache: TtlCache<Vec<ExternalReleaseRef>>,
    release_cache: TtlCache<ExternalReleaseRef>,
    search_cache: TtlCache<Vec<ExternalReleaseRef>>,
    persistent: Arc<PersistentMetadataCache>,
    discogs: Arc<DiscogsClient>,
}

/// A release candidate scored against the requested `(artist, track)` pair.
#[derive(Debug, Clone)]
pub struct ScoredRelease {
    pub release: ExternalReleaseRef,
    pub confidence: f64,
    pub cached: bool,
}

impl MetadataService {
    pub fn new(
        track_cache: TtlCache<Vec<ExternalReleaseRef>>,
        release_cache: TtlCache<ExternalReleaseRef>,
        search_cache: TtlCache<Vec<ExternalReleaseRef>>,
        persistent: Arc<PersistentMetadataCache>,
        discogs: Arc<DiscogsClient>,
    ) -> Self {
        Self {
            track_cache,
            release_cache,
            search_cache,
            persistent,
            discogs,
        }
    }

    /// Two-phase search: cached/persistent candidates first, then upstream if
    /// both shallower tiers miss. The upstream query itself is two-phase — a
    /// strict `(artist, track)` query, widened to a keyword query over
    /// `"artist track"` free text if the strict query returns fewer than three
    /// results (spec §4.7). Results are scored by combined title/artist
    /// similarity.
    pub async fn search_releases_by_track(
        &self,
        artist: &str,
        track: &str,
        skip_cache: bool,
        telemetry: &Telemetry,
    ) -> Result<Vec<ScoredRelease>> {
        let key = derive_key("search_release_by_track", &[artist, track]);

        let memory_hit = timed_step("metadata_memory_probe", || async {
            self.track_cache.get(&key, skip_cache, telemetry)
        })
        .await;
        if let Some(cached) = memory_hit {
            return Ok(self.score_candidates(&cached, artist, track, true));
        }

        let persistent_hits = timed_step("metadata_persistent_probe", || async {
            self.persistent.lookup_releases_by_track(artist, track, telemetry).await
        })
        .await?;
        if !persistent_hits.is_empty() {
            self.track_cache.set(key, Some(persistent_hits.clone()), skip_cache);
            return Ok(self.score_candidates(&persistent_hits, artist, track, true));
        }

        let strict = timed_step("metadata_upstream_probe", || async {
            self.discogs.search_release(artist, track, telemetry).await
        })
        .await?;
        let upstream_results = if strict.results.len() < 3 {
            let keyword_query = format!("{artist} {track}");
            let keyword = self.discogs.search_release(&keyword_query, "", telemetry).await?;
            let mut combined = strict.results;
            let seen: std::collections::HashSet<i64> = combined.iter().map(|r| r.id).collect();
            combined.extend(keyword.results.into_iter().filter(|r| !seen.contains(&r.id)));
            combined
        } else {
            strict.results
        };

        let mut releases = Vec::with_capacity(upstream_results.len());
        for result in upstream_results.into_iter().take(10) {
            if let Ok(release) = self.discogs.get_release(result.id, telemetry).await {
                releases.push(release.into_release_ref());
            }
        }

        for release in &releases {
            self.persistent.write_back(release).await?;
        }
        self.track_cache.set(key, Some(releases.clone()), skip_cache);

        Ok(self.score_candidates(&releases, artist, track, false))
    }

    /// Fetches a single release by id, cascading M → P → H.
    pub async fn get_release(
        &self,
        release_id: i64,
        skip_cache: bool,
        telemetry: &Telemetry,
    ) -> Result<Option<ExternalReleaseRef>> {
        let key = derive_key("get_release", &[&release_id.to_string()]);

        let memory_hit =
            timed_step("metadata_memory_probe", || async { self.release_cache.get(&key, skip_cache, telemetry) })
                .await;
        if let Some(cached) = memory_hit {
            return Ok(Some(cached));
        }

        let persistent_hit =
            timed_step("metadata_persistent_probe", || async { self.persistent.lookup_release(release_id, telemetry).await })
                .await?;
        if let Some(hit) = persistent_hit {
            self.release_cache.set(key, Some(hit.clone()), skip_cache);
            return Ok(Some(hit));
        }

        let release =
            timed_step("metadata_upstream_probe", || async { self.discogs.get_release(release_id, telemetry).await })
                .await?;
        let release_ref = release.into_release_ref();
        self.persistent.write_back(&release_ref).await?;
        self.release_cache.set(key, Some(release_ref.clone()), skip_cache);

        Ok(Some(release_ref))
    }

    /// Free-text search (used for compilation/song-as-artist strategies and
    /// artwork lookups), cascading M → P → H the same way as track search.
    /// `cached` is true iff the served value did not come from the HTTP tier
    /// (spec §4.7).
    pub async fn search(
        &self,
        query: &str,
        skip_cache: bool,
        telemetry: &Telemetry,
    ) -> Result<(Vec<ExternalReleaseRef>, bool)> {
        let key = derive_key("search", &[query]);

        let memory_hit =
            timed_step("metadata_memory_probe", || async { self.search_cache.get(&key, skip_cache, telemetry) }).await;
        if let Some(cached) = memory_hit {
            return Ok((cached, true));
        }

        let persistent_hits =
            timed_step("metadata_persistent_probe", || async { self.persistent.search_releases(query, telemetry).await })
                .await?;
        if !persistent_hits.is_empty() {
            self.search_cache.set(key, Some(persistent_hits.clone()), skip_cache);
            return Ok((persistent_hits, true));
        }

        let response =
            timed_step("metadata_upstream_probe", || async { self.discogs.search_release(query, "", telemetry).await })
                .await?;
        let mut releases = Vec::with_capacity(response.results.len());
        for result in response.results.into_iter().take(10) {
            if let Ok(release) = self.discogs.get_release(result.id, telemetry).await {
                releases.push(release.into_release_ref());
            }
        }

        for release in &releases {
            self.persistent.write_back(release).await?;
        }
        self.search_cache.set(key, Some(releases.clone()), skip_cache);

        Ok((releases, false))
    }

    /// Used by `/health` (spec §6): probes the persistent cache and upstream API
    /// tiers independently, since either may degrade without the other.
    pub async fn health(&self) -> (bool, bool) {
        let (persistent_ok, upstream_ok) =
            tokio::join!(self.persistent.health_check(), self.discogs.health_check());
        (persistent_ok, upstream_ok)
    }

    /// Combined confidence in `[0.2, 1.0]`: `0.6 * title_sim + 0.4 * artist_sim`,
    /// floored at 0.2 so a cache/persistent hit with weak string overlap is still
    /// surfaced rather than discarded (spec §4.7 leaves the floor to the
    /// implementer; 0.2 keeps every tier hit visible downstream).
    fn score_candidates(
        &self,
        releases: &[ExternalReleaseRef],
        artist: &str,
        track: &str,
        cached: bool,
    ) -> Vec<ScoredRelease> {
        releases
            .iter()
            .map(|release| {
                let title_sim = crate::fuzzy::token_set_ratio(&release.title, track) as f64 / 100.0;
                let artist_sim = crate::fuzzy::token_set_ratio(&release.artist, artist) as f64 / 100.0;
                let confidence = (TITLE_WEIGHT * title_sim + (1.0 - TITLE_WEIGHT) * artist_sim).max(0.2);
                ScoredRelease {
                    release: release.clone(),
                    confidence,
                    cached,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TrackRef;
    use std::time::Duration;

    fn release(title: &str, artist: &str) -> ExternalReleaseRef {
        ExternalReleaseRef {
            release_id: 1,
            release_url: "https://example.test/1".into(),
            title: title.into(),
            artist: artist.into(),
            year: Some(2000),
            tracklist: vec![TrackRef { position: Some("A1".into()), title: title.into(), duration: None }],
        }
    }

    #[test]
    fn score_candidates_weights_title_over_artist() {
        let svc = MetadataService::new(
            TtlCache::new(10, Duration::from_secs(60)),
            TtlCache::new(10, Duration::from_secs(60)),
            TtlCache::new(10, Duration::from_secs(60)),
            Arc::new(PersistentMetadataCache::disabled()),
            Arc::new(DiscogsClient::new("token".into(), 50, 5, 2)),
        );
        let scored = svc.score_candidates(
            &[release("Percolator", "Stereolab")],
            "Stereolab",
            "Percolator",
            true,
        );
        assert_eq!(scored.len(), 1);
        assert!(scored[0].confidence > 0.9);
        assert!(scored[0].cached);
    }

    #[test]
    fn score_floors_at_point_two_for_weak_matches() {
        let svc = MetadataService::new(
            TtlCache::new(10, Duration::from_secs(60)),
            TtlCache::new(10, Duration::from_secs(60)),
            TtlCache::new(10, Duration::from_secs(60)),
            Arc::new(PersistentMetadataCache::disabled()),
            Arc::new(DiscogsClient::new("token".into(), 50, 5, 2)),
        );
        let scored = svc.score_candidates(
            &[release("Completely Unrelated Title", "Some Other Artist")],
            "Stereolab",
            "Percolator",
            false,
        );
        assert!(scored[0].confidence >= 0.2);
    }
}
