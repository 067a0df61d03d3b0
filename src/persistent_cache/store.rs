//! Tier P: the shared, trigram-indexed cache of previously observed external
//! releases (spec §4.5). Soft-fails to a miss whenever the store is
//! unconfigured or unreachable; never fails the request on its own.

use std::time::{Duration, Instant};

use chrono::Utc;
use migration::{Migrator, MigratorTrait};
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, FromQueryResult, Statement};

use crate::error::Result;
use crate::models::ExternalReleaseRef;
use crate::normalize::normalize;
use crate::telemetry::Telemetry;

const QUERY_TIMEOUT: Duration = Duration::from_secs(3);
/// Keep only candidates at least this similar; below this the trigram operator
/// returns too much noise to be useful.
const TRIGRAM_SIMILARITY_FLOOR: f64 = 0.3;

pub struct PersistentMetadataCache {
    db: Option<DatabaseConnection>,
}

#[derive(Debug, FromQueryResult)]
struct ReleaseRow {
    data: serde_json::Value,
}

impl PersistentMetadataCache {
    /// `url: None` disables the tier entirely (spec §4.5, §6 "Environment configuration").
    pub async fn connect(url: Option<&str>) -> Self {
        match url {
            Some(url) => match Database::connect(url).await {
                Ok(db) => {
                    if let Err(e) = Migrator::up(&db, None).await {
                        tracing::warn!("persistent cache migrations failed, tier disabled: {e}");
                        return Self { db: None };
                    }
                    Self { db: Some(db) }
                }
                Err(e) => {
                    tracing::warn!("persistent cache unreachable at startup: {e}");
                    Self { db: None }
                }
            },
            None => Self { db: None },
        }
    }

    #[cfg(test)]
    pub fn disabled() -> Self {
        Self { db: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.db.is_some()
    }

    /// Used by `/health` (spec §6): an unconfigured tier reports unreachable so
    /// the overall status degrades rather than claims health it cannot back up.
    pub async fn health_check(&self) -> bool {
        let Some(db) = &self.db else { return false };
        let probe = db.execute(Statement::from_string(
            db.get_database_backend(),
            "SELECT 1".to_string(),
        ));
        matches!(tokio::time::timeout(QUERY_TIMEOUT, probe).await, Ok(Ok(_)))
    }

    /// Fuzzy match on `(artist, track)` against `release_tracks`/`releases` via
    /// the `pg_trgm` similarity operator, most-similar first.
    pub async fn lookup_releases_by_track(
        &self,
        artist: &str,
        track: &str,
        telemetry: &Telemetry,
    ) -> Result<Vec<ExternalReleaseRef>> {
        let Some(db) = &self.db else {
            telemetry.record_pg_miss(0);
            return Ok(Vec::new());
        };

        let norm_artist = normalize(artist);
        let norm_track = normalize(track);
        let start = Instant::now();

        let sql = r#"
            SELECT DISTINCT r.data
            FROM releases r
            JOIN release_tracks rt ON rt.release_id = r.release_id
            WHERE similarity(rt.normalized_track_title, $1) > $3
               OR similarity(r.data->>'artist', $2) > $3
            ORDER BY GREATEST(
                similarity(rt.normalized_track_title, $1),
                similarity(r.data->>'artist', $2)
            ) DESC
            LIMIT 20
        "#;

        let stmt = Statement::from_sql_and_values(
            db.get_database_backend(),
            sql,
            [
                norm_track.into(),
                norm_artist.into(),
                TRIGRAM_SIMILARITY_FLOOR.into(),
            ],
        );

        let outcome = tokio::time::timeout(QUERY_TIMEOUT, ReleaseRow::find_by_statement(stmt).all(db)).await;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        match outcome {
            Ok(Ok(rows)) if !rows.is_empty() => {
                telemetry.record_pg_hit(elapsed_ms);
                Ok(rows
                    .into_iter()
                    .filter_map(|r| serde_json::from_value(r.data).ok())
                    .collect())
            }
            Ok(Ok(_)) => {
                telemetry.record_pg_miss(elapsed_ms);
                Ok(Vec::new())
            }
            Ok(Err(e)) => {
                tracing::warn!("persistent cache track lookup failed: {e}");
                telemetry.record_pg_miss(elapsed_ms);
                Ok(Vec::new())
            }
            Err(_) => {
                tracing::warn!("persistent cache track lookup timed out");
                telemetry.record_pg_miss(elapsed_ms);
                Ok(Vec::new())
            }
        }
    }

    pub async fn lookup_release(
        &self,
        release_id: i64,
        telemetry: &Telemetry,
    ) -> Result<Option<ExternalReleaseRef>> {
        let Some(db) = &self.db else {
            telemetry.record_pg_miss(0);
            return Ok(None);
        };

        let start = Instant::now();
        let sql = "SELECT data FROM releases WHERE release_id = $1";
        let stmt = Statement::from_sql_and_values(db.get_database_backend(), sql, [release_id.into()]);
        let outcome = tokio::time::timeout(QUERY_TIMEOUT, ReleaseRow::find_by_statement(stmt).one(db)).await;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        match outcome {
            Ok(Ok(Some(row))) => {
                telemetry.record_pg_hit(elapsed_ms);
                Ok(serde_json::from_value(row.data).ok())
            }
            Ok(Ok(None)) => {
                telemetry.record_pg_miss(elapsed_ms);
                Ok(None)
            }
            Ok(Err(e)) => {
                tracing::warn!("persistent cache release lookup failed: {e}");
                telemetry.record_pg_miss(elapsed_ms);
                Ok(None)
            }
            Err(_) => {
                tracing::warn!("persistent cache release lookup timed out");
                telemetry.record_pg_miss(elapsed_ms);
                Ok(None)
            }
        }
    }

    /// Free-text fuzzy search over cached release titles/artists.
    pub async fn search_releases(
        &self,
        query: &str,
        telemetry: &Telemetry,
    ) -> Result<Vec<ExternalReleaseRef>> {
        let Some(db) = &self.db else {
            telemetry.record_pg_miss(0);
            return Ok(Vec::new());
        };

        let norm_query = normalize(query);
        let start = Instant::now();
        let sql = r#"
            SELECT data FROM releases
            WHERE similarity(data->>'title', $1) > $2 OR similarity(data->>'artist', $1) > $2
            ORDER BY GREATEST(similarity(data->>'title', $1), similarity(data->>'artist', $1)) DESC
            LIMIT 20
        "#;
        let stmt = Statement::from_sql_and_values(
            db.get_database_backend(),
            sql,
            [norm_query.into(), TRIGRAM_SIMILARITY_FLOOR.into()],
        );
        let outcome = tokio::time::timeout(QUERY_TIMEOUT, ReleaseRow::find_by_statement(stmt).all(db)).await;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        match outcome {
            Ok(Ok(rows)) if !rows.is_empty() => {
                telemetry.record_pg_hit(elapsed_ms);
                Ok(rows
                    .into_iter()
                    .filter_map(|r| serde_json::from_value(r.data).ok())
                    .collect())
            }
            Ok(Ok(_)) => {
                telemetry.record_pg_miss(elapsed_ms);
                Ok(Vec::new())
            }
            Ok(Err(e)) => {
                tracing::warn!("persistent cache search failed: {e}");
                telemetry.record_pg_miss(elapsed_ms);
                Ok(Vec::new())
            }
            Err(_) => {
                tracing::warn!("persistent cache search timed out");
                telemetry.record_pg_miss(elapsed_ms);
                Ok(Vec::new())
            }
        }
    }

    /// Upserts a release (keyed by `release_id`) and its flattened track titles.
    pub async fn write_back(&self, release: &ExternalReleaseRef) -> Result<()> {
        let Some(db) = &self.db else {
            return Ok(());
        };

        let data = serde_json::to_value(release)?;
        let upsert_release = r#"
            INSERT INTO releases (release_id, data, updated_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (release_id) DO UPDATE SET data = EXCLUDED.data, updated_at = EXCLUDED.updated_at
        "#;
        let stmt = Statement::from_sql_and_values(
            db.get_database_backend(),
            upsert_release,
            [release.release_id.into(), data.into(), Utc::now().into()],
        );
        if let Err(e) = db.execute(stmt).await {
            tracing::warn!("persistent cache write-back (release) failed: {e}");
            return Ok(());
        }

        let delete_tracks = "DELETE FROM release_tracks WHERE release_id = $1";
        let _ = db
            .execute(Statement::from_sql_and_values(
                db.get_database_backend(),
                delete_tracks,
                [release.release_id.into()],
            ))
            .await;

        for track in &release.tracklist {
            let insert_track = r#"
                INSERT INTO release_tracks (release_id, track_title, normalized_track_title)
                VALUES ($1, $2, $3)
            "#;
            let normalized = normalize(&track.title);
            if let Err(e) = db
                .execute(Statement::from_sql_and_values(
                    db.get_database_backend(),
                    insert_track,
                    [release.release_id.into(), track.title.clone().into(), normalized.into()],
                ))
                .await
            {
                tracing::warn!("persistent cache write-back (track) failed: {e}");
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn disabled_tier_reports_miss_without_erroring() {
        let cache = PersistentMetadataCache::disabled();
        let telemetry = Telemetry::new();
        assert!(!cache.is_enabled());

        let result = cache.lookup_release(42, &telemetry).await.unwrap();
        assert!(result.is_none());
        assert_eq!(telemetry.snapshot().pg_misses, 1);

        let results = cache
            .lookup_releases_by_track("Stereolab", "Percolator", &telemetry)
            .await
            .unwrap();
        assert!(results.is_empty());

        let results = cache.search_releases("anything", &telemetry).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn disabled_tier_write_back_is_a_no_op() {
        let cache = PersistentMetadataCache::disabled();
        let release = ExternalReleaseRef {
            release_id: 1,
            release_url: "https://example.test/1".into(),
            title: "Emperor Tomato Ketchup".into(),
            artist: "Stereolab".into(),
            year: Some(1996),
            tracklist: vec![],
        };
        cache.write_back(&release).await.unwrap();
    }
}
