//! Tier: the library catalog store (spec §4.3). An embedded SQLite file with an
//! FTS5 virtual table (trigram tokenizer) over `(artist, title)`; the file is
//! replaceable at runtime and its absence is tolerated as `StoreUnavailable`,
//! never a panic.

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use rusqlite::{Connection, OpenFlags};

use crate::error::{AppError, Result};
use crate::fuzzy::{token_set_ratio, ARTIST_CORRECTION_THRESHOLD, FUZZY_MATCH_THRESHOLD};
use crate::models::{LibraryItem, SearchOpts};
use crate::normalize::{normalize, tokenize};

const CATALOG_QUERY_TIMEOUT: Duration = Duration::from_secs(5);
/// Fuzzy candidates are drawn from at most this many rows sharing a 3-char prefix.
const FUZZY_CANDIDATE_LIMIT: usize = 500;

pub struct LibraryStore {
    path: PathBuf,
    conn: Mutex<Option<Connection>>,
}

impl LibraryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            conn: Mutex::new(None),
        }
    }

    /// Drops any cached connection so the next query re-opens the file; called
    /// when the catalog file is externally replaced (spec §6 "The file is
    /// replaceable at runtime").
    pub fn invalidate(&self) {
        *self.conn.lock().unwrap() = None;
    }

    fn open(path: &Path) -> std::result::Result<Connection, rusqlite::Error> {
        Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)
    }

    /// Runs `f` against an open connection, re-opening it if the cached handle
    /// was invalidated or never opened. Surfaces `StoreUnavailable` when the
    /// backing file is missing or unreadable.
    fn with_connection<T>(&self, f: impl FnOnce(&Connection) -> rusqlite::Result<T>) -> Result<T> {
        let mut guard = self.conn.lock().unwrap();
        if guard.is_none() {
            match Self::open(&self.path) {
                Ok(c) => *guard = Some(c),
                Err(e) => {
                    return Err(AppError::StoreUnavailable(format!(
                        "catalog file {:?} unavailable: {e}",
                        self.path
                    )))
                }
            }
        }
        let conn = guard.as_ref().expect("just ensured Some");
        f(conn).map_err(|e| {
            *guard = None;
            AppError::StoreUnavailable(format!("catalog query failed: {e}"))
        })
    }

    /// Three-level cascade: full-text → token-AND substring → fuzzy token-set
    /// scoring (spec §4.3). Runs on a blocking thread since rusqlite is
    /// synchronous; from the caller's perspective this is a suspension point.
    pub async fn search(&self, query: &str, opts: &SearchOpts) -> Result<Vec<LibraryItem>> {
        let query = query.to_string();
        let opts = opts.clone();
        let this = self.snapshot_for_blocking();

        tokio::time::timeout(
            CATALOG_QUERY_TIMEOUT,
            tokio::task::spawn_blocking(move || this.search_blocking(&query, &opts)),
        )
        .await
        .map_err(|_| AppError::StoreUnavailable("catalog query timed out".to_string()))?
        .map_err(|e| AppError::Internal(format!("catalog worker panicked: {e}")))?
    }

    pub async fn find_similar_artist(&self, artist: &str) -> Result<Option<String>> {
        let artist = artist.to_string();
        let this = self.snapshot_for_blocking();

        tokio::time::timeout(
            CATALOG_QUERY_TIMEOUT,
            tokio::task::spawn_blocking(move || this.find_similar_artist_blocking(&artist)),
        )
        .await
        .map_err(|_| AppError::StoreUnavailable("catalog query timed out".to_string()))?
        .map_err(|e| AppError::Internal(format!("catalog worker panicked: {e}")))?
    }

    /// Used by `/health` (spec §6): succeeds iff the catalog file opens and accepts
    /// a trivial query, within the same timeout as a real query.
    pub async fn health_check(&self) -> Result<()> {
        let this = self.snapshot_for_blocking();
        tokio::time::timeout(
            CATALOG_QUERY_TIMEOUT,
            tokio::task::spawn_blocking(move || {
                let conn = LibraryStore::open(&this.path)?;
                conn.execute_batch("SELECT 1")
            }),
        )
        .await
        .map_err(|_| AppError::StoreUnavailable("catalog health check timed out".to_string()))?
        .map_err(|e| AppError::Internal(format!("catalog worker panicked: {e}")))?
        .map_err(|e| AppError::StoreUnavailable(format!("catalog file unavailable: {e}")))
    }

    /// `LibraryStore` is `!Clone` (it owns a lazily-opened connection guarded by
    /// a blocking mutex); blocking work instead reopens its own short-lived
    /// connection against the same path, mirroring how the async entry points
    /// hand off to `spawn_blocking`.
    fn snapshot_for_blocking(&self) -> BlockingLibraryStore {
        BlockingLibraryStore {
            path: self.path.clone(),
        }
    }
}

/// Owns nothing but a path; opens a fresh connection per blocking call. Cheap
/// relative to the query itself and avoids sending `rusqlite::Connection`
/// across the `spawn_blocking` boundary.
struct BlockingLibraryStore {
    path: PathBuf,
}

impl BlockingLibraryStore {
    fn search_blocking(&self, query: &str, opts: &SearchOpts) -> Result<Vec<LibraryItem>> {
        let conn = LibraryStore::open(&self.path).map_err(|e| {
            AppError::StoreUnavailable(format!("catalog file {:?} unavailable: {e}", self.path))
        })?;

        // Level 1: full-text search.
        if let Some(results) = Self::full_text_search(&conn, query, opts)? {
            if !results.is_empty() {
                return Ok(results);
            }
        }

        if !opts.fallback_to_like {
            return Ok(Vec::new());
        }

        // Level 2: token-AND substring match.
        let tokens = tokenize(query);
        if !tokens.is_empty() {
            let results = Self::token_and_search(&conn, &tokens, opts)?;
            if !results.is_empty() {
                return Ok(results);
            }
        }

        if !opts.fallback_to_fuzzy || tokens.is_empty() {
            return Ok(Vec::new());
        }

        // Level 3: fuzzy token-set scoring over a prefix-bounded candidate set.
        Self::fuzzy_search(&conn, query, &tokens, opts)
    }

    fn full_text_search(
        conn: &Connection,
        query: &str,
        opts: &SearchOpts,
    ) -> Result<Option<Vec<LibraryItem>>> {
        let fts_query = normalize(query);
        if fts_query.trim().is_empty() {
            return Ok(None);
        }

        let sql = "SELECT l.id, l.artist, l.title, l.call_letters, l.artist_call_number, \
                    l.release_call_number, l.genre, l.format \
                    FROM library_fts f JOIN library l ON l.id = f.rowid \
                    WHERE library_fts MATCH ?1 \
                    ORDER BY rank LIMIT ?2";

        let mut stmt = match conn.prepare(sql) {
            Ok(s) => s,
            Err(_) => return Ok(None),
        };

        let rows = stmt.query_map(
            rusqlite::params![fts_query, opts.limit as i64],
            Self::row_to_item,
        );

        match rows {
            Ok(rows) => {
                let items: rusqlite::Result<Vec<LibraryItem>> = rows.collect();
                match items {
                    Ok(items) => Ok(Some(Self::apply_artist_filter(items, opts))),
                    // Malformed FTS syntax falls through to the next level (spec §4.3).
                    Err(_) => Ok(None),
                }
            }
            Err(_) => Ok(None),
        }
    }

    fn token_and_search(
        conn: &Connection,
        tokens: &[String],
        opts: &SearchOpts,
    ) -> Result<Vec<LibraryItem>> {
        let mut sql = String::from(
            "SELECT id, artist, title, call_letters, artist_call_number, release_call_number, genre, format FROM library WHERE ",
        );
        let clauses: Vec<String> = (0..tokens.len())
            .map(|i| format!("(lower(artist) LIKE ?{} OR lower(title) LIKE ?{})", i + 1, i + 1))
            .collect();
        sql.push_str(&clauses.join(" AND "));
        sql.push_str(&format!(" LIMIT {}", opts.limit.max(1)));

        let mut stmt = conn.prepare(&sql)?;
        let patterns: Vec<String> = tokens.iter().map(|t| format!("%{}%", normalize(t))).collect();
        let params: Vec<&dyn rusqlite::ToSql> =
            patterns.iter().map(|p| p as &dyn rusqlite::ToSql).collect();

        let items: rusqlite::Result<Vec<LibraryItem>> =
            stmt.query_map(params.as_slice(), Self::row_to_item)?.collect();
        Ok(Self::apply_artist_filter(items?, opts))
    }

    fn fuzzy_search(
        conn: &Connection,
        query: &str,
        tokens: &[String],
        opts: &SearchOpts,
    ) -> Result<Vec<LibraryItem>> {
        // `.rev()` before `max_by_key` so a tie in length resolves to the
        // first-occurring token: `max_by_key` keeps the last maximum it sees,
        // and scanning in reverse makes that the earliest token in `tokens`.
        let longest = tokens
            .iter()
            .rev()
            .max_by_key(|t| t.chars().count())
            .expect("tokens non-empty, checked by caller");
        let prefix = prefix3(longest);

        let sql = "SELECT id, artist, title, call_letters, artist_call_number, release_call_number, genre, format \
                    FROM library WHERE lower(artist) LIKE ?1 OR lower(title) LIKE ?1 LIMIT ?2";
        let mut stmt = conn.prepare(sql)?;
        let pattern = format!("{prefix}%");
        let candidates: rusqlite::Result<Vec<LibraryItem>> = stmt
            .query_map(
                rusqlite::params![pattern, FUZZY_CANDIDATE_LIMIT as i64],
                Self::row_to_item,
            )?
            .collect();
        let candidates = Self::apply_artist_filter(candidates?, opts);

        let mut scored: Vec<(i32, LibraryItem)> = candidates
            .into_iter()
            .map(|item| {
                let haystack = format!("{} {}", item.artist, item.title);
                (token_set_ratio(&haystack, query), item)
            })
            .filter(|(score, _)| *score >= FUZZY_MATCH_THRESHOLD)
            .collect();

        scored.sort_by(|(score_a, item_a), (score_b, item_b)| {
            score_b.cmp(score_a).then(item_a.id.cmp(&item_b.id))
        });

        Ok(scored
            .into_iter()
            .take(opts.limit)
            .map(|(_, item)| item)
            .collect())
    }

    fn find_similar_artist_blocking(&self, artist: &str) -> Result<Option<String>> {
        let conn = LibraryStore::open(&self.path).map_err(|e| {
            AppError::StoreUnavailable(format!("catalog file {:?} unavailable: {e}", self.path))
        })?;

        let first_token = match tokenize(artist).into_iter().next() {
            Some(t) => t,
            None => return Ok(None),
        };
        let prefix = prefix3(&first_token);

        let sql = "SELECT DISTINCT artist FROM library WHERE lower(artist) LIKE ?1 LIMIT ?2";
        let mut stmt = conn.prepare(sql)?;
        let pattern = format!("{prefix}%");
        let candidates: rusqlite::Result<Vec<String>> = stmt
            .query_map(
                rusqlite::params![pattern, FUZZY_CANDIDATE_LIMIT as i64],
                |row| row.get(0),
            )?
            .collect();

        let best = candidates?
            .into_iter()
            .map(|candidate| {
                let score = token_set_ratio(&candidate, artist);
                (score, candidate)
            })
            .filter(|(score, _)| *score >= ARTIST_CORRECTION_THRESHOLD)
            .max_by_key(|(score, _)| *score);

        Ok(best.map(|(_, candidate)| candidate))
    }

    fn apply_artist_filter(items: Vec<LibraryItem>, opts: &SearchOpts) -> Vec<LibraryItem> {
        match &opts.artist_filter {
            Some(filter) => {
                let norm_filter = normalize(filter);
                items
                    .into_iter()
                    .filter(|item| normalize(&item.artist) == norm_filter)
                    .collect()
            }
            None => items,
        }
    }

    fn row_to_item(row: &rusqlite::Row) -> rusqlite::Result<LibraryItem> {
        Ok(LibraryItem {
            id: row.get(0)?,
            artist: row.get(1)?,
            title: row.get(2)?,
            call_letters: row.get(3)?,
            artist_call_number: row.get(4)?,
            release_call_number: row.get(5)?,
            genre: row.get(6)?,
            format: row.get(7)?,
        })
    }
}

/// First 3 characters of a normalized token, used to bound fuzzy-candidate fetches.
fn prefix3(token: &str) -> String {
    token.chars().take(3).collect()
}
