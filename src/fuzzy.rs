//! Token-set similarity scoring (spec §4.2), independent of any backing store.

use std::collections::HashSet;

use crate::normalize::tokenize;

/// Artist-correction threshold (spec §4.2, §4.3).
pub const ARTIST_CORRECTION_THRESHOLD: i32 = 85;
/// Fuzzy library-match threshold (spec §4.2, §4.3).
pub const FUZZY_MATCH_THRESHOLD: i32 = 70;
/// Track-validation / compilation-detection threshold (spec §4.8, §4.9).
pub const TRACK_MATCH_THRESHOLD: i32 = 80;

/// Weight given to whole-token-set (Jaccard) overlap in the final blend. Kept
/// low: two strings that differ by a single misspelled token should still
/// score high, and Jaccard alone punishes that token too heavily.
const JACCARD_WEIGHT: f64 = 0.1;
/// Weight given to the per-token character-similarity term.
const CHAR_WEIGHT: f64 = 1.0 - JACCARD_WEIGHT;

/// Score two strings on token sets: tokenize both, then the score is a weighted
/// blend of Jaccard set overlap and a character-similarity term (best-aligned
/// token pairs via `strsim::normalized_levenshtein`), scaled to `[0, 100]`.
///
/// The blend favors character similarity: a single misspelled token (e.g.
/// "willias" for "williams") should not drag an otherwise-matching pair below
/// the artist-correction threshold just because Jaccard sees it as a miss.
/// Levenshtein ratio (rather than Jaro-Winkler) is used for the per-token term
/// because it penalizes unrelated short tokens much more sharply, which keeps
/// genuinely unrelated strings well separated from typo-level near-matches.
pub fn token_set_ratio(a: &str, b: &str) -> i32 {
    let tokens_a: Vec<String> = tokenize(a);
    let tokens_b: Vec<String> = tokenize(b);

    if tokens_a.is_empty() && tokens_b.is_empty() {
        return 100;
    }
    if tokens_a.is_empty() || tokens_b.is_empty() {
        return 0;
    }

    let set_a: HashSet<&String> = tokens_a.iter().collect();
    let set_b: HashSet<&String> = tokens_b.iter().collect();

    let intersection = set_a.intersection(&set_b).count();
    let union = set_a.union(&set_b).count().max(1);
    let jaccard = intersection as f64 / union as f64;

    // Character-overlap term: for every token on the smaller side, take its best
    // Levenshtein-ratio match against the other side, then average.
    let (smaller, larger) = if tokens_a.len() <= tokens_b.len() {
        (&tokens_a, &tokens_b)
    } else {
        (&tokens_b, &tokens_a)
    };

    let char_overlap = if smaller.is_empty() {
        0.0
    } else {
        let sum: f64 = smaller
            .iter()
            .map(|t| {
                larger
                    .iter()
                    .map(|o| strsim::normalized_levenshtein(t, o))
                    .fold(0.0_f64, f64::max)
            })
            .sum();
        sum / smaller.len() as f64
    };

    let score = (jaccard * JACCARD_WEIGHT + char_overlap * CHAR_WEIGHT) * 100.0;
    score.round().clamp(0.0, 100.0) as i32
}
