//! Text normalization and tokenization (spec §4.1).

use unicode_normalization::UnicodeNormalization;

/// Tokens shorter than this (after stopword removal) are dropped.
const MIN_TOKEN_LEN: usize = 2;

const STOPWORDS: &[&str] = &[
    "the", "a", "an", "and", "of", "play", "song", "remix", "records", "feat", "featuring", "by",
    "with", "vs", "ft",
];

/// Unicode-decomposes `s`, strips combining marks, folds letters that have no
/// canonical decomposition (`ø`, `æ`, `đ`, `ł`, ...) to their closest ASCII
/// equivalent, lowercases, and collapses whitespace.
pub fn normalize(s: &str) -> String {
    let decomposed: String = s.nfd().filter(|c| !is_combining_mark(*c)).collect();
    let lowered = decomposed.to_lowercase();

    let mut out = String::with_capacity(lowered.len());
    let mut last_was_space = false;
    for c in lowered.chars() {
        if c.is_whitespace() {
            if !last_was_space && !out.is_empty() {
                out.push(' ');
            }
            last_was_space = true;
        } else {
            match fold_non_decomposing_letter(c) {
                Some(folded) => out.push_str(folded),
                None => out.push(c),
            }
            last_was_space = false;
        }
    }
    out.trim_end().to_string()
}

fn is_combining_mark(c: char) -> bool {
    matches!(c as u32,
        0x0300..=0x036F | 0x1AB0..=0x1AFF | 0x1DC0..=0x1DFF | 0x20D0..=0x20FF | 0xFE20..=0xFE2F)
}

/// NFD has no canonical decomposition for these letters (they are not a base
/// character plus a combining mark, they're distinct code points), so
/// `is_combining_mark` filtering never touches them. Fold them by hand to the
/// nearest ASCII letter so catalog lookups are diacritic-insensitive for them too.
fn fold_non_decomposing_letter(c: char) -> Option<&'static str> {
    Some(match c {
        'ø' => "o",
        'æ' => "ae",
        'đ' => "d",
        'ł' => "l",
        'ß' => "ss",
        'ð' => "d",
        'þ' => "th",
        'œ' => "oe",
        _ => return None,
    })
}

/// Splits on whitespace/punctuation, drops short tokens and stopwords.
pub fn tokenize(s: &str) -> Vec<String> {
    normalize(s)
        .split(|c: char| c.is_whitespace() || c.is_ascii_punctuation())
        .filter(|t| !t.is_empty())
        .filter(|t| t.chars().count() >= MIN_TOKEN_LEN)
        .filter(|t| !STOPWORDS.contains(t))
        .map(|t| t.to_string())
        .collect()
}

/// Matches em-dash variants and the literal ASCII hyphen used by `"X - Y"` messages.
const SEPARATORS: &[&str] = &[" - ", " \u{2013} ", " \u{2014} "];

/// Detects a single `X - Y` split where both sides contain at least one
/// non-stopword token. Returns `(part1, part2)` verbatim (not normalized).
pub fn detect_ambiguous_format(s: &str) -> Option<(String, String)> {
    for sep in SEPARATORS {
        let mut splits = s.match_indices(sep);
        let first = splits.next()?;
        if splits.next().is_some() {
            // more than one separator occurrence: ambiguous, skip this separator
            continue;
        }
        let (left, right_with_sep) = s.split_at(first.0);
        let right = &right_with_sep[sep.len()..];
        let left = left.trim();
        let right = right.trim();
        if left.is_empty() || right.is_empty() {
            continue;
        }
        if tokenize(left).is_empty() || tokenize(right).is_empty() {
            continue;
        }
        return Some((left.to_string(), right.to_string()));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_round_trip() {
        for s in ["Jørgen Plaetner", "  Lucinda   Williams  ", "CAFÉ", ""] {
            let once = normalize(s);
            let twice = normalize(&once);
            assert_eq!(once, twice, "normalize not idempotent for {s:?}");
        }
    }

    #[test]
    fn normalize_strips_diacritics_and_case() {
        assert_eq!(normalize("Jørgen Plaetner"), "jorgen plaetner");
        assert_eq!(normalize("CAFÉ"), "cafe");
    }

    #[test]
    fn normalize_collapses_whitespace() {
        assert_eq!(normalize("  too   many   spaces "), "too many spaces");
    }

    #[test]
    fn tokenize_drops_stopwords_and_short_tokens() {
        let tokens = tokenize("Play The Song of Love by a");
        assert_eq!(tokens, vec!["love".to_string()]);
    }

    #[test]
    fn detect_ambiguous_format_splits_on_single_hyphen() {
        let (a, b) = detect_ambiguous_format("Guerilla Toss - Betty Dreams of Green Men").unwrap();
        assert_eq!(a, "Guerilla Toss");
        assert_eq!(b, "Betty Dreams of Green Men");
    }

    #[test]
    fn detect_ambiguous_format_rejects_multiple_separators() {
        assert!(detect_ambiguous_format("A - B - C").is_none());
    }

    #[test]
    fn detect_ambiguous_format_rejects_stopword_only_side() {
        assert!(detect_ambiguous_format("the - of").is_none());
    }

    #[test]
    fn detect_ambiguous_format_none_without_separator() {
        assert!(detect_ambiguous_format("Just a title").is_none());
    }
}
