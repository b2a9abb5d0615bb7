//! Token transform: the first stage of the fingerprint pipeline.
//!
//! Parses a token→count JSON map and derives the per-document quantities the
//! rest of the engine builds on: the raw sum, the Euclidean norm, and the
//! filtered weighted-token sequence. A `BTreeMap` keeps iteration (and
//! therefore every downstream ordering) lexicographic and stable across runs.

use std::collections::BTreeMap;
use std::path::Path;
use tracing::warn;

use crate::models::{Fingerprint, WeightedToken};

/// A parsed token-frequency map. Ordered so output is deterministic.
pub type TokenMap = BTreeMap<String, i64>;

/// Parse a token JSON file into a map.
///
/// An empty or unparseable file yields an empty map with a logged warning;
/// only the I/O failure of an unreadable file is surfaced to the caller.
pub fn read_token_map(path: &Path) -> std::io::Result<TokenMap> {
    let content = std::fs::read_to_string(path)?;
    if content.trim().is_empty() {
        warn!(path = %path.display(), "empty token file, treating as empty map");
        return Ok(TokenMap::new());
    }
    match serde_json::from_str::<TokenMap>(&content) {
        Ok(map) => Ok(map),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "unparseable token file, treating as empty map");
            Ok(TokenMap::new())
        }
    }
}

/// Arithmetic sum of all raw counts.
pub fn token_sum(map: &TokenMap) -> i64 {
    map.values().sum()
}

/// Euclidean norm of the raw count vector: √(Σ v²).
pub fn euclidean_norm(map: &TokenMap) -> f64 {
    map.values()
        .map(|&v| (v as f64) * (v as f64))
        .sum::<f64>()
        .sqrt()
}

/// The ingestion filter predicate: lowercase ASCII only, bounded length,
/// minimum frequency.
fn passes_filter(token: &str, frequency: i64, max_length: usize, min_value: i64) -> bool {
    !token.is_empty()
        && token.len() <= max_length
        && frequency >= min_value
        && token.bytes().all(|b| b.is_ascii_lowercase())
}

/// Apply the filter and attach unit-vector weights.
///
/// `norm` is the document norm over the *pre-filter* values; a zero norm
/// yields zero weights (only reachable for an empty map, where no tokens
/// survive anyway).
pub fn filter_tokens(
    map: &TokenMap,
    max_length: usize,
    min_value: i64,
    norm: f64,
) -> Vec<WeightedToken> {
    map.iter()
        .filter(|(token, &frequency)| passes_filter(token, frequency, max_length, min_value))
        .map(|(token, &frequency)| WeightedToken {
            token: token.clone(),
            frequency,
            weight: if norm > 0.0 {
                frequency as f64 / norm
            } else {
                0.0
            },
        })
        .collect()
}

/// Run the full transform for one document file.
///
/// The fingerprint name is the file stem; sum and norm are taken over the
/// raw map, the unique count over the filtered map.
pub fn fingerprint_document(
    path: &Path,
    max_length: usize,
    min_value: i64,
) -> std::io::Result<Fingerprint> {
    let map = read_token_map(path)?;
    let norm = euclidean_norm(&map);
    let tokens = filter_tokens(&map, max_length, min_value, norm);

    Ok(Fingerprint {
        file_name: path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default(),
        total_tokens: token_sum(&map),
        unique_tokens: tokens.len() as i64,
        relational_distance: norm,
        tokens,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map_of(entries: &[(&str, i64)]) -> TokenMap {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), *v))
            .collect()
    }

    #[test]
    fn sum_and_norm() {
        let map = map_of(&[("cat", 3), ("dog", 5), ("xx", 10)]);
        assert_eq!(token_sum(&map), 18);
        let norm = euclidean_norm(&map);
        assert!((norm - 134.0_f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn empty_map_has_zero_norm() {
        let map = TokenMap::new();
        assert_eq!(token_sum(&map), 0);
        assert_eq!(euclidean_norm(&map), 0.0);
        assert!(filter_tokens(&map, 14, 3, 0.0).is_empty());
    }

    #[test]
    fn filter_keeps_weighted_survivors() {
        // All three survive the default filter; weights are freq / norm.
        let map = map_of(&[("cat", 3), ("dog", 5), ("xx", 10)]);
        let norm = euclidean_norm(&map);
        let tokens = filter_tokens(&map, 14, 3, norm);
        assert_eq!(tokens.len(), 3);
        assert_eq!(tokens[0].token, "cat");
        assert!((tokens[0].weight - 3.0 / norm).abs() < 1e-12);
        assert_eq!(tokens[2].token, "xx");
        assert!((tokens[2].weight - 10.0 / norm).abs() < 1e-12);
    }

    #[test]
    fn filter_rejects_long_rare_and_uppercase() {
        let map = map_of(&[("ab", 3), ("verylongtokenname", 100), ("cd", 2), ("AB", 9)]);
        let norm = euclidean_norm(&map);
        let tokens = filter_tokens(&map, 14, 3, norm);
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].token, "ab");
    }

    #[test]
    fn filter_length_boundary() {
        // Fifteen characters is out even at high frequency; fourteen is out
        // when the frequency floor is missed.
        let map = map_of(&[("abcdefghijklmno", 100), ("abcdefghijklmn", 2)]);
        let norm = euclidean_norm(&map);
        assert!(filter_tokens(&map, 14, 3, norm).is_empty());

        let ok = map_of(&[("abcdefghijklmn", 3)]);
        let norm = euclidean_norm(&ok);
        assert_eq!(filter_tokens(&ok, 14, 3, norm).len(), 1);
    }

    #[test]
    fn filter_rejects_non_alpha() {
        let map = map_of(&[("abc1", 5), ("ab-c", 5), ("abc", 5)]);
        let norm = euclidean_norm(&map);
        let tokens = filter_tokens(&map, 14, 3, norm);
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].token, "abc");
    }

    #[test]
    fn output_order_is_lexicographic() {
        let map = map_of(&[("zebra", 4), ("alpha", 4), ("mid", 4)]);
        let norm = euclidean_norm(&map);
        let tokens = filter_tokens(&map, 14, 3, norm);
        let names: Vec<&str> = tokens.iter().map(|t| t.token.as_str()).collect();
        assert_eq!(names, vec!["alpha", "mid", "zebra"]);
    }

    #[test]
    fn unparseable_file_yields_empty_map() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("bad.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(read_token_map(&path).unwrap().is_empty());

        let empty = tmp.path().join("empty.json");
        std::fs::write(&empty, "").unwrap();
        assert!(read_token_map(&empty).unwrap().is_empty());
    }

    #[test]
    fn fingerprint_matches_hand_computation() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("a.json");
        std::fs::write(&path, r#"{"cat":3,"dog":5,"xx":10}"#).unwrap();

        let fp = fingerprint_document(&path, 14, 3).unwrap();
        assert_eq!(fp.file_name, "a");
        assert_eq!(fp.total_tokens, 18);
        assert_eq!(fp.unique_tokens, 3);
        assert!((fp.relational_distance - 134.0_f64.sqrt()).abs() < 1e-9);
        assert_eq!(fp.tokens.len(), 3);
    }
}
