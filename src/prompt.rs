//! Prompt scorer: ranks every candidate document against a query buffer.
//!
//! The query is an anonymous token map read from the buffer JSON. Its tokens
//! are filtered with looser bounds than ingestion, TF-IDF-adjusted, and then
//! dotted against the stored per-document token weights. The in-memory token
//! index is evicted per candidate after scoring, so live memory stays
//! bounded by the rows matching the query tokens.

use anyhow::{Context, Result};
use sqlx::{Connection, Row, SqlitePool};
use std::collections::HashMap;
use tracing::{info, warn};

use crate::config::Config;
use crate::db;
use crate::migrate;
use crate::models::{PromptMatch, WeightedToken};
use crate::tokens;

/// Score the buffer query against every known document and write the ranked
/// report. Returns the full descending-sorted match list.
pub async fn process_prompt(
    config: &Config,
    pool: &SqlitePool,
    top_n: Option<usize>,
) -> Result<Vec<PromptMatch>> {
    migrate::ensure_schema(pool).await?;

    let top_n = top_n.unwrap_or(config.prompt.top_n);
    let query_tokens = load_query_tokens(config);

    if query_tokens.is_empty() {
        write_report(config, &[], 0)?;
        println!("process prompt");
        println!("  query tokens: 0");
        println!("  results: 0");
        println!("ok");
        return Ok(Vec::new());
    }

    // Dedicated read connection with the bulk pragmas; one transaction for
    // a consistent view across the three reads below.
    let mut conn = db::open_worker_connection(&config.storage.db_path).await?;
    let mut tx = conn.begin().await?;

    // TF-IDF adjustment of the query weights: weight += tf_idf / frequency.
    let placeholders = placeholders(query_tokens.len());
    let sql = format!(
        "SELECT word, tf_idf FROM tf_idf WHERE word IN ({})",
        placeholders
    );
    let mut term_query = sqlx::query(&sql);
    for token in &query_tokens {
        term_query = term_query.bind(&token.token);
    }
    let mut adjustments: HashMap<String, f64> = HashMap::new();
    match term_query.fetch_all(&mut *tx).await {
        Ok(rows) => {
            for row in rows {
                let word: String = row.get(0);
                let value: f64 = row.get(1);
                adjustments.insert(word, if value.is_nan() { 0.0 } else { value });
            }
        }
        Err(e) => warn!(error = %e, "tf_idf unavailable, scoring without adjustment"),
    }

    let mut weights: HashMap<String, f64> = HashMap::with_capacity(query_tokens.len());
    for token in &query_tokens {
        let mut weight = token.weight;
        if let Some(tf_idf) = adjustments.get(&token.token) {
            if token.frequency > 0 {
                weight += tf_idf / token.frequency as f64;
            }
        }
        weights.insert(token.token.clone(), weight);
    }

    // In-memory index over the rows matching the query tokens.
    let sql = format!(
        "SELECT file_name, token, relational_distance FROM relation_distance WHERE token IN ({})",
        placeholders
    );
    let mut related_query = sqlx::query(&sql);
    for token in &query_tokens {
        related_query = related_query.bind(&token.token);
    }
    let mut index: HashMap<String, HashMap<String, f64>> = HashMap::new();
    for row in related_query.fetch_all(&mut *tx).await? {
        let file_name: String = row.get(0);
        let token: String = row.get(1);
        let distance: f64 = row.get(2);
        index.entry(file_name).or_default().insert(token, distance);
    }

    // Every known document is a candidate; score and evict.
    let candidates: Vec<(String, String)> = sqlx::query_as("SELECT id, file_name FROM file_info")
        .fetch_all(&mut *tx)
        .await?;

    drop(tx);

    let mut matches: Vec<PromptMatch> = Vec::new();
    for (id, file_name) in candidates {
        let key = format!("title_{}", id);
        let Some(doc_tokens) = index.remove(&key) else {
            continue;
        };

        let score = score_tokens(&weights, &doc_tokens);

        if score > 0.0 {
            matches.push(PromptMatch {
                id,
                file_name,
                score,
            });
        }
    }

    matches.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.id.cmp(&b.id))
    });

    let k = top_n.min(matches.len());
    write_report(config, &matches, k)?;

    info!(
        query_tokens = query_tokens.len(),
        results = matches.len(),
        emitted = k,
        "prompt scored"
    );
    println!("process prompt");
    println!("  query tokens: {}", query_tokens.len());
    println!("  results: {}", matches.len());
    println!("  emitted: {}", k);
    println!("ok");

    Ok(matches)
}

/// Read and filter the buffer query. Unreadable or malformed buffers score
/// as an empty query rather than failing the action.
fn load_query_tokens(config: &Config) -> Vec<WeightedToken> {
    let map = match tokens::read_token_map(&config.prompt.buffer_path) {
        Ok(map) => map,
        Err(e) => {
            warn!(
                path = %config.prompt.buffer_path.display(),
                error = %e,
                "buffer unreadable, treating as empty query"
            );
            return Vec::new();
        }
    };

    let norm = tokens::euclidean_norm(&map);
    tokens::filter_tokens(&map, config.prompt.max_length, config.prompt.min_value, norm)
}

/// Dot-product score over the tokens present on both sides. Bilinear:
/// scaling either side scales every score by the same factor.
pub fn score_tokens(
    query_weights: &HashMap<String, f64>,
    doc_tokens: &HashMap<String, f64>,
) -> f64 {
    doc_tokens
        .iter()
        .filter_map(|(token, rel)| query_weights.get(token).map(|weight| rel * weight))
        .sum()
}

fn placeholders(n: usize) -> String {
    std::iter::repeat("?").take(n).collect::<Vec<_>>().join(", ")
}

const SEPARATOR: &str =
    "-----------------------------------------------------------------";

/// Render the ranked report: header, separator, then one block per result.
pub fn render_report(matches: &[PromptMatch], k: usize) -> String {
    let mut out = format!("Top {} Results:\n{}\n", k, SEPARATOR);
    for (rank, result) in matches.iter().take(k).enumerate() {
        out.push_str(&format!(
            "ID: {}\nDistance: {}\nRank: {}\nName: [[{}]]\n{}\n",
            result.id,
            result.score,
            rank + 1,
            result.file_name,
            SEPARATOR
        ));
    }
    out
}

fn write_report(config: &Config, matches: &[PromptMatch], k: usize) -> Result<()> {
    let path = &config.prompt.output_path;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, render_report(matches, k))
        .with_context(|| format!("Failed to write prompt output: {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matches() -> Vec<PromptMatch> {
        vec![
            PromptMatch {
                id: "aaa".into(),
                file_name: "Alpha Doc".into(),
                score: 0.9,
            },
            PromptMatch {
                id: "bbb".into(),
                file_name: "Beta Doc".into(),
                score: 0.4,
            },
        ]
    }

    #[test]
    fn report_blocks_carry_rank_and_name() {
        let report = render_report(&matches(), 2);
        let lines: Vec<&str> = report.lines().collect();
        assert_eq!(lines[0], "Top 2 Results:");
        assert_eq!(lines[1], SEPARATOR);
        assert_eq!(lines[2], "ID: aaa");
        assert_eq!(lines[3], "Distance: 0.9");
        assert_eq!(lines[4], "Rank: 1");
        assert_eq!(lines[5], "Name: [[Alpha Doc]]");
        assert_eq!(lines[6], SEPARATOR);
        assert_eq!(lines[7], "ID: bbb");
        assert_eq!(lines[9], "Rank: 2");
    }

    #[test]
    fn empty_report_is_header_only() {
        let report = render_report(&[], 0);
        assert_eq!(report, format!("Top 0 Results:\n{}\n", SEPARATOR));
    }

    #[test]
    fn scoring_is_bilinear() {
        let query: HashMap<String, f64> =
            [("cat".to_string(), 0.5), ("dog".to_string(), 0.25)].into();
        let doc: HashMap<String, f64> =
            [("cat".to_string(), 0.3), ("dog".to_string(), 0.4), ("fish".to_string(), 0.9)].into();

        let base = score_tokens(&query, &doc);
        assert!((base - (0.5 * 0.3 + 0.25 * 0.4)).abs() < 1e-12);

        let doubled: HashMap<String, f64> =
            query.iter().map(|(k, v)| (k.clone(), v * 2.0)).collect();
        assert!((score_tokens(&doubled, &doc) - base * 2.0).abs() < 1e-12);
    }

    #[test]
    fn scoring_ignores_tokens_on_one_side_only() {
        let query: HashMap<String, f64> = [("cat".to_string(), 0.5)].into();
        let doc: HashMap<String, f64> = [("dog".to_string(), 0.4)].into();
        assert_eq!(score_tokens(&query, &doc), 0.0);
    }

    #[test]
    fn report_truncates_to_k() {
        let report = render_report(&matches(), 1);
        assert!(report.contains("Alpha Doc"));
        assert!(!report.contains("Beta Doc"));
    }
}
