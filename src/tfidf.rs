//! TF-IDF builder: corpus-wide term statistics.
//!
//! Combines the tokenizer's global term counts with per-term document counts
//! from `relation_distance`. The IDF keeps its `+1`-shifted form,
//! `log10((N+1)/(doc_count+1)) + 1`, rather than the textbook expression.

use anyhow::{Context, Result};
use sqlx::{Connection, SqlitePool};
use std::collections::HashMap;
use tracing::info;

use crate::config::Config;
use crate::db;
use crate::migrate;
use crate::models::TermStat;
use crate::tokens::TokenMap;

/// The `tf_idf` value for one term.
pub fn tf_idf_value(freq: i64, sum_freq: i64, doc_count: i64, total_docs: i64) -> f64 {
    if sum_freq == 0 {
        return 0.0;
    }
    let tf = freq as f64 / sum_freq as f64;
    let idf = ((total_docs as f64 + 1.0) / (doc_count as f64 + 1.0)).log10() + 1.0;
    tf * idf
}

/// Rebuild the `tf_idf` table from the global-terms JSON and the current
/// `relation_distance` contents. Returns the number of terms upserted.
pub async fn compute_tf_idf(config: &Config, pool: &SqlitePool) -> Result<u64> {
    migrate::ensure_schema(pool).await?;

    let content = std::fs::read_to_string(&config.tfidf.global_terms_path).with_context(|| {
        format!(
            "Failed to read global terms file: {}",
            config.tfidf.global_terms_path.display()
        )
    })?;
    let global_terms: TokenMap =
        serde_json::from_str(&content).context("Failed to parse global terms JSON")?;

    // Retain the scoreable subset: frequent enough, and longer than one char.
    let retained: Vec<(&String, i64)> = global_terms
        .iter()
        .filter(|(word, &freq)| freq >= config.tfidf.min_thres_freq && word.chars().count() > 1)
        .map(|(word, &freq)| (word, freq))
        .collect();

    let sum_freq: i64 = retained.iter().map(|(_, freq)| freq).sum();

    let doc_count_rows: Vec<(String, i64)> = sqlx::query_as(
        "SELECT token, COUNT(DISTINCT file_name) FROM relation_distance GROUP BY token",
    )
    .fetch_all(pool)
    .await?;
    let doc_counts: HashMap<String, i64> = doc_count_rows.into_iter().collect();

    let total_docs: i64 =
        sqlx::query_scalar("SELECT COUNT(DISTINCT file_name) FROM relation_distance")
            .fetch_one(pool)
            .await?;

    // Batched upserts inside one transaction.
    let mut conn = db::open_connection(&config.storage.db_path).await?;
    let mut tx = conn.begin().await?;

    let mut buffer: Vec<TermStat> = Vec::with_capacity(config.tfidf.buffer_size);
    let mut upserted = 0u64;

    for (word, freq) in retained {
        let doc_count = doc_counts.get(word).copied().unwrap_or(0);
        buffer.push(TermStat {
            word: word.clone(),
            freq,
            doc_count,
            tf_idf: tf_idf_value(freq, sum_freq, doc_count, total_docs),
        });

        if buffer.len() == config.tfidf.buffer_size {
            upserted += flush(&mut tx, &mut buffer).await?;
        }
    }
    if !buffer.is_empty() {
        upserted += flush(&mut tx, &mut buffer).await?;
    }

    tx.commit().await?;

    info!(upserted, total_docs, "tf-idf rebuilt");
    println!("compute tf-idf");
    println!("  terms upserted: {}", upserted);
    println!("  documents: {}", total_docs);
    println!("ok");

    Ok(upserted)
}

async fn flush(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    buffer: &mut Vec<TermStat>,
) -> Result<u64> {
    let flushed = buffer.len() as u64;
    for stat in buffer.drain(..) {
        sqlx::query(
            r#"
            INSERT INTO tf_idf (word, freq, doc_count, tf_idf)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(word) DO UPDATE SET
                freq = excluded.freq,
                doc_count = excluded.doc_count,
                tf_idf = excluded.tf_idf
            "#,
        )
        .bind(&stat.word)
        .bind(stat.freq)
        .bind(stat.doc_count)
        .bind(stat.tf_idf)
        .execute(&mut **tx)
        .await?;
    }
    Ok(flushed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_worked_example() {
        // Global {"cat":10,"dog":6}, two docs with cat, one with dog:
        // N=2, sum=16.
        let cat = tf_idf_value(10, 16, 2, 2);
        assert!((cat - 0.625).abs() < 1e-9);

        let dog = tf_idf_value(6, 16, 1, 2);
        let expected = (6.0 / 16.0) * ((3.0_f64 / 2.0).log10() + 1.0);
        assert!((dog - expected).abs() < 1e-9);
        assert!((dog - 0.4411).abs() < 1e-4);
    }

    #[test]
    fn absent_token_gets_shifted_idf() {
        // doc_count = 0 gives log10(N+1) + 1.
        let value = tf_idf_value(8, 16, 0, 9);
        let expected = 0.5 * (10.0_f64.log10() + 1.0);
        assert!((value - expected).abs() < 1e-12);
    }

    #[test]
    fn empty_corpus_yields_zero() {
        assert_eq!(tf_idf_value(4, 0, 0, 0), 0.0);
    }
}
