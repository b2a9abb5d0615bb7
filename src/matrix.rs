//! Similarity builder: the item-item matrix.
//!
//! Computes pairwise similarity over every document with extracted chunks
//! and stores it as an **upper triangle**: for any two distinct documents
//! the edge exists at most once, keyed by processing order, and self-pairs
//! are never built. `UNIQUE(target_id, source_id)` plus `INSERT OR IGNORE`
//! make re-runs idempotent.
//!
//! # Concurrency
//!
//! Multi-producer, bounded queue, single writer:
//!
//! ```text
//!             ┌ producer ──┐
//! cursor ──▶  ├ producer ──┼──▶ bounded mpsc ──▶ writer ──▶ SQLite
//! (fetch-add) └ producer ──┘    (edge batches)   (sole write connection)
//! ```
//!
//! - A shared atomic cursor partitions the source list: each producer claims
//!   a contiguous run of `ids_per_worker` indices per fetch-add and processes
//!   it fully before claiming again. The cursor is never rewound.
//! - Each producer owns its own read connection (WAL keeps concurrent
//!   readers safe), loads its source's token rows, applies the TF-IDF
//!   adjustment, and resolves co-occurring documents through a
//!   per-connection TEMP table JOIN.
//! - Producers accumulate edges locally and hand batches to the channel at
//!   `write_threshold`; in-flight batches always flush on producer exit.
//! - The writer owns the sole write connection and inserts one batch per
//!   transaction. It drains until every producer has dropped its sender.
//!
//! A failed producer logs and exits its loop; the others continue and the
//! writer still drains. A writer failure aborts the build; batches already
//! committed persist.

use anyhow::{bail, Context, Result};
use sqlx::{Connection, Row, SqliteConnection, SqlitePool};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info};

use crate::config::Config;
use crate::db;
use crate::migrate;
use crate::models::MatrixEdge;
use crate::progress::{ProgressEvent, ProgressReporter, SharedCounter};

/// Behaviour switches for one matrix build.
pub struct MatrixOptions {
    pub reset_table: bool,
}

impl MatrixOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            reset_table: config.matrix.reset_table,
        }
    }
}

struct BuildPlan {
    /// Fixed-index candidate vector, `title_<id>` key and display name.
    titles: Vec<(String, String)>,
    /// Candidate key → index in `titles`.
    index: HashMap<String, usize>,
    /// Sources still to be processed (the full candidate set on reset,
    /// the unseen remainder in append mode).
    processing: Vec<(String, String)>,
}

/// Build (or extend) the similarity triangle. Returns the number of edges
/// actually inserted.
pub async fn map_item_matrix(
    config: &Config,
    pool: &SqlitePool,
    options: &MatrixOptions,
    progress: Arc<dyn ProgressReporter>,
) -> Result<u64> {
    migrate::ensure_schema(pool).await?;

    if options.reset_table {
        migrate::reset_item_matrix(pool).await?;
    }

    let plan = collect_candidates(pool, options.reset_table).await?;

    println!("map item matrix");
    println!("  candidates: {}", plan.titles.len());
    println!("  sources to process: {}", plan.processing.len());

    if plan.processing.is_empty() {
        println!("  edges written: 0");
        println!("ok");
        return Ok(0);
    }

    let workers = if config.matrix.workers > 0 {
        config.matrix.workers
    } else {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(5)
    };

    let db_path = config.storage.db_path.clone();
    let processing = Arc::new(plan.processing);
    let index = Arc::new(plan.index);
    let names: Arc<HashMap<String, String>> =
        Arc::new(plan.titles.iter().cloned().collect());
    let cursor = Arc::new(AtomicUsize::new(0));
    let scored = Arc::new(SharedCounter::default());

    let (sender, receiver) = mpsc::channel::<Vec<MatrixEdge>>(workers * 2);

    let writer = tokio::spawn(writer_loop(receiver, db_path.clone()));

    let mut producers = Vec::with_capacity(workers);
    for worker_id in 0..workers {
        producers.push(tokio::spawn(producer_loop(ProducerContext {
            worker_id,
            db_path: db_path.clone(),
            processing: Arc::clone(&processing),
            index: Arc::clone(&index),
            names: Arc::clone(&names),
            cursor: Arc::clone(&cursor),
            scored: Arc::clone(&scored),
            progress: Arc::clone(&progress),
            ids_per_worker: config.matrix.ids_per_worker,
            write_threshold: config.matrix.write_threshold,
            sender: sender.clone(),
        })));
    }
    // Producers hold the only remaining senders; the channel closes when the
    // last one exits, which is the writer's termination signal.
    drop(sender);

    for handle in producers {
        match handle.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!(error = %e, "producer failed"),
            Err(e) => error!(error = %e, "producer panicked"),
        }
    }

    let written = match writer.await {
        Ok(Ok(written)) => written,
        Ok(Err(e)) => bail!("matrix writer failed: {e:#}"),
        Err(e) => bail!("matrix writer panicked: {e}"),
    };

    info!(written, sources = processing.len(), "similarity triangle built");
    println!("  edges written: {}", written);
    println!("ok");

    Ok(written)
}

/// Candidates are the documents with extracted chunks; in append mode,
/// sources already present in the triangle are not re-processed.
async fn collect_candidates(pool: &SqlitePool, reset: bool) -> Result<BuildPlan> {
    let rows: Vec<(String, String)> =
        sqlx::query_as("SELECT id, file_name FROM file_info WHERE chunk_count > 0")
            .fetch_all(pool)
            .await?;

    let unique: BTreeMap<String, String> = rows
        .into_iter()
        .map(|(id, name)| (format!("title_{}", id), name))
        .collect();

    let mut processing = unique.clone();
    if !reset {
        let seen: Vec<String> =
            sqlx::query_scalar("SELECT DISTINCT source_id FROM item_matrix_triangle")
                .fetch_all(pool)
                .await?;
        for key in seen {
            processing.remove(&key);
        }
    }

    let titles: Vec<(String, String)> = unique.into_iter().collect();
    let index: HashMap<String, usize> = titles
        .iter()
        .enumerate()
        .map(|(i, (key, _))| (key.clone(), i))
        .collect();

    Ok(BuildPlan {
        titles,
        index,
        processing: processing.into_iter().collect(),
    })
}

struct ProducerContext {
    worker_id: usize,
    db_path: PathBuf,
    processing: Arc<Vec<(String, String)>>,
    index: Arc<HashMap<String, usize>>,
    names: Arc<HashMap<String, String>>,
    cursor: Arc<AtomicUsize>,
    scored: Arc<SharedCounter>,
    progress: Arc<dyn ProgressReporter>,
    ids_per_worker: usize,
    write_threshold: usize,
    sender: mpsc::Sender<Vec<MatrixEdge>>,
}

async fn producer_loop(ctx: ProducerContext) -> Result<()> {
    let mut conn = db::open_worker_connection(&ctx.db_path)
        .await
        .with_context(|| format!("producer {} could not open database", ctx.worker_id))?;

    sqlx::query("CREATE TEMP TABLE IF NOT EXISTS query_tokens (token TEXT PRIMARY KEY)")
        .execute(&mut conn)
        .await?;

    // The adjustment table is read-only for the whole build; load it once
    // per connection and reuse it for every claimed source.
    let adjustments = load_adjustments(&mut conn).await?;

    let total = ctx.processing.len() as u64;
    let mut batch: Vec<MatrixEdge> = Vec::new();

    loop {
        let start = ctx.cursor.fetch_add(ctx.ids_per_worker, Ordering::SeqCst);
        if start >= ctx.processing.len() {
            break;
        }
        let end = (start + ctx.ids_per_worker).min(ctx.processing.len());

        for i in start..end {
            let (source_key, source_name) = &ctx.processing[i];
            let Some(&source_index) = ctx.index.get(source_key.as_str()) else {
                continue;
            };

            score_source(
                &mut conn,
                &ctx,
                source_key,
                source_name,
                source_index,
                &adjustments,
                &mut batch,
            )
            .await?;

            let done = ctx.scored.add(1);
            ctx.progress.report(ProgressEvent {
                stage: "similarity",
                n: done,
                total,
            });

            if batch.len() >= ctx.write_threshold {
                let full = std::mem::take(&mut batch);
                if ctx.sender.send(full).await.is_err() {
                    bail!("producer {}: writer is gone", ctx.worker_id);
                }
            }
        }
    }

    if !batch.is_empty() && ctx.sender.send(batch).await.is_err() {
        bail!("producer {}: writer is gone at final flush", ctx.worker_id);
    }

    Ok(())
}

/// Score one source against every candidate after it in processing order.
async fn score_source(
    conn: &mut SqliteConnection,
    ctx: &ProducerContext,
    source_key: &str,
    source_name: &str,
    source_index: usize,
    adjustments: &HashMap<String, f64>,
    batch: &mut Vec<MatrixEdge>,
) -> Result<()> {
    let token_rows: Vec<(String, i64, f64)> = sqlx::query_as(
        "SELECT token, frequency, relational_distance FROM relation_distance WHERE file_name = ?",
    )
    .bind(source_key)
    .fetch_all(&mut *conn)
    .await?;

    if token_rows.is_empty() {
        return Ok(());
    }

    let mut weights: HashMap<String, f64> = HashMap::with_capacity(token_rows.len());
    for (token, frequency, relational_distance) in &token_rows {
        let mut weight = *relational_distance;
        if let Some(tf_idf) = adjustments.get(token) {
            if *frequency > 0 {
                weight += tf_idf / *frequency as f64;
            }
        }
        weights.insert(token.clone(), weight);
    }

    // Resolve co-occurring documents through the per-connection temp table.
    sqlx::query("DELETE FROM query_tokens")
        .execute(&mut *conn)
        .await?;
    for (token, _, _) in &token_rows {
        sqlx::query("INSERT OR IGNORE INTO query_tokens (token) VALUES (?)")
            .bind(token)
            .execute(&mut *conn)
            .await?;
    }

    let related = sqlx::query(
        r#"
        SELECT r.file_name, r.token, r.relational_distance
        FROM relation_distance r
        JOIN query_tokens q ON r.token = q.token
        "#,
    )
    .fetch_all(&mut *conn)
    .await?;

    let mut scores: HashMap<String, f64> = HashMap::new();
    for row in related {
        let file_name: String = row.get(0);
        if file_name == source_key {
            continue;
        }
        // Upper triangle: only candidates after this source in the fixed
        // ordering; anything else either is unknown or belongs to another
        // source's half of the pair.
        match ctx.index.get(file_name.as_str()) {
            Some(&candidate_index) if candidate_index > source_index => {}
            _ => continue,
        }

        let token: String = row.get(1);
        let relational_distance: f64 = row.get(2);
        if let Some(weight) = weights.get(&token) {
            *scores.entry(file_name).or_insert(0.0) += relational_distance * weight;
        }
    }

    for (target_key, distance) in scores {
        if distance <= 0.0 {
            continue;
        }
        let target_name = match ctx.names.get(&target_key) {
            Some(name) => name.clone(),
            None => continue,
        };
        batch.push(MatrixEdge {
            target_id: target_key,
            target_name,
            source_id: source_key.to_string(),
            source_name: source_name.to_string(),
            distance,
        });
    }

    Ok(())
}

async fn load_adjustments(conn: &mut SqliteConnection) -> Result<HashMap<String, f64>> {
    let rows = sqlx::query("SELECT word, tf_idf FROM tf_idf")
        .fetch_all(&mut *conn)
        .await?;

    let mut adjustments = HashMap::with_capacity(rows.len());
    for row in rows {
        let word: String = row.get(0);
        let value: f64 = row.get(1);
        adjustments.insert(word, if value.is_nan() { 0.0 } else { value });
    }
    Ok(adjustments)
}

/// The writer owns the sole write connection: one transaction per drained
/// batch, `INSERT OR IGNORE` absorbing re-runs.
async fn writer_loop(
    mut receiver: mpsc::Receiver<Vec<MatrixEdge>>,
    db_path: PathBuf,
) -> Result<u64> {
    let mut conn = db::open_worker_connection(&db_path)
        .await
        .context("writer could not open database")?;

    let mut written = 0u64;
    while let Some(batch) = receiver.recv().await {
        let mut tx = conn.begin().await?;
        for edge in &batch {
            let result = sqlx::query(
                r#"
                INSERT OR IGNORE INTO item_matrix_triangle
                    (target_id, target_name, source_id, source_name, distance)
                VALUES (?, ?, ?, ?, ?)
                "#,
            )
            .bind(&edge.target_id)
            .bind(&edge.target_name)
            .bind(&edge.source_id)
            .bind(&edge.source_name)
            .bind(edge.distance)
            .execute(&mut *tx)
            .await?;
            written += result.rows_affected();
        }
        tx.commit().await?;
    }

    Ok(written)
}
