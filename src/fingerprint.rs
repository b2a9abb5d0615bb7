//! Fingerprint writer: persists document fingerprints.
//!
//! Coordinates the ingestion flow for token JSON files: list inputs →
//! token transform → persist → optional CSV dumps. One write transaction
//! spans the whole batch so a database failure rolls everything back, while
//! per-file parse problems only skip that file.
//!
//! # Pipeline
//!
//! 1. **List inputs** — every matching JSON under the configured token
//!    directory, in sorted order.
//! 2. **Reset** — when `reset_table` is set, `file_token` and
//!    `relation_distance` are dropped and recreated first.
//! 3. **Transform** — each file runs through the token transform
//!    ([`crate::tokens`]); empty and unparseable files degrade to an empty
//!    map and still record an all-zero fingerprint row.
//! 4. **Persist** — one `file_token` upsert plus one `relation_distance`
//!    upsert per surviving token, all through statements reused across the
//!    batch. Synchronous mode is OFF for the duration and restored after
//!    the commit.
//! 5. **Dump** — with `dump` set, one CSV row per document is appended to
//!    the fingerprint dump (truncated before the first write) and the
//!    filtered tokens are mirrored under `processed_data/filtered/`.
//! 6. **Cleanup** — with `delete_source` configured, each successfully
//!    persisted JSON is removed.

use anyhow::{Context, Result};
use sqlx::{Connection, SqlitePool};
use std::path::PathBuf;
use tracing::{info, warn};

use crate::config::Config;
use crate::db;
use crate::dump;
use crate::migrate;
use crate::progress::{ProgressEvent, ProgressReporter};
use crate::scan;
use crate::tokens;

/// Behaviour switches for one fingerprint run.
pub struct FingerprintOptions {
    pub reset_table: bool,
    pub dump: bool,
    pub delete_source: bool,
}

impl FingerprintOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            reset_table: config.ingest.reset_table,
            dump: config.dumps.enabled,
            delete_source: config.ingest.delete_source,
        }
    }
}

/// Ingest every token JSON under the configured input directory.
///
/// Returns the number of documents persisted. Files that cannot be read are
/// skipped with a warning; a database error aborts and rolls back the batch.
pub async fn write_fingerprints(
    config: &Config,
    pool: &SqlitePool,
    options: &FingerprintOptions,
    progress: &dyn ProgressReporter,
) -> Result<u64> {
    migrate::ensure_schema(pool).await?;

    let files = scan::list_input_files(&config.ingest.token_json_dir, &config.ingest.include_globs)
        .context("listing token JSON inputs")?;

    if options.reset_table {
        migrate::reset_fingerprint_tables(pool).await?;
    }

    let dump_path = config.dumps.fingerprint_dump_path();
    let filtered_dir = config.dumps.filtered_dir();

    // The batch owns a dedicated connection: one transaction spans all
    // inputs, with durability relaxed for the duration.
    let mut conn = db::open_connection(&config.storage.db_path).await?;
    sqlx::query("PRAGMA synchronous = OFF")
        .execute(&mut conn)
        .await?;

    let mut written = 0u64;
    let mut skipped = 0u64;
    let mut token_rows = 0u64;
    let mut persisted: Vec<PathBuf> = Vec::new();
    let mut dump_reset_pending = options.dump;

    let total = files.len() as u64;
    let result: Result<()> = async {
        let mut tx = conn.begin().await?;

        for file in &files {
            let fingerprint =
                match tokens::fingerprint_document(file, config.ingest.max_length, config.ingest.min_value)
                {
                    Ok(fp) => fp,
                    Err(e) => {
                        warn!(path = %file.display(), error = %e, "skipping unreadable token file");
                        skipped += 1;
                        continue;
                    }
                };

            sqlx::query(
                r#"
                INSERT OR REPLACE INTO file_token
                    (file_name, total_tokens, unique_tokens, relational_distance)
                VALUES (?, ?, ?, ?)
                "#,
            )
            .bind(&fingerprint.file_name)
            .bind(fingerprint.total_tokens)
            .bind(fingerprint.unique_tokens)
            .bind(fingerprint.relational_distance)
            .execute(&mut *tx)
            .await?;

            for token in &fingerprint.tokens {
                sqlx::query(
                    r#"
                    INSERT OR REPLACE INTO relation_distance
                        (file_name, token, frequency, relational_distance)
                    VALUES (?, ?, ?, ?)
                    "#,
                )
                .bind(&fingerprint.file_name)
                .bind(&token.token)
                .bind(token.frequency)
                .bind(token.weight)
                .execute(&mut *tx)
                .await?;
                token_rows += 1;
            }

            if options.dump {
                if dump_reset_pending {
                    dump_reset_pending = false;
                    dump::reset_fingerprint_dump(&dump_path);
                }
                dump::append_fingerprint_row(&dump_path, &fingerprint);
                dump::write_filtered_dump(&filtered_dir, &fingerprint);
            }

            written += 1;
            persisted.push(file.clone());
            progress.report(ProgressEvent {
                stage: "fingerprint",
                n: written,
                total,
            });
        }

        tx.commit().await?;
        Ok(())
    }
    .await;

    // Restore durable sync mode whether or not the batch landed.
    let _ = sqlx::query("PRAGMA synchronous = FULL")
        .execute(&mut conn)
        .await;
    result?;

    if options.delete_source {
        for file in &persisted {
            if let Err(e) = std::fs::remove_file(file) {
                warn!(path = %file.display(), error = %e, "could not delete source JSON");
            }
        }
    }

    info!(written, skipped, token_rows, "fingerprint batch committed");
    println!("compute relational distance");
    println!("  files found: {}", files.len());
    println!("  documents written: {}", written);
    println!("  token rows written: {}", token_rows);
    if skipped > 0 {
        println!("  skipped: {}", skipped);
    }
    println!("ok");

    Ok(written)
}
