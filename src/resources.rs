//! Resource recorder: stable identities for source files.
//!
//! Each candidate file gets a content identifier derived from its path, its
//! modification time, and the number of extracted chunks the external
//! `pdf_chunks` table holds for it. The identifier is an MD5 fingerprint of
//! that triple, not a security hash; it only has to be collision-free over
//! distinct (path, mtime, chunk_count) inputs.

use anyhow::{Context, Result};
use md5::{Digest, Md5};
use sqlx::SqlitePool;
use std::path::Path;
use tracing::{info, warn};

use crate::config::Config;
use crate::dump;
use crate::migrate;
use crate::models::ResourceRecord;
use crate::progress::{ProgressEvent, ProgressReporter};
use crate::scan;

/// Behaviour switches for one recorder run.
pub struct ResourceOptions {
    pub reset_table: bool,
    pub dump: bool,
}

impl ResourceOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            reset_table: config.resources.reset_table,
            dump: config.dumps.enabled,
        }
    }
}

/// Stable document id: hex MD5 of the canonical `path|mtime|chunk_count`
/// rendering.
pub fn stable_resource_id(file_path: &str, epoch_time: i64, chunk_count: i64) -> String {
    let mut hasher = Md5::new();
    hasher.update(format!("{}|{}|{}", file_path, epoch_time, chunk_count).as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Count the extractor's chunks for a document stem.
///
/// The boundary convention with the chunker keys `pdf_chunks` by the text
/// file name, i.e. the stem plus `.txt`. A missing table or row reads as 0.
pub async fn count_chunks(pool: &SqlitePool, stem: &str) -> i64 {
    let file_name = format!("{}.txt", stem);
    match sqlx::query_scalar::<_, i64>("SELECT COUNT(chunk_id) FROM pdf_chunks WHERE file_name = ?")
        .bind(&file_name)
        .fetch_one(pool)
        .await
    {
        Ok(count) => count,
        Err(e) => {
            warn!(file_name, error = %e, "chunk count unavailable, using 0");
            0
        }
    }
}

/// Record every matching file under the resource directory.
///
/// Append semantics: a `file_name` already present in `file_info` is skipped
/// entirely. Reset semantics: with `reset_table`, the table is dropped and
/// recreated first. Returns the number of rows written.
pub async fn record_resources(
    config: &Config,
    pool: &SqlitePool,
    options: &ResourceOptions,
    progress: &dyn ProgressReporter,
) -> Result<u64> {
    migrate::ensure_schema(pool).await?;

    let files = scan::list_input_files(
        &config.resources.resource_dir,
        &config.resources.include_globs,
    )
    .context("listing resource files")?;

    if options.reset_table {
        migrate::reset_file_info(pool).await?;
    }

    let dump_path = config.dumps.resource_dump_path();
    let mut dump_reset_pending = options.dump;

    let mut written = 0u64;
    let mut skipped = 0u64;
    let total = files.len() as u64;

    for (index, file) in files.iter().enumerate() {
        let stem = match file.file_stem() {
            Some(stem) => stem.to_string_lossy().to_string(),
            None => continue,
        };

        let exists: Option<i64> = sqlx::query_scalar("SELECT 1 FROM file_info WHERE file_name = ?")
            .bind(&stem)
            .fetch_optional(pool)
            .await?;
        if exists.is_some() {
            skipped += 1;
            continue;
        }

        let record = match build_record(pool, file, &stem).await {
            Ok(record) => record,
            Err(e) => {
                warn!(path = %file.display(), error = %e, "skipping unreadable resource");
                skipped += 1;
                continue;
            }
        };

        sqlx::query(
            r#"
            INSERT OR REPLACE INTO file_info (id, file_name, file_path, epoch_time, chunk_count)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.id)
        .bind(&record.file_name)
        .bind(&record.file_path)
        .bind(record.epoch_time)
        .bind(record.chunk_count)
        .execute(pool)
        .await?;

        if options.dump {
            if dump_reset_pending {
                dump_reset_pending = false;
                dump::reset_resource_dump(&dump_path);
            }
            dump::append_resource_row(&dump_path, &record);
        }

        written += 1;
        progress.report(ProgressEvent {
            stage: "resources",
            n: index as u64 + 1,
            total,
        });
    }

    info!(written, skipped, "resource records updated");
    println!("update database information");
    println!("  files found: {}", files.len());
    println!("  records written: {}", written);
    println!("  skipped: {}", skipped);
    println!("ok");

    Ok(written)
}

async fn build_record(pool: &SqlitePool, path: &Path, stem: &str) -> Result<ResourceRecord> {
    let metadata = std::fs::metadata(path)?;
    let modified = metadata
        .modified()
        .unwrap_or(std::time::SystemTime::UNIX_EPOCH);
    let epoch_time = modified
        .duration_since(std::time::SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64;

    let chunk_count = count_chunks(pool, stem).await;
    let file_path = path.to_string_lossy().to_string();
    let id = stable_resource_id(&file_path, epoch_time, chunk_count);

    Ok(ResourceRecord {
        id,
        file_name: stem.to_string(),
        file_path,
        epoch_time,
        chunk_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_is_hex_md5_of_triple() {
        let id = stable_resource_id("data/resources/a.pdf", 1700000000, 3);
        assert_eq!(id.len(), 32);
        assert!(id.bytes().all(|b| b.is_ascii_hexdigit()));
        // Deterministic
        assert_eq!(id, stable_resource_id("data/resources/a.pdf", 1700000000, 3));
    }

    #[test]
    fn id_distinguishes_each_component() {
        let base = stable_resource_id("a.pdf", 100, 1);
        assert_ne!(base, stable_resource_id("b.pdf", 100, 1));
        assert_ne!(base, stable_resource_id("a.pdf", 101, 1));
        assert_ne!(base, stable_resource_id("a.pdf", 100, 2));
    }
}
