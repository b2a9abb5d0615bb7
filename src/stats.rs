//! Database statistics and health overview.
//!
//! A quick summary of what the pipeline has built: fingerprint counts, term
//! statistics, triangle size, and resource coverage. Gives confidence that
//! ingestion and the similarity build are working as expected.

use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::migrate;

/// Print a summary of every table the pipeline owns.
pub async fn show_components(config: &Config, pool: &SqlitePool) -> Result<()> {
    migrate::ensure_schema(pool).await?;

    let documents: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM file_token")
        .fetch_one(pool)
        .await?;
    let token_rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM relation_distance")
        .fetch_one(pool)
        .await?;
    let resources: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM file_info")
        .fetch_one(pool)
        .await?;
    let with_chunks: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM file_info WHERE chunk_count > 0")
            .fetch_one(pool)
            .await?;
    let terms: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tf_idf")
        .fetch_one(pool)
        .await?;
    let edges: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM item_matrix_triangle")
        .fetch_one(pool)
        .await?;

    let db_size = std::fs::metadata(&config.storage.db_path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("studyrec — components");
    println!("=====================");
    println!();
    println!("  Database:      {}", config.storage.db_path.display());
    println!("  Size:          {}", format_bytes(db_size));
    println!();
    println!("  Documents:     {}", documents);
    println!("  Token rows:    {}", token_rows);
    println!(
        "  Resources:     {} ({} with chunks)",
        resources, with_chunks
    );
    println!("  Terms:         {}", terms);
    println!("  Matrix edges:  {}", edges);
    println!();

    Ok(())
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_format_scales() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.0 MB");
    }
}
