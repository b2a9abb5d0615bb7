//! Database schema creation.
//!
//! Creates all tables the pipeline reads and writes, idempotently. Each
//! component also carries its own destructive reset path (drop + recreate)
//! used when its `reset_table` flag is set; the definitions here and there
//! must stay in sync.
//!
//! # Tables
//!
//! | Table | Purpose |
//! |-------|---------|
//! | `file_token` | One aggregate fingerprint row per document |
//! | `relation_distance` | Filtered weighted tokens, one row per (document, token) |
//! | `file_info` | Source files keyed by name with a stable content-hash id |
//! | `tf_idf` | Corpus-wide term statistics |
//! | `item_matrix_triangle` | Upper-triangle pairwise similarity edges |
//! | `pdf_chunks` | External extractor output; only counted here, never written |
//!
//! `UNIQUE(target_id, source_id)` on `item_matrix_triangle` is load-bearing:
//! together with `INSERT OR IGNORE` it makes similarity re-runs idempotent.

use anyhow::Result;
use sqlx::SqlitePool;

/// Create every table the pipeline consumes. Safe to call repeatedly.
pub async fn ensure_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS file_token (
            file_name TEXT PRIMARY KEY,
            total_tokens INTEGER NOT NULL,
            unique_tokens INTEGER NOT NULL,
            relational_distance REAL NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS relation_distance (
            file_name TEXT NOT NULL,
            token TEXT NOT NULL,
            frequency INTEGER NOT NULL,
            relational_distance REAL NOT NULL,
            PRIMARY KEY (file_name, token)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS file_info (
            id TEXT UNIQUE,
            file_name TEXT PRIMARY KEY,
            file_path TEXT NOT NULL,
            epoch_time INTEGER NOT NULL,
            chunk_count INTEGER NOT NULL DEFAULT 0
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS tf_idf (
            word TEXT PRIMARY KEY,
            freq INTEGER,
            doc_count INTEGER,
            tf_idf REAL
        )
        "#,
    )
    .execute(pool)
    .await?;

    create_item_matrix(pool).await?;

    // External boundary: the extractor owns this table. Creating it empty
    // keeps a fresh database self-contained (chunk counts read as zero).
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS pdf_chunks (
            file_name TEXT NOT NULL,
            chunk_id INTEGER NOT NULL,
            chunk_text TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_relation_distance_token ON relation_distance(token)")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_item_matrix_source ON item_matrix_triangle(source_id)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn create_item_matrix(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS item_matrix_triangle (
            target_id TEXT NOT NULL,
            target_name TEXT NOT NULL,
            source_id TEXT NOT NULL,
            source_name TEXT NOT NULL,
            distance REAL NOT NULL,
            UNIQUE(target_id, source_id)
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

/// Drop and recreate the fingerprint tables.
pub async fn reset_fingerprint_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query("DROP TABLE IF EXISTS file_token")
        .execute(pool)
        .await?;
    sqlx::query("DROP TABLE IF EXISTS relation_distance")
        .execute(pool)
        .await?;
    sqlx::query(
        r#"
        CREATE TABLE file_token (
            file_name TEXT PRIMARY KEY,
            total_tokens INTEGER NOT NULL,
            unique_tokens INTEGER NOT NULL,
            relational_distance REAL NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;
    sqlx::query(
        r#"
        CREATE TABLE relation_distance (
            file_name TEXT NOT NULL,
            token TEXT NOT NULL,
            frequency INTEGER NOT NULL,
            relational_distance REAL NOT NULL,
            PRIMARY KEY (file_name, token)
        )
        "#,
    )
    .execute(pool)
    .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_relation_distance_token ON relation_distance(token)")
        .execute(pool)
        .await?;
    Ok(())
}

/// Drop and recreate the resource table.
pub async fn reset_file_info(pool: &SqlitePool) -> Result<()> {
    sqlx::query("DROP TABLE IF EXISTS file_info")
        .execute(pool)
        .await?;
    sqlx::query(
        r#"
        CREATE TABLE file_info (
            id TEXT UNIQUE,
            file_name TEXT PRIMARY KEY,
            file_path TEXT NOT NULL,
            epoch_time INTEGER NOT NULL,
            chunk_count INTEGER NOT NULL DEFAULT 0
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

/// Drop and recreate the similarity triangle.
pub async fn reset_item_matrix(pool: &SqlitePool) -> Result<()> {
    sqlx::query("DROP TABLE IF EXISTS item_matrix_triangle")
        .execute(pool)
        .await?;
    create_item_matrix(pool).await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_item_matrix_source ON item_matrix_triangle(source_id)",
    )
    .execute(pool)
    .await?;
    Ok(())
}
