use anyhow::Result;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteConnection, SqliteJournalMode, SqlitePool, SqlitePoolOptions,
    SqliteSynchronous,
};
use sqlx::ConnectOptions;
use std::path::Path;
use std::str::FromStr;

use crate::config::Config;

fn base_options(db_path: &Path) -> Result<SqliteConnectOptions> {
    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal);

    Ok(options)
}

pub async fn connect(config: &Config) -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(base_options(&config.storage.db_path)?)
        .await?;

    Ok(pool)
}

/// A dedicated connection for operations that own their transaction scope.
pub async fn open_connection(db_path: &Path) -> Result<SqliteConnection> {
    let conn = base_options(db_path)?.connect().await?;
    Ok(conn)
}

/// A connection tuned for the bulk paths: durability traded away for speed,
/// temporary tables held in memory. WAL keeps concurrent readers safe.
pub async fn open_worker_connection(db_path: &Path) -> Result<SqliteConnection> {
    let conn = base_options(db_path)?
        .synchronous(SqliteSynchronous::Off)
        .pragma("temp_store", "MEMORY")
        .connect()
        .await?;
    Ok(conn)
}
