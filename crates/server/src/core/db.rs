//! SQLite connection pool
//!
//! All stores share one pool over `affinity.sqlite`. WAL mode lets readers
//! proceed while a toggle writes, and the busy timeout turns short writer
//! contention into waiting instead of `SQLITE_BUSY`.

use anyhow::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

pub const DB_FILE: &str = "affinity.sqlite";

/// Open (creating if missing) the database under `dir`.
pub async fn open_pool(dir: &Path) -> Result<SqlitePool> {
    tokio::fs::create_dir_all(dir).await?;
    let db_path = dir.join(DB_FILE);

    let options = SqliteConnectOptions::from_str(&format!(
        "sqlite://{}",
        db_path.to_string_lossy().replace('\\', "/")
    ))?
    .create_if_missing(true)
    .journal_mode(SqliteJournalMode::Wal)
    .busy_timeout(Duration::from_secs(5));

    let pool = SqlitePoolOptions::new()
        .max_connections(8)
        .connect_with(options)
        .await?;

    info!("[Db] Opened {:?}", db_path);
    Ok(pool)
}
