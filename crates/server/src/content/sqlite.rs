use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use tracing::info;

use super::{ContentStore, EntityKind, TargetRef};
use affinity_common::TargetKind;

fn kinds_for(kind: TargetKind) -> (&'static str, &'static str) {
    match kind {
        TargetKind::User => ("user", "user"),
        TargetKind::Content => ("post", "comment"),
    }
}

pub struct SqliteContentStore {
    pool: SqlitePool,
}

impl SqliteContentStore {
    pub async fn new(pool: SqlitePool) -> Result<Self> {
        let store = Self { pool };
        store.init_db().await?;
        info!("[Content] Initialized");
        Ok(store)
    }

    async fn init_db(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS entities (
                id TEXT PRIMARY KEY,
                kind TEXT NOT NULL,
                owner_id TEXT,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Record an entity in the projection. Re-registering is a no-op.
    pub async fn register(&self, id: &str, kind: EntityKind, owner_id: Option<&str>) -> Result<()> {
        sqlx::query(
            "INSERT OR IGNORE INTO entities (id, kind, owner_id, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(id)
        .bind(kind.as_str())
        .bind(owner_id)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Drop an entity from the projection.
    pub async fn remove(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM entities WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl ContentStore for SqliteContentStore {
    async fn exists(&self, target: &TargetRef) -> Result<bool> {
        let (a, b) = kinds_for(target.kind);
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT 1 FROM entities WHERE id = ? AND kind IN (?, ?) LIMIT 1")
                .bind(&target.id)
                .bind(a)
                .bind(b)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.is_some())
    }

    async fn owner_of(&self, target: &TargetRef) -> Result<Option<String>> {
        let (a, b) = kinds_for(target.kind);
        let row: Option<(String, Option<String>)> =
            sqlx::query_as("SELECT kind, owner_id FROM entities WHERE id = ? AND kind IN (?, ?)")
                .bind(&target.id)
                .bind(a)
                .bind(b)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.and_then(|(kind, owner)| {
            if kind == "user" {
                Some(target.id.clone())
            } else {
                owner
            }
        }))
    }
}
