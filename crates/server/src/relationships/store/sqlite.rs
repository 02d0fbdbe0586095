use affinity_common::RelationType;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::SqlitePool;
use tracing::{debug, info};

use super::{InsertOutcome, RelationshipStore, StoreError};
use crate::relationships::{ListAnchor, ListQuery, RelationKey, RelationRow};

/// Fixed-width timestamps so lexical order matches time order.
fn format_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_row(
    (subject_id, object_id, relation_type, created_at): (String, String, String, String),
) -> Result<RelationRow, StoreError> {
    let relation_type = relation_type
        .parse::<RelationType>()
        .map_err(|e| StoreError::Unavailable(format!("corrupt row: {}", e)))?;
    let created_at = DateTime::parse_from_rfc3339(&created_at)
        .map_err(|e| StoreError::Unavailable(format!("corrupt row timestamp: {}", e)))?
        .with_timezone(&Utc);
    Ok(RelationRow {
        subject_id,
        object_id,
        relation_type,
        created_at,
    })
}

fn anchor_filter(anchor: &ListAnchor) -> (&'static str, &str) {
    match anchor {
        ListAnchor::Object(id) => ("object_id = ?", id.as_str()),
        ListAnchor::Subject(id) => ("subject_id = ?", id.as_str()),
    }
}

/// Relationship rows in the shared SQLite database.
pub struct SqliteRelationshipStore {
    pool: SqlitePool,
}

impl SqliteRelationshipStore {
    pub async fn new(pool: SqlitePool) -> anyhow::Result<Self> {
        let store = Self { pool };
        store.init_db().await?;
        info!("[Relationships] Store initialized");
        Ok(store)
    }

    async fn init_db(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS relationships (
                subject_id TEXT NOT NULL,
                object_id TEXT NOT NULL,
                relation_type TEXT NOT NULL,
                created_at TEXT NOT NULL,
                UNIQUE(subject_id, object_id, relation_type)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_relationships_object
             ON relationships (object_id, relation_type, created_at)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_relationships_subject
             ON relationships (subject_id, relation_type, created_at)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl RelationshipStore for SqliteRelationshipStore {
    async fn exists(&self, key: &RelationKey) -> Result<bool, StoreError> {
        let row: Option<(i64,)> = sqlx::query_as(
            "SELECT 1 FROM relationships
             WHERE subject_id = ? AND object_id = ? AND relation_type = ?",
        )
        .bind(&key.subject_id)
        .bind(&key.object_id)
        .bind(key.relation_type.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.is_some())
    }

    async fn insert(&self, key: &RelationKey) -> Result<InsertOutcome, StoreError> {
        let result = sqlx::query(
            "INSERT INTO relationships (subject_id, object_id, relation_type, created_at)
             VALUES (?, ?, ?, ?)",
        )
        .bind(&key.subject_id)
        .bind(&key.object_id)
        .bind(key.relation_type.as_str())
        .bind(format_ts(Utc::now()))
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(InsertOutcome::Inserted),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                debug!(
                    "[Relationships] Unique constraint hit for {}:{}:{}",
                    key.subject_id, key.object_id, key.relation_type
                );
                Ok(InsertOutcome::Conflict)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, key: &RelationKey) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "DELETE FROM relationships
             WHERE subject_id = ? AND object_id = ? AND relation_type = ?",
        )
        .bind(&key.subject_id)
        .bind(&key.object_id)
        .bind(key.relation_type.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn count_for_object(
        &self,
        object_id: &str,
        relation_type: RelationType,
    ) -> Result<u64, StoreError> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM relationships WHERE object_id = ? AND relation_type = ?",
        )
        .bind(object_id)
        .bind(relation_type.as_str())
        .fetch_one(&self.pool)
        .await?;
        Ok(count.max(0) as u64)
    }

    async fn list(&self, query: &ListQuery) -> Result<Vec<RelationRow>, StoreError> {
        let (filter, anchor_id) = anchor_filter(&query.anchor);
        let mut sql = format!(
            "SELECT subject_id, object_id, relation_type, created_at FROM relationships
             WHERE {} AND relation_type = ?",
            filter
        );
        if query.since.is_some() {
            sql.push_str(" AND created_at >= ?");
        }
        sql.push_str(" ORDER BY created_at DESC, subject_id, object_id LIMIT ? OFFSET ?");

        let mut q = sqlx::query_as::<_, (String, String, String, String)>(&sql)
            .bind(anchor_id)
            .bind(query.relation_type.as_str());
        if let Some(since) = query.since {
            q = q.bind(format_ts(since));
        }
        let rows = q
            .bind(i64::from(query.limit))
            .bind(i64::try_from(query.offset).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(parse_row).collect()
    }

    async fn count_matching(&self, query: &ListQuery) -> Result<u64, StoreError> {
        let (filter, anchor_id) = anchor_filter(&query.anchor);
        let mut sql = format!(
            "SELECT COUNT(*) FROM relationships WHERE {} AND relation_type = ?",
            filter
        );
        if query.since.is_some() {
            sql.push_str(" AND created_at >= ?");
        }

        let mut q = sqlx::query_as::<_, (i64,)>(&sql)
            .bind(anchor_id)
            .bind(query.relation_type.as_str());
        if let Some(since) = query.since {
            q = q.bind(format_ts(since));
        }
        let (count,) = q.fetch_one(&self.pool).await?;
        Ok(count.max(0) as u64)
    }

    async fn toggle_atomic(&self, key: &RelationKey) -> Result<Option<bool>, StoreError> {
        // The DELETE takes the write lock first, so concurrent toggles on the
        // same database serialize here instead of racing probe against insert.
        let mut tx = self.pool.begin().await?;

        let removed = sqlx::query(
            "DELETE FROM relationships
             WHERE subject_id = ? AND object_id = ? AND relation_type = ?",
        )
        .bind(&key.subject_id)
        .bind(&key.object_id)
        .bind(key.relation_type.as_str())
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if removed == 0 {
            sqlx::query(
                "INSERT INTO relationships (subject_id, object_id, relation_type, created_at)
                 VALUES (?, ?, ?, ?)",
            )
            .bind(&key.subject_id)
            .bind(&key.object_id)
            .bind(key.relation_type.as_str())
            .bind(format_ts(Utc::now()))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(Some(removed == 0))
    }
}
