//! Relationship Store
//!
//! Durable rows keyed uniquely by `(subject_id, object_id, relation_type)`.
//! Implementations must enforce that key atomically and report a duplicate
//! insert as [`InsertOutcome::Conflict`] rather than an error.

pub mod memory;
pub mod sqlite;

use affinity_common::RelationType;
use async_trait::async_trait;
use thiserror::Error;

use super::{ListQuery, RelationKey, RelationRow};

pub use memory::MemoryRelationshipStore;
pub use sqlite::SqliteRelationshipStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Result of an insert attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// The uniqueness constraint rejected the row: the triple already exists.
    Conflict,
}

#[async_trait]
pub trait RelationshipStore: Send + Sync + 'static {
    async fn exists(&self, key: &RelationKey) -> Result<bool, StoreError>;

    async fn insert(&self, key: &RelationKey) -> Result<InsertOutcome, StoreError>;

    /// Returns whether a row was removed.
    async fn delete(&self, key: &RelationKey) -> Result<bool, StoreError>;

    /// Fresh aggregate: how many subjects hold `relation_type` towards `object_id`.
    async fn count_for_object(
        &self,
        object_id: &str,
        relation_type: RelationType,
    ) -> Result<u64, StoreError>;

    async fn list(&self, query: &ListQuery) -> Result<Vec<RelationRow>, StoreError>;

    /// Row count matching `query`'s anchor and filters, ignoring offset/limit.
    async fn count_matching(&self, query: &ListQuery) -> Result<u64, StoreError>;

    /// Flip the triple in one atomic step and return whether it is now present.
    ///
    /// `Ok(None)` means the store has no such primitive.
    async fn toggle_atomic(&self, _key: &RelationKey) -> Result<Option<bool>, StoreError> {
        Ok(None)
    }
}
