//! Relationship Service Layer
//!
//! Directed binary associations (likes, follows) between a subject and an
//! object. The store's uniqueness constraint on
//! `(subject_id, object_id, relation_type)` is the only thing keeping a triple
//! to a single row; the engine holds no locks between its round trips.

pub mod engine;
pub mod handlers;
pub mod router;
pub mod store;

use affinity_common::{RelationType, RelationshipItem};
use chrono::{DateTime, Utc};
use thiserror::Error;

pub use engine::{EngineOptions, MutationOutcome, ToggleEngine};
pub use router::router;
pub use store::{
    InsertOutcome, MemoryRelationshipStore, RelationshipStore, SqliteRelationshipStore, StoreError,
};

/// Uniqueness key of a relationship row.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RelationKey {
    pub subject_id: String,
    pub object_id: String,
    pub relation_type: RelationType,
}

impl RelationKey {
    pub fn new(
        subject_id: impl Into<String>,
        object_id: impl Into<String>,
        relation_type: RelationType,
    ) -> Self {
        Self {
            subject_id: subject_id.into(),
            object_id: object_id.into(),
            relation_type,
        }
    }
}

/// A persisted relationship.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationRow {
    pub subject_id: String,
    pub object_id: String,
    pub relation_type: RelationType,
    pub created_at: DateTime<Utc>,
}

/// Which side of the relation a listing is pinned to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListAnchor {
    /// Subjects holding the relation towards this object (likers, followers).
    Object(String),
    /// Objects this subject holds the relation towards (liked content, following).
    Subject(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    pub anchor: ListAnchor,
    pub relation_type: RelationType,
    pub since: Option<DateTime<Utc>>,
    pub offset: u64,
    pub limit: u32,
}

impl RelationRow {
    /// Wire form of the row as seen from `anchor`.
    pub fn into_item(self, anchor: &ListAnchor) -> RelationshipItem {
        let id = match anchor {
            ListAnchor::Object(_) => self.subject_id.clone(),
            ListAnchor::Subject(_) => self.object_id.clone(),
        };
        RelationshipItem {
            id,
            subject_id: self.subject_id,
            object_id: self.object_id,
            relation_type: self.relation_type,
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, Error)]
pub enum RelationError {
    #[error("target not found: {0}")]
    NotFound(String),
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    StoreUnavailable(#[from] StoreError),
}
