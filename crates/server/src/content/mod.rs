//! Content Store collaborator
//!
//! Posts, comments and profiles are owned by other services. The relationship
//! core only asks whether a target exists (and, for display, who owns it), so
//! that is all this trait exposes. The `entities` table is a projection those
//! services keep up to date.

pub mod memory;
pub mod sqlite;

use affinity_common::TargetKind;
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

pub use memory::MemoryContentStore;
pub use sqlite::SqliteContentStore;

/// Concrete entity kinds known to the content projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    User,
    Post,
    Comment,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::User => "user",
            EntityKind::Post => "post",
            EntityKind::Comment => "comment",
        }
    }

    pub fn target_kind(&self) -> TargetKind {
        match self {
            EntityKind::User => TargetKind::User,
            EntityKind::Post | EntityKind::Comment => TargetKind::Content,
        }
    }
}

/// An object id qualified by the class of entity it must be.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TargetRef {
    pub kind: TargetKind,
    pub id: String,
}

impl TargetRef {
    pub fn new(kind: TargetKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }

    pub fn user(id: impl Into<String>) -> Self {
        Self::new(TargetKind::User, id)
    }

    pub fn content(id: impl Into<String>) -> Self {
        Self::new(TargetKind::Content, id)
    }
}

impl fmt::Display for TargetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

#[async_trait]
pub trait ContentStore: Send + Sync + 'static {
    /// Minimal existence read for a target.
    async fn exists(&self, target: &TargetRef) -> Result<bool>;

    /// Owner of a target, if it exists and has one. Users own themselves.
    async fn owner_of(&self, target: &TargetRef) -> Result<Option<String>>;
}
