//! Relation types and the target classes they apply to.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A directed binary association between a subject and an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationType {
    Like,
    Follow,
}

/// The class of entity a relation may point at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    /// User profiles.
    User,
    /// Posts and comments.
    Content,
}

impl RelationType {
    pub const ALL: [RelationType; 2] = [RelationType::Like, RelationType::Follow];

    pub fn as_str(&self) -> &'static str {
        match self {
            RelationType::Like => "like",
            RelationType::Follow => "follow",
        }
    }

    /// Which class of entity the object id must refer to.
    pub fn target_kind(&self) -> TargetKind {
        match self {
            RelationType::Like => TargetKind::Content,
            RelationType::Follow => TargetKind::User,
        }
    }

    /// Whether a subject may hold this relation to itself.
    ///
    /// Follow never allows it. Like targets content, so "self" there means
    /// liking something you own, which is allowed.
    pub fn allows_self(&self) -> bool {
        match self {
            RelationType::Like => true,
            RelationType::Follow => false,
        }
    }
}

impl fmt::Display for RelationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown relation type: {0}")]
pub struct ParseRelationTypeError(pub String);

impl FromStr for RelationType {
    type Err = ParseRelationTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "like" | "likes" => Ok(RelationType::Like),
            "follow" | "follows" => Ok(RelationType::Follow),
            other => Err(ParseRelationTypeError(other.to_string())),
        }
    }
}

impl TargetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetKind::User => "user",
            TargetKind::Content => "content",
        }
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
