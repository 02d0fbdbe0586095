//! JSON bodies exchanged over the relationship endpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::relation::RelationType;

/// Authoritative result of a toggle: whether the relation now exists and how
/// many subjects hold it towards the object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToggleState {
    pub present: bool,
    pub count: u64,
}

/// Read-side view. `present` is omitted for unauthenticated callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationView {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub present: Option<bool>,
    pub count: u64,
}

impl From<ToggleState> for RelationView {
    fn from(state: ToggleState) -> Self {
        Self {
            present: Some(state.present),
            count: state.count,
        }
    }
}

/// One row of a relationship listing.
///
/// `id` is the entity on the far side of the listing anchor: the subject when
/// listing who relates to an object, the object when listing what a subject
/// relates to. Clients de-duplicate pages on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationshipItem {
    pub id: String,
    pub subject_id: String,
    pub object_id: String,
    pub relation_type: RelationType,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}
