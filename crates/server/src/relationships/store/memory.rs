use affinity_common::RelationType;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;

use super::{InsertOutcome, RelationshipStore, StoreError};
use crate::relationships::{ListAnchor, ListQuery, RelationKey, RelationRow};

/// Process-local relationship rows.
///
/// The map key is the uniqueness key, and every trait method takes the lock
/// for exactly one operation, so probe and insert are separate steps that
/// other tasks can interleave with, just like separate database round trips.
#[derive(Default)]
pub struct MemoryRelationshipStore {
    rows: Mutex<HashMap<RelationKey, DateTime<Utc>>>,
}

impl MemoryRelationshipStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rows stored for exactly this triple (0 or 1).
    pub fn rows_for(&self, key: &RelationKey) -> usize {
        usize::from(self.rows.lock().contains_key(key))
    }

    fn matching(&self, query: &ListQuery) -> Vec<RelationRow> {
        let rows = self.rows.lock();
        let mut out: Vec<RelationRow> = rows
            .iter()
            .filter(|(key, _)| key.relation_type == query.relation_type)
            .filter(|(key, _)| match &query.anchor {
                ListAnchor::Object(id) => &key.object_id == id,
                ListAnchor::Subject(id) => &key.subject_id == id,
            })
            .filter(|(_, created_at)| query.since.map_or(true, |since| **created_at >= since))
            .map(|(key, created_at)| RelationRow {
                subject_id: key.subject_id.clone(),
                object_id: key.object_id.clone(),
                relation_type: key.relation_type,
                created_at: *created_at,
            })
            .collect();
        out.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.subject_id.cmp(&b.subject_id))
                .then_with(|| a.object_id.cmp(&b.object_id))
        });
        out
    }
}

#[async_trait]
impl RelationshipStore for MemoryRelationshipStore {
    async fn exists(&self, key: &RelationKey) -> Result<bool, StoreError> {
        Ok(self.rows.lock().contains_key(key))
    }

    async fn insert(&self, key: &RelationKey) -> Result<InsertOutcome, StoreError> {
        let mut rows = self.rows.lock();
        if rows.contains_key(key) {
            return Ok(InsertOutcome::Conflict);
        }
        rows.insert(key.clone(), Utc::now());
        Ok(InsertOutcome::Inserted)
    }

    async fn delete(&self, key: &RelationKey) -> Result<bool, StoreError> {
        Ok(self.rows.lock().remove(key).is_some())
    }

    async fn count_for_object(
        &self,
        object_id: &str,
        relation_type: RelationType,
    ) -> Result<u64, StoreError> {
        Ok(self
            .rows
            .lock()
            .keys()
            .filter(|k| k.object_id == object_id && k.relation_type == relation_type)
            .count() as u64)
    }

    async fn list(&self, query: &ListQuery) -> Result<Vec<RelationRow>, StoreError> {
        Ok(self
            .matching(query)
            .into_iter()
            .skip(usize::try_from(query.offset).unwrap_or(usize::MAX))
            .take(query.limit as usize)
            .collect())
    }

    async fn count_matching(&self, query: &ListQuery) -> Result<u64, StoreError> {
        Ok(self.matching(query).len() as u64)
    }

    async fn toggle_atomic(&self, key: &RelationKey) -> Result<Option<bool>, StoreError> {
        let mut rows = self.rows.lock();
        if rows.remove(key).is_some() {
            Ok(Some(false))
        } else {
            rows.insert(key.clone(), Utc::now());
            Ok(Some(true))
        }
    }
}
