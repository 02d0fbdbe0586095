use anyhow::Result;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

use super::{ContentStore, EntityKind, TargetRef};

#[derive(Debug, Clone)]
struct Entity {
    kind: EntityKind,
    owner_id: Option<String>,
}

/// In-process content projection.
#[derive(Default)]
pub struct MemoryContentStore {
    entities: RwLock<HashMap<String, Entity>>,
}

impl MemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, id: &str, kind: EntityKind, owner_id: Option<&str>) {
        self.entities.write().insert(
            id.to_string(),
            Entity {
                kind,
                owner_id: owner_id.map(str::to_string),
            },
        );
    }

    pub fn remove(&self, id: &str) -> bool {
        self.entities.write().remove(id).is_some()
    }

    fn lookup(&self, target: &TargetRef) -> Option<Entity> {
        self.entities
            .read()
            .get(&target.id)
            .filter(|e| e.kind.target_kind() == target.kind)
            .cloned()
    }
}

#[async_trait]
impl ContentStore for MemoryContentStore {
    async fn exists(&self, target: &TargetRef) -> Result<bool> {
        Ok(self.lookup(target).is_some())
    }

    async fn owner_of(&self, target: &TargetRef) -> Result<Option<String>> {
        Ok(self.lookup(target).and_then(|e| match e.kind {
            EntityKind::User => Some(target.id.clone()),
            _ => e.owner_id,
        }))
    }
}
