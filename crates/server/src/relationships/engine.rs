//! Toggle Engine
//!
//! Stateless probe-act-reconcile over a [`RelationshipStore`]:
//!
//! 1. probe for the row;
//! 2. absent: insert it;
//! 3. the insert hits the uniqueness constraint: someone (necessarily the
//!    same subject, since the key includes it) inserted between 1 and 2, so
//!    the relation is present and this request deletes it instead;
//! 4. present: delete it;
//! 5. re-read the count from the store.
//!
//! Two toggles racing on one triple always leave 0 or 1 rows, but which one
//! is not specified, and either caller may see the other's effect undone.
//! When the store has a native conditional toggle the engine uses it and the
//! race window disappears.

use affinity_common::{
    validate_id, ListParams, Page, Pagination, RelationType, RelationView, RelationshipItem,
    ToggleState,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{
    InsertOutcome, ListAnchor, ListQuery, RelationError, RelationKey, RelationshipStore,
    StoreError,
};
use crate::cache::ExistenceCache;
use crate::content::{ContentStore, TargetRef};

/// Tagged result of one mutation attempt.
#[derive(Debug)]
pub enum MutationOutcome {
    /// Row inserted: relation is now on.
    Created,
    /// Probe found the row and it was deleted.
    Removed,
    /// Insert lost to a concurrent insert of the same triple; the row was
    /// deleted instead. Never surfaced as an error.
    AlreadyPresentSoRemoved,
    Failed(StoreError),
}

#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Use [`RelationshipStore::toggle_atomic`] when the store has one.
    pub prefer_native_toggle: bool,
    /// Whether a subject may like content it owns.
    pub allow_self_like: bool,
    pub default_page_limit: u32,
    pub max_page_limit: u32,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            prefer_native_toggle: true,
            allow_self_like: true,
            default_page_limit: 20,
            max_page_limit: 50,
        }
    }
}

pub struct ToggleEngine {
    store: Arc<dyn RelationshipStore>,
    content: Arc<dyn ContentStore>,
    cache: Arc<ExistenceCache<TargetRef>>,
    options: EngineOptions,
}

fn check_id(label: &str, id: &str) -> Result<(), RelationError> {
    validate_id(id).map_err(|e| RelationError::Validation(format!("{} id: {}", label, e)))
}

impl ToggleEngine {
    pub fn new(
        store: Arc<dyn RelationshipStore>,
        content: Arc<dyn ContentStore>,
        cache: Arc<ExistenceCache<TargetRef>>,
        options: EngineOptions,
    ) -> Self {
        Self {
            store,
            content,
            cache,
            options,
        }
    }

    pub fn cache(&self) -> &Arc<ExistenceCache<TargetRef>> {
        &self.cache
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Validate a target through the existence cache.
    async fn ensure_target(&self, target: &TargetRef) -> Result<(), RelationError> {
        let content = &self.content;
        let exists = self
            .cache
            .probe(target, || async move { content.exists(target).await })
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        if exists {
            Ok(())
        } else {
            Err(RelationError::NotFound(target.id.clone()))
        }
    }

    async fn check_self_action(
        &self,
        subject_id: &str,
        target: &TargetRef,
        relation_type: RelationType,
    ) -> Result<(), RelationError> {
        if !relation_type.allows_self() && subject_id == target.id {
            return Err(RelationError::Validation(format!(
                "cannot {} yourself",
                relation_type
            )));
        }
        if relation_type == RelationType::Like && !self.options.allow_self_like {
            let owner = self
                .content
                .owner_of(target)
                .await
                .map_err(|e| StoreError::Unavailable(e.to_string()))?;
            if owner.as_deref() == Some(subject_id) {
                return Err(RelationError::Validation(
                    "cannot like your own content".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Flip `(subject, object, type)` and return the authoritative state.
    pub async fn toggle(
        &self,
        subject_id: &str,
        object_id: &str,
        relation_type: RelationType,
    ) -> Result<ToggleState, RelationError> {
        check_id("subject", subject_id)?;
        check_id("object", object_id)?;

        let target = TargetRef::new(relation_type.target_kind(), object_id);
        self.check_self_action(subject_id, &target, relation_type)
            .await?;
        self.ensure_target(&target).await?;

        let key = RelationKey::new(subject_id, object_id, relation_type);
        let present = match self.mutate(&key).await {
            MutationOutcome::Created => {
                // The insert proves the target was alive a moment ago.
                self.cache.mark_present(target);
                true
            }
            MutationOutcome::Removed => false,
            MutationOutcome::AlreadyPresentSoRemoved => {
                info!(
                    "[Relationships] Concurrent insert absorbed for {} -{}-> {}, removed",
                    subject_id, relation_type, object_id
                );
                false
            }
            MutationOutcome::Failed(e) => {
                warn!(
                    "[Relationships] Toggle failed for {} -{}-> {}: {}",
                    subject_id, relation_type, object_id, e
                );
                return Err(e.into());
            }
        };

        let count = self
            .store
            .count_for_object(object_id, relation_type)
            .await?;

        debug!(
            "[Relationships] {} -{}-> {}: present={} count={}",
            subject_id, relation_type, object_id, present, count
        );
        Ok(ToggleState { present, count })
    }

    /// One mutation attempt for `key`.
    pub async fn mutate(&self, key: &RelationKey) -> MutationOutcome {
        if self.options.prefer_native_toggle {
            match self.store.toggle_atomic(key).await {
                Ok(Some(true)) => return MutationOutcome::Created,
                Ok(Some(false)) => return MutationOutcome::Removed,
                Ok(None) => {}
                Err(e) => return MutationOutcome::Failed(e),
            }
        }
        self.probe_act_reconcile(key).await
    }

    async fn probe_act_reconcile(&self, key: &RelationKey) -> MutationOutcome {
        let existing = match self.store.exists(key).await {
            Ok(existing) => existing,
            Err(e) => return MutationOutcome::Failed(e),
        };

        if existing {
            return match self.store.delete(key).await {
                Ok(_) => MutationOutcome::Removed,
                Err(e) => MutationOutcome::Failed(e),
            };
        }

        match self.store.insert(key).await {
            Ok(InsertOutcome::Inserted) => MutationOutcome::Created,
            Ok(InsertOutcome::Conflict) => match self.store.delete(key).await {
                Ok(_) => MutationOutcome::AlreadyPresentSoRemoved,
                Err(e) => MutationOutcome::Failed(e),
            },
            Err(e) => MutationOutcome::Failed(e),
        }
    }

    /// Current state for an optional caller. `present` is `None` without one.
    pub async fn read(
        &self,
        subject_id: Option<&str>,
        object_id: &str,
        relation_type: RelationType,
    ) -> Result<RelationView, RelationError> {
        check_id("object", object_id)?;
        let target = TargetRef::new(relation_type.target_kind(), object_id);
        self.ensure_target(&target).await?;

        let present = match subject_id {
            Some(subject_id) => {
                check_id("subject", subject_id)?;
                let key = RelationKey::new(subject_id, object_id, relation_type);
                Some(self.store.exists(&key).await?)
            }
            None => None,
        };
        let count = self
            .store
            .count_for_object(object_id, relation_type)
            .await?;

        Ok(RelationView { present, count })
    }

    /// One page of rows pinned to `anchor`. `total` is only counted on page 1.
    pub async fn list(
        &self,
        anchor: ListAnchor,
        relation_type: RelationType,
        params: &ListParams,
    ) -> Result<Page<RelationshipItem>, RelationError> {
        let target = match &anchor {
            ListAnchor::Object(id) => {
                check_id("object", id)?;
                TargetRef::new(relation_type.target_kind(), id.clone())
            }
            ListAnchor::Subject(id) => {
                check_id("subject", id)?;
                TargetRef::user(id.clone())
            }
        };
        self.ensure_target(&target).await?;

        let page = params.effective_page();
        let limit =
            params.effective_limit(self.options.default_page_limit, self.options.max_page_limit);
        let mut pagination = Pagination {
            page,
            limit,
            total: None,
            has_more: false,
        };

        // Over-fetch by one row to learn whether another page exists.
        let query = ListQuery {
            anchor,
            relation_type,
            since: params.since,
            offset: pagination.offset(),
            limit: limit.saturating_add(1),
        };
        let mut rows = self.store.list(&query).await?;
        pagination.has_more = rows.len() > limit as usize;
        rows.truncate(limit as usize);

        if page == 1 {
            pagination.total = Some(self.store.count_matching(&query).await?);
        }

        let items = rows
            .into_iter()
            .map(|row| row.into_item(&query.anchor))
            .collect();
        Ok(Page { items, pagination })
    }
}
