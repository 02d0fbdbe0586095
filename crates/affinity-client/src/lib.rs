//! Affinity client
//!
//! Client-side reconciliation for relationship toggles: a single-flight
//! [`RelationshipView`] per like/follow control and a [`PagedList`] for
//! liker/follower listings, both fed from the server's authoritative answers.

pub mod api;
pub mod config;
pub mod error;
pub mod notify;
pub mod pager;
pub mod view;

pub use api::{HttpRelationshipApi, ListTarget, RelationshipApi};
pub use config::ClientConfig;
pub use error::{ClientError, Result};
pub use notify::{Notifier, QueuedNotifier, TracingNotifier};
pub use pager::{merge_page, ApiPageSource, FetchOutcome, Identified, PageSource, PagedList};
pub use view::{RelationshipView, ViewOutcome, ViewSnapshot};

use affinity_common::{RelationType, RelationshipItem};
use std::sync::Arc;

/// Entry point wiring views and lists to one server.
#[derive(Clone)]
pub struct AffinityClient {
    api: Arc<dyn RelationshipApi>,
    notifier: Arc<dyn Notifier>,
    page_limit: u32,
}

impl AffinityClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let api = HttpRelationshipApi::new(&config)?;
        Ok(Self::with_api(
            Arc::new(api),
            Arc::new(TracingNotifier),
            config.page_limit,
        ))
    }

    pub fn with_api(
        api: Arc<dyn RelationshipApi>,
        notifier: Arc<dyn Notifier>,
        page_limit: u32,
    ) -> Self {
        Self {
            api,
            notifier,
            page_limit,
        }
    }

    pub fn view(&self, relation_type: RelationType, object_id: impl Into<String>) -> RelationshipView {
        RelationshipView::new(self.api.clone(), self.notifier.clone(), relation_type, object_id)
    }

    /// Who holds `relation_type` towards `object_id`.
    pub fn subjects_of(
        &self,
        relation_type: RelationType,
        object_id: impl Into<String>,
    ) -> PagedList<RelationshipItem> {
        self.paged(ListTarget::SubjectsOf {
            relation_type,
            object_id: object_id.into(),
        })
    }

    /// What `subject_id` holds `relation_type` towards.
    pub fn objects_of(
        &self,
        subject_id: impl Into<String>,
        relation_type: RelationType,
    ) -> PagedList<RelationshipItem> {
        self.paged(ListTarget::ObjectsOf {
            subject_id: subject_id.into(),
            relation_type,
        })
    }

    fn paged(&self, target: ListTarget) -> PagedList<RelationshipItem> {
        PagedList::new(
            Arc::new(ApiPageSource::new(self.api.clone(), target)),
            self.notifier.clone(),
            self.page_limit,
        )
    }
}
