//! Paginated list with supersession and de-duplication.
//!
//! Every fetch takes a fresh request token and cancels whatever fetch was in
//! flight before it. A response is applied only if its token is still the
//! current one, so an old page can never land on top of a newer refresh.
//! Pages are offset-based and rows inserted between fetches shift later
//! pages, so appends drop items whose id is already listed.

use affinity_common::{ListParams, Page, RelationshipItem};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::api::{ListTarget, RelationshipApi};
use crate::error::{ClientError, Result};
use crate::notify::Notifier;

/// Items that can be de-duplicated across pages.
pub trait Identified {
    fn id(&self) -> &str;
}

impl Identified for RelationshipItem {
    fn id(&self) -> &str {
        &self.id
    }
}

#[async_trait]
pub trait PageSource<T>: Send + Sync {
    async fn fetch(&self, params: ListParams) -> Result<Page<T>>;
}

/// Pages one relationship listing through a [`RelationshipApi`].
pub struct ApiPageSource {
    api: Arc<dyn RelationshipApi>,
    target: ListTarget,
}

impl ApiPageSource {
    pub fn new(api: Arc<dyn RelationshipApi>, target: ListTarget) -> Self {
        Self { api, target }
    }
}

#[async_trait]
impl PageSource<RelationshipItem> for ApiPageSource {
    async fn fetch(&self, params: ListParams) -> Result<Page<RelationshipItem>> {
        self.api.list(&self.target, &params).await
    }
}

/// Append `incoming` to `existing`, skipping ids already present (in either).
/// Returns how many items were added.
pub fn merge_page<T: Identified>(existing: &mut Vec<T>, incoming: Vec<T>) -> usize {
    let mut seen: HashSet<String> = existing.iter().map(|i| i.id().to_owned()).collect();
    let before = existing.len();
    for item in incoming {
        if seen.insert(item.id().to_owned()) {
            existing.push(item);
        }
    }
    existing.len() - before
}

#[derive(Debug)]
pub enum FetchOutcome {
    /// Page applied; `added` items survived de-duplication.
    Applied { added: usize },
    /// A newer fetch started first; this response was discarded.
    Superseded,
    /// `load_more` with no further pages.
    Exhausted,
    Failed(ClientError),
}

#[derive(Clone, Copy)]
enum Mode {
    Replace,
    Append,
}

struct ListState<T> {
    items: Vec<T>,
    next_page: u32,
    has_more: bool,
    total: Option<u64>,
    current: u64,
    in_flight: Option<CancellationToken>,
}

/// Clears `in_flight` when the fetch that owns `token` ends, including when
/// the calling future is dropped mid-request.
struct FetchGuard<'a, T> {
    state: &'a Mutex<ListState<T>>,
    token: u64,
}

impl<T> Drop for FetchGuard<'_, T> {
    fn drop(&mut self) {
        let mut s = self.state.lock();
        if s.current == self.token {
            s.in_flight = None;
        }
    }
}

pub struct PagedList<T> {
    source: Arc<dyn PageSource<T>>,
    notifier: Arc<dyn Notifier>,
    limit: u32,
    seq: AtomicU64,
    state: Mutex<ListState<T>>,
}

impl<T: Identified + Clone + Send + 'static> PagedList<T> {
    pub fn new(source: Arc<dyn PageSource<T>>, notifier: Arc<dyn Notifier>, limit: u32) -> Self {
        Self {
            source,
            notifier,
            limit: limit.max(1),
            seq: AtomicU64::new(0),
            state: Mutex::new(ListState {
                items: Vec::new(),
                next_page: 1,
                has_more: true,
                total: None,
                current: 0,
                in_flight: None,
            }),
        }
    }

    pub fn items(&self) -> Vec<T> {
        self.state.lock().items.clone()
    }

    pub fn len(&self) -> usize {
        self.state.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().items.is_empty()
    }

    pub fn has_more(&self) -> bool {
        self.state.lock().has_more
    }

    /// Total reported by the last first-page load.
    pub fn total(&self) -> Option<u64> {
        self.state.lock().total
    }

    pub fn is_loading(&self) -> bool {
        self.state.lock().in_flight.is_some()
    }

    /// Load page 1 and replace the list.
    pub async fn refresh(&self) -> FetchOutcome {
        self.fetch(Mode::Replace).await
    }

    /// Append the next page.
    pub async fn load_more(&self) -> FetchOutcome {
        if !self.has_more() {
            return FetchOutcome::Exhausted;
        }
        self.fetch(Mode::Append).await
    }

    async fn fetch(&self, mode: Mode) -> FetchOutcome {
        let (token, cancel, page) = {
            let mut s = self.state.lock();
            let token = self.seq.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some(prev) = s.in_flight.take() {
                prev.cancel();
            }
            let cancel = CancellationToken::new();
            s.in_flight = Some(cancel.clone());
            s.current = token;
            let page = match mode {
                Mode::Replace => 1,
                Mode::Append => s.next_page,
            };
            (token, cancel, page)
        };
        let _guard = FetchGuard {
            state: &self.state,
            token,
        };

        let params = ListParams::page(page, self.limit);
        let result = tokio::select! {
            _ = cancel.cancelled() => {
                debug!("[Affinity] list fetch #{} cancelled", token);
                return FetchOutcome::Superseded;
            }
            r = self.source.fetch(params) => r,
        };

        let mut s = self.state.lock();
        if s.current != token {
            debug!("[Affinity] discarding stale page {} (#{})", page, token);
            return FetchOutcome::Superseded;
        }

        match result {
            Ok(Page { items, pagination }) => {
                if let Mode::Replace = mode {
                    s.items.clear();
                    s.total = pagination.total;
                }
                let added = merge_page(&mut s.items, items);
                s.next_page = pagination.page.max(1) + 1;
                s.has_more = pagination.has_more;
                FetchOutcome::Applied { added }
            }
            Err(e) => {
                drop(s);
                self.notifier
                    .notify_error(&format!("Could not load page {}: {}", page, e));
                FetchOutcome::Failed(e)
            }
        }
    }
}
