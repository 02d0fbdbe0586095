//! Single-flight relationship view.
//!
//! One instance backs one on-screen like/follow control. State is only ever
//! replaced wholesale from a server response; there is no optimistic update,
//! so a failed request leaves the previous state exactly as it was.

use affinity_common::{RelationType, RelationView, ToggleState};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;

use crate::api::RelationshipApi;
use crate::error::ClientError;
use crate::notify::Notifier;

/// What the UI renders.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ViewSnapshot {
    pub is_present: bool,
    pub count: u64,
    pub busy: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    InFlight,
}

struct ViewState {
    is_present: bool,
    count: u64,
    phase: Phase,
}

/// Result of [`RelationshipView::toggle`] or [`RelationshipView::refresh`].
#[derive(Debug)]
pub enum ViewOutcome {
    /// Server answered; state replaced.
    Applied(ToggleState),
    /// Another request was already in flight. Nothing was sent.
    Skipped,
    /// Request failed; state unchanged and the notifier was called.
    Failed(ClientError),
}

/// Puts the view back to `Idle` on every exit path, including the calling
/// future being dropped mid-request.
struct InFlightGuard<'a> {
    state: &'a Mutex<ViewState>,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.state.lock().phase = Phase::Idle;
    }
}

pub struct RelationshipView {
    api: Arc<dyn RelationshipApi>,
    notifier: Arc<dyn Notifier>,
    relation_type: RelationType,
    object_id: String,
    state: Mutex<ViewState>,
}

impl RelationshipView {
    pub fn new(
        api: Arc<dyn RelationshipApi>,
        notifier: Arc<dyn Notifier>,
        relation_type: RelationType,
        object_id: impl Into<String>,
    ) -> Self {
        Self::with_initial(api, notifier, relation_type, object_id, false, 0)
    }

    /// Seed from state the page was rendered with.
    pub fn with_initial(
        api: Arc<dyn RelationshipApi>,
        notifier: Arc<dyn Notifier>,
        relation_type: RelationType,
        object_id: impl Into<String>,
        is_present: bool,
        count: u64,
    ) -> Self {
        Self {
            api,
            notifier,
            relation_type,
            object_id: object_id.into(),
            state: Mutex::new(ViewState {
                is_present,
                count,
                phase: Phase::Idle,
            }),
        }
    }

    pub fn relation_type(&self) -> RelationType {
        self.relation_type
    }

    pub fn object_id(&self) -> &str {
        &self.object_id
    }

    pub fn snapshot(&self) -> ViewSnapshot {
        let s = self.state.lock();
        ViewSnapshot {
            is_present: s.is_present,
            count: s.count,
            busy: s.phase == Phase::InFlight,
        }
    }

    fn begin(&self) -> Option<InFlightGuard<'_>> {
        let mut s = self.state.lock();
        if s.phase == Phase::InFlight {
            return None;
        }
        s.phase = Phase::InFlight;
        Some(InFlightGuard { state: &self.state })
    }

    fn apply(&self, present: bool, count: u64) {
        let mut s = self.state.lock();
        s.is_present = present;
        s.count = count;
    }

    fn fail(&self, action: &str, err: ClientError) -> ViewOutcome {
        self.notifier.notify_error(&format!(
            "Could not {} {} {}: {}",
            action,
            self.relation_type.as_str(),
            self.object_id,
            err
        ));
        ViewOutcome::Failed(err)
    }

    /// Flip the relation. No-op while a previous toggle or refresh is in flight.
    pub async fn toggle(&self) -> ViewOutcome {
        let Some(_guard) = self.begin() else {
            debug!(
                "[Affinity] toggle {} {} ignored, request in flight",
                self.relation_type.as_str(),
                self.object_id
            );
            return ViewOutcome::Skipped;
        };

        match self.api.toggle(self.relation_type, &self.object_id).await {
            Ok(next) => {
                self.apply(next.present, next.count);
                ViewOutcome::Applied(next)
            }
            Err(e) => self.fail("toggle", e),
        }
    }

    /// Reload from the server. Shares the in-flight gate with `toggle` so a
    /// slow read can never overwrite a newer toggle result.
    pub async fn refresh(&self) -> ViewOutcome {
        let Some(_guard) = self.begin() else {
            return ViewOutcome::Skipped;
        };

        match self.api.fetch_state(self.relation_type, &self.object_id).await {
            Ok(RelationView { present, count }) => {
                let present = present.unwrap_or(false);
                self.apply(present, count);
                ViewOutcome::Applied(ToggleState { present, count })
            }
            Err(e) => self.fail("load", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ListTarget;
    use crate::notify::QueuedNotifier;
    use affinity_common::{ListParams, Page, RelationshipItem};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    /// Scripted server: flips its own state on every toggle, optionally
    /// holding the response until released.
    struct FakeApi {
        calls: AtomicUsize,
        present: Mutex<bool>,
        count: Mutex<u64>,
        fail: bool,
        gated: bool,
        entered: Notify,
        release: Notify,
    }

    impl FakeApi {
        fn new(present: bool, count: u64) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                present: Mutex::new(present),
                count: Mutex::new(count),
                fail: false,
                gated: false,
                entered: Notify::new(),
                release: Notify::new(),
            }
        }

        fn gated(mut self) -> Self {
            self.gated = true;
            self
        }

        fn failing(mut self) -> Self {
            self.fail = true;
            self
        }
    }

    #[async_trait]
    impl RelationshipApi for FakeApi {
        async fn toggle(&self, _: RelationType, _: &str) -> crate::Result<ToggleState> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.entered.notify_one();
            if self.gated {
                self.release.notified().await;
            }
            if self.fail {
                return Err(ClientError::Status {
                    status: 500,
                    code: "STORE_UNAVAILABLE".into(),
                    message: "database is locked".into(),
                });
            }
            let mut present = self.present.lock();
            let mut count = self.count.lock();
            *present = !*present;
            if *present {
                *count += 1;
            } else {
                *count -= 1;
            }
            Ok(ToggleState {
                present: *present,
                count: *count,
            })
        }

        async fn fetch_state(&self, _: RelationType, _: &str) -> crate::Result<RelationView> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(ClientError::Decode("garbage".into()));
            }
            Ok(RelationView {
                present: Some(*self.present.lock()),
                count: *self.count.lock(),
            })
        }

        async fn list(&self, _: &ListTarget, _: &ListParams) -> crate::Result<Page<RelationshipItem>> {
            unreachable!("views never list")
        }
    }

    fn view(api: &Arc<FakeApi>, notifier: &Arc<QueuedNotifier>) -> RelationshipView {
        RelationshipView::with_initial(
            api.clone(),
            notifier.clone(),
            RelationType::Like,
            "post-1",
            false,
            4,
        )
    }

    #[tokio::test]
    async fn test_toggle_replaces_state_from_response() {
        let api = Arc::new(FakeApi::new(false, 4));
        let notifier = Arc::new(QueuedNotifier::new());
        let view = view(&api, &notifier);

        assert!(matches!(view.toggle().await, ViewOutcome::Applied(_)));
        assert_eq!(
            view.snapshot(),
            ViewSnapshot {
                is_present: true,
                count: 5,
                busy: false
            }
        );

        view.toggle().await;
        assert_eq!(view.snapshot().count, 4);
        assert!(!view.snapshot().is_present);
        assert!(notifier.is_empty());
    }

    #[tokio::test]
    async fn test_second_toggle_while_in_flight_is_ignored() {
        let api = Arc::new(FakeApi::new(false, 0).gated());
        let notifier = Arc::new(QueuedNotifier::new());
        let view = view(&api, &notifier);

        let (first, second) = tokio::join!(view.toggle(), async {
            api.entered.notified().await;
            assert!(view.snapshot().busy);
            let outcome = view.toggle().await;
            api.release.notify_one();
            outcome
        });

        assert!(matches!(first, ViewOutcome::Applied(ToggleState { present: true, .. })));
        assert!(matches!(second, ViewOutcome::Skipped));
        assert_eq!(api.calls.load(Ordering::SeqCst), 1);
        assert!(!view.snapshot().busy);
        assert!(view.snapshot().is_present);
    }

    #[tokio::test]
    async fn test_failure_leaves_state_and_notifies() {
        let api = Arc::new(FakeApi::new(false, 4).failing());
        let notifier = Arc::new(QueuedNotifier::new());
        let view = view(&api, &notifier);
        let before = view.snapshot();

        match view.toggle().await {
            ViewOutcome::Failed(e) => assert!(!e.is_unauthenticated()),
            other => panic!("expected failure, got {:?}", other),
        }
        assert_eq!(view.snapshot(), before);
        assert!(!view.snapshot().busy);

        let messages = notifier.drain();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains("post-1"));

        assert!(matches!(view.refresh().await, ViewOutcome::Failed(_)));
        assert_eq!(view.snapshot(), before);
        assert_eq!(notifier.len(), 1);
    }

    #[tokio::test]
    async fn test_dropped_toggle_releases_busy() {
        let api = Arc::new(FakeApi::new(false, 0).gated());
        let notifier = Arc::new(QueuedNotifier::new());
        let view = view(&api, &notifier);

        tokio::select! {
            biased;
            _ = view.toggle() => panic!("toggle should still be waiting"),
            _ = api.entered.notified() => {}
        }

        assert!(!view.snapshot().busy);
        assert_eq!(view.snapshot().count, 4);
    }

    #[tokio::test]
    async fn test_refresh_loads_server_state() {
        let api = Arc::new(FakeApi::new(true, 9));
        let notifier = Arc::new(QueuedNotifier::new());
        let view = view(&api, &notifier);

        assert!(matches!(view.refresh().await, ViewOutcome::Applied(_)));
        assert_eq!(
            view.snapshot(),
            ViewSnapshot {
                is_present: true,
                count: 9,
                busy: false
            }
        );
    }
}
