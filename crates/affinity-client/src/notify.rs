//! Transient error display.

use parking_lot::Mutex;
use tracing::warn;

/// Surface for short-lived, non-blocking error messages (toasts).
pub trait Notifier: Send + Sync {
    fn notify_error(&self, message: &str);
}

/// Writes notifications to the log. Used when no UI is attached.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify_error(&self, message: &str) {
        warn!("[Affinity] {}", message);
    }
}

/// Buffers notifications until a UI drains them.
#[derive(Debug, Default)]
pub struct QueuedNotifier {
    pending: Mutex<Vec<String>>,
}

impl QueuedNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn drain(&self) -> Vec<String> {
        std::mem::take(&mut *self.pending.lock())
    }

    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }
}

impl Notifier for QueuedNotifier {
    fn notify_error(&self, message: &str) {
        self.pending.lock().push(message.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queued_notifier_drains() {
        let n = QueuedNotifier::new();
        n.notify_error("one");
        n.notify_error("two");
        assert_eq!(n.len(), 2);
        assert_eq!(n.drain(), vec!["one".to_string(), "two".to_string()]);
        assert!(n.is_empty());
    }
}
