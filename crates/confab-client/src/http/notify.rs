//! User-visible error notifications with duplicate grouping.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Sink for user-visible error notifications.
///
/// The transport emits exactly one notification per classified failure;
/// hosts plug in their own sink (toast, status line) here.
pub trait Notifier: Send + Sync {
    fn error(&self, message: &str);
}

/// Default sink: routes notifications into the log stream.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn error(&self, message: &str) {
        tracing::error!(target: "confab::http", "{message}");
    }
}

/// Window inside which identical messages are collapsed into one.
const GROUP_WINDOW: Duration = Duration::from_secs(3);

/// Wraps a [`Notifier`] and collapses identical messages emitted in quick
/// succession, so a burst of failing calls surfaces a single notification.
pub struct GroupedNotifier {
    inner: Arc<dyn Notifier>,
    window: Duration,
    recent: Mutex<HashMap<String, Instant>>,
}

impl GroupedNotifier {
    pub fn new(inner: Arc<dyn Notifier>) -> Self {
        Self {
            inner,
            window: GROUP_WINDOW,
            recent: Mutex::new(HashMap::new()),
        }
    }

    #[cfg(test)]
    fn with_window(inner: Arc<dyn Notifier>, window: Duration) -> Self {
        Self {
            inner,
            window,
            recent: Mutex::new(HashMap::new()),
        }
    }

    /// Forwards `message` unless an identical one was emitted within the
    /// grouping window.
    pub fn error(&self, message: &str) {
        let now = Instant::now();
        let mut recent = self.recent.lock().unwrap_or_else(PoisonError::into_inner);
        recent.retain(|_, emitted| now.duration_since(*emitted) < self.window);
        if recent.contains_key(message) {
            return;
        }
        recent.insert(message.to_string(), now);
        drop(recent);
        self.inner.error(message);
    }
}
