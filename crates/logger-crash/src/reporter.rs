//! Crash reporter contract and an in-memory reporter

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

/// Receives breadcrumbs destined for a crash report.
///
/// Called from the logging worker; implementations should hand the text off
/// quickly.
pub trait CrashReporter: Send + Sync + 'static {
    /// Record one breadcrumb
    fn record_breadcrumb(&self, breadcrumb: &str);
}

impl<R: CrashReporter + ?Sized> CrashReporter for Arc<R> {
    fn record_breadcrumb(&self, breadcrumb: &str) {
        (**self).record_breadcrumb(breadcrumb);
    }
}

/// Keeps the most recent breadcrumbs in memory, oldest evicted first
#[derive(Debug)]
pub struct BreadcrumbRing {
    capacity: usize,
    entries: Mutex<VecDeque<String>>,
}

impl BreadcrumbRing {
    /// Ring holding at most `capacity` breadcrumbs
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    /// Maximum number of breadcrumbs kept
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Current breadcrumbs, oldest first
    #[must_use]
    pub fn snapshot(&self) -> Vec<String> {
        self.entries.lock().iter().cloned().collect()
    }

    /// Number of breadcrumbs held
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether the ring is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Drop every breadcrumb
    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

impl CrashReporter for BreadcrumbRing {
    fn record_breadcrumb(&self, breadcrumb: &str) {
        if self.capacity == 0 {
            return;
        }

        let mut entries = self.entries.lock();
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(breadcrumb.to_string());
    }
}
