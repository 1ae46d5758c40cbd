//! Service configuration

use serde::{Deserialize, Serialize};

/// Default name of the dispatch worker thread
const DEFAULT_WORKER_THREAD_NAME: &str = "relaylog-dispatch";

/// Configuration for a [`LoggingService`](crate::LoggingService).
///
/// Deserializes with defaults for missing keys, so it can be embedded in a
/// host application's own configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingServiceConfig {
    /// Longest message, in characters, delivered without consulting the
    /// overflow policy. `0` disables the limit.
    pub maximum_safe_message_length: usize,

    /// Name given to the dispatch worker thread
    pub worker_thread_name: String,

    /// Maximum number of queued log events. Events beyond it are dropped and
    /// counted. `None` leaves the queue unbounded.
    pub max_pending_events: Option<usize>,
}

impl Default for LoggingServiceConfig {
    fn default() -> Self {
        Self {
            maximum_safe_message_length: 0,
            worker_thread_name: DEFAULT_WORKER_THREAD_NAME.to_string(),
            max_pending_events: None,
        }
    }
}

impl LoggingServiceConfig {
    /// Set the maximum safe message length
    #[must_use]
    pub const fn with_maximum_safe_message_length(mut self, length: usize) -> Self {
        self.maximum_safe_message_length = length;
        self
    }

    /// Set the worker thread name
    #[must_use]
    pub fn with_worker_thread_name(mut self, name: impl Into<String>) -> Self {
        self.worker_thread_name = name.into();
        self
    }

    /// Cap the number of queued log events
    #[must_use]
    pub const fn with_max_pending_events(mut self, limit: usize) -> Self {
        self.max_pending_events = Some(limit);
        self
    }
}
