//! Sink forwarding events to a crash reporter

use crate::CrashReporter;
use relaylog::{ContextObject, FilterStatus, Level, LogEvent, Sink};
use std::sync::atomic::{AtomicBool, Ordering};

/// Messages longer than this many characters count as large by default
pub const DEFAULT_LARGE_MESSAGE_THRESHOLD: usize = 16 * 1024;

/// Records each event as a `"[TAG][channel] message"` breadcrumb.
///
/// With large-message discarding on, events whose message exceeds the
/// threshold are dropped after checking only
/// [`LogEvent::message_length`]; the message itself is never read.
pub struct CrashDiagnosticsSink<R> {
    reporter: R,
    min_level: Level,
    large_message_threshold: usize,
    discard_large_messages: AtomicBool,
}

impl<R: CrashReporter> CrashDiagnosticsSink<R> {
    /// Sink reporting to `reporter`, from [`Level::Information`] up, keeping
    /// large messages
    pub const fn new(reporter: R) -> Self {
        Self {
            reporter,
            min_level: Level::Information,
            large_message_threshold: DEFAULT_LARGE_MESSAGE_THRESHOLD,
            discard_large_messages: AtomicBool::new(false),
        }
    }

    /// Only report events at `level` or above
    #[must_use]
    pub fn with_min_level(mut self, level: Level) -> Self {
        self.min_level = level;
        self
    }

    /// Length, in characters, above which a message is large
    #[must_use]
    pub fn with_large_message_threshold(mut self, threshold: usize) -> Self {
        self.large_message_threshold = threshold;
        self
    }

    /// Turn large-message discarding on or off; takes effect for the next
    /// event delivered
    pub fn set_discard_large_messages(&self, discard: bool) {
        self.discard_large_messages.store(discard, Ordering::Relaxed);
    }

    /// Whether large messages are currently dropped
    #[must_use]
    pub fn discards_large_messages(&self) -> bool {
        self.discard_large_messages.load(Ordering::Relaxed)
    }

    /// The wrapped reporter
    pub const fn reporter(&self) -> &R {
        &self.reporter
    }
}

impl<R: CrashReporter> Sink for CrashDiagnosticsSink<R> {
    fn receive(&self, event: &LogEvent) {
        if self.discards_large_messages() {
            let length = event.message_length();
            if length > self.large_message_threshold {
                tracing::debug!(
                    length,
                    threshold = self.large_message_threshold,
                    "large message kept out of crash breadcrumbs"
                );
                return;
            }
        }

        let breadcrumb = format!(
            "[{}][{}] {}",
            event.level().tag(),
            event.channel(),
            event.message()
        );
        self.reporter.record_breadcrumb(&breadcrumb);
    }

    fn filter(

        &self,

        level: Level,

        _channel: &str,

        _context: Option<&ContextObject>,

    ) -> FilterStatus {
        if level >= self.min_level {
            FilterStatus::Ok
        } else {
            FilterStatus::CannotLogLevel
        }
    }
}
