//! Test support utilities
//!
//! This module provides a sink that captures events in memory for tests.
//! It's only available when the `test-support` feature is enabled.

use crate::{ComposeOptions, ContextObject, FieldSet, Level, LogEvent, Sink};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::thread::ThreadId;
use std::time::Duration;

/// What a [`CaptureSink`] saw of one event.
///
/// Value fields are `None` unless the sink was configured to read them.
#[derive(Debug, Clone, Default)]
pub struct CapturedEvent {
    /// Severity
    pub level: Option<Level>,
    /// Channel
    pub channel: Option<String>,
    /// Source file
    pub file: Option<String>,
    /// Function name
    pub function: Option<String>,
    /// Source line
    pub line: Option<u32>,
    /// Wall-clock time of the call
    pub timestamp: Option<DateTime<Utc>>,
    /// Age of the service at the call
    pub log_lifespan: Option<Duration>,
    /// Calling thread
    pub thread_id: Option<ThreadId>,
    /// Calling thread's name
    pub thread_name: Option<String>,
    /// Context object, when read and present
    pub context: Option<ContextObject>,
    /// Message text
    pub message: Option<String>,
    /// Message length in characters
    pub message_length: Option<usize>,
    /// `file:line function`
    pub file_function_line: Option<String>,
    /// Line composed with [`ComposeOptions::DEFAULT`]
    pub formatted_message: Option<String>,

    /// Fields accessed before this sink ran
    pub accessed_on_entry: FieldSet,
    /// Memoized fields before this sink ran
    pub cached_on_entry: FieldSet,
    /// Fields accessed once this sink was done
    pub accessed_on_exit: FieldSet,
    /// Memoized fields once this sink was done
    pub cached_on_exit: FieldSet,
    /// Fields this sink itself read, whatever earlier sinks did
    pub accessed_by_sink: FieldSet,
}

/// A sink that captures events in memory for testing
pub struct CaptureSink {
    reads: FieldSet,
    events: Mutex<Vec<CapturedEvent>>,
}

impl CaptureSink {
    /// Capture sink that reads every field
    #[must_use]
    pub fn new() -> Self {
        Self::reading(FieldSet::all())
    }

    /// Capture sink that reads only `fields`, leaving the rest untouched
    #[must_use]
    pub const fn reading(fields: FieldSet) -> Self {
        Self {
            reads: fields,
            events: Mutex::new(Vec::new()),
        }
    }

    /// Everything captured so far
    #[must_use]
    pub fn events(&self) -> Vec<CapturedEvent> {
        self.events.lock().clone()
    }

    /// Captured messages, in delivery order
    #[must_use]
    pub fn messages(&self) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| event.message.clone())
            .collect()
    }

    /// Number of captured events
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    /// Whether nothing was captured
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    /// Clear captured events
    pub fn clear(&self) {
        self.events.lock().clear();
    }

    fn read<T>(&self, field: FieldSet, value: impl FnOnce() -> T) -> Option<T> {
        self.reads.contains(field).then(value)
    }
}

impl Default for CaptureSink {
    fn default() -> Self {
        Self::new()
    }
}

impl Sink for CaptureSink {
    fn receive(&self, event: &LogEvent) {
        let accessed_on_entry = event.accessed_fields();
        let cached_on_entry = event.cached_fields();
        let counts_on_entry: Vec<(FieldSet, u32)> = FieldSet::all()
            .iter()
            .map(|field| (field, event.access_count(field)))
            .collect();

        let mut captured = CapturedEvent {
            level: self.read(FieldSet::LEVEL, || event.level()),
            channel: self.read(FieldSet::CHANNEL, || event.channel().to_string()),
            file: self.read(FieldSet::FILE, || event.file().to_string()),
            function: self.read(FieldSet::FUNCTION, || event.function().to_string()),
            line: self.read(FieldSet::LINE, || event.line()),
            timestamp: self.read(FieldSet::TIMESTAMP, || event.timestamp()),
            log_lifespan: self.read(FieldSet::LOG_LIFESPAN, || event.log_lifespan()),
            thread_id: self.read(FieldSet::THREAD_ID, || event.thread_id()),
            thread_name: self.read(FieldSet::THREAD_NAME, || event.thread_name().to_string()),
            context: self
                .read(FieldSet::CONTEXT_OBJECT, || event.context_object().cloned())
                .flatten(),
            message: self.read(FieldSet::MESSAGE, || event.message().to_string()),
            message_length: self.read(FieldSet::MESSAGE_LENGTH, || event.message_length()),
            file_function_line: self.read(FieldSet::FILE_FUNCTION_LINE, || {
                event.compose_file_function_line().to_string()
            }),
            formatted_message: self.read(FieldSet::FORMATTED_MESSAGE, || {
                event.compose_formatted_message(ComposeOptions::DEFAULT)
            }),
            accessed_on_entry,
            cached_on_entry,
            ..CapturedEvent::default()
        };

        captured.accessed_on_exit = event.accessed_fields();
        captured.cached_on_exit = event.cached_fields();
        captured.accessed_by_sink = counts_on_entry
            .into_iter()
            .filter(|&(field, count)| event.access_count(field) > count)
            .map(|(field, _)| field)
            .collect();
        self.events.lock().push(captured);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CallSite;

    fn event(message: &str) -> LogEvent {
        LogEvent::capture(
            Level::Notice,
            "Capture",
            CallSite::new("src/app.rs", "run", 7),
            None,
            message,
            Duration::from_millis(5),
        )
    }

    #[test]
    fn test_reads_everything_by_default() {
        let sink = CaptureSink::new();
        sink.receive(&event("hello"));

        let captured = &sink.events()[0];
        assert_eq!(captured.level, Some(Level::Notice));
        assert_eq!(captured.channel.as_deref(), Some("Capture"));
        assert_eq!(captured.file_function_line.as_deref(), Some("src/app.rs:7 run"));
        assert_eq!(captured.message_length, Some(5));
        assert!(captured.context.is_none());
        assert_eq!(captured.accessed_on_exit, FieldSet::all());
    }

    #[test]
    fn test_reads_only_selected_fields() {
        let sink = CaptureSink::reading(FieldSet::LEVEL | FieldSet::MESSAGE_LENGTH);
        let event = event("hello");
        sink.receive(&event);

        let captured = &sink.events()[0];
        assert!(captured.message.is_none());
        assert_eq!(captured.message_length, Some(5));
        assert_eq!(captured.accessed_on_entry, FieldSet::empty());
        assert_eq!(
            captured.accessed_on_exit,
            FieldSet::LEVEL | FieldSet::MESSAGE_LENGTH
        );
        assert!(!event.was_accessed(FieldSet::MESSAGE));
        assert!(sink.messages().is_empty());
    }

    #[test]
    fn test_own_reads_visible_after_earlier_reader() {
        let first = CaptureSink::new();
        let second = CaptureSink::reading(FieldSet::LEVEL | FieldSet::MESSAGE);
        let event = event("shared");
        first.receive(&event);
        second.receive(&event);

        let captured = &second.events()[0];
        assert_eq!(captured.accessed_on_entry, FieldSet::all());
        assert_eq!(captured.accessed_by_sink, FieldSet::LEVEL | FieldSet::MESSAGE);
    }

    #[test]
    fn test_clear() {
        let sink = CaptureSink::new();
        sink.receive(&event("a"));
        sink.receive(&event("b"));
        assert_eq!(sink.messages(), vec!["a", "b"]);

        sink.clear();
        assert!(sink.is_empty());
        assert_eq!(sink.len(), 0);
    }
}
