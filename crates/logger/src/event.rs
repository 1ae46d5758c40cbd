//! The log event and its lazily materialized fields

use crate::memo::Memo;
use crate::{ComposeOptions, Level};
use bitflags::bitflags;
use chrono::{DateTime, Local, Utc};
use std::any::Any;
use std::borrow::Cow;
use std::fmt::{self, Write as _};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::thread::{self, Thread, ThreadId};
use std::time::Duration;

/// Opaque caller-supplied value carried alongside an event.
///
/// The pipeline never inspects it; sinks may downcast it.
pub type ContextObject = Arc<dyn Any + Send + Sync>;

/// Channel substituted when a caller passes an empty one
pub const DEFAULT_CHANNEL: &str = "Default";

bitflags! {
    /// A set of [`LogEvent`] fields, used to report which accessors ran and
    /// which memoized values exist.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct FieldSet: u16 {
        /// [`LogEvent::level`]
        const LEVEL = 1 << 0;
        /// [`LogEvent::channel`]
        const CHANNEL = 1 << 1;
        /// [`LogEvent::file`]
        const FILE = 1 << 2;
        /// [`LogEvent::function`]
        const FUNCTION = 1 << 3;
        /// [`LogEvent::line`]
        const LINE = 1 << 4;
        /// [`LogEvent::timestamp`]
        const TIMESTAMP = 1 << 5;
        /// [`LogEvent::log_lifespan`]
        const LOG_LIFESPAN = 1 << 6;
        /// [`LogEvent::thread_id`]
        const THREAD_ID = 1 << 7;
        /// [`LogEvent::thread_name`]
        const THREAD_NAME = 1 << 8;
        /// [`LogEvent::context_object`]
        const CONTEXT_OBJECT = 1 << 9;
        /// [`LogEvent::message`]
        const MESSAGE = 1 << 10;
        /// [`LogEvent::message_length`]
        const MESSAGE_LENGTH = 1 << 11;
        /// [`LogEvent::compose_file_function_line`]
        const FILE_FUNCTION_LINE = 1 << 12;
        /// [`LogEvent::compose_formatted_message`]
        const FORMATTED_MESSAGE = 1 << 13;
    }
}

const FIELD_COUNT: usize = FieldSet::all().bits().count_ones() as usize;

/// Source location of a log call
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CallSite {
    file: Cow<'static, str>,
    function: Cow<'static, str>,
    line: u32,
}

impl CallSite {
    /// Location known at compile time, as produced by [`call_site!`](crate::call_site).
    #[must_use]
    pub const fn new(file: &'static str, function: &'static str, line: u32) -> Self {
        Self {
            file: Cow::Borrowed(file),
            function: Cow::Borrowed(function),
            line,
        }
    }

    /// Location built at runtime, e.g. from another logging framework's record
    pub fn owned(
        file: impl Into<Cow<'static, str>>,
        function: impl Into<Cow<'static, str>>,
        line: u32,
    ) -> Self {
        Self {
            file: file.into(),
            function: function.into(),
            line,
        }
    }

    /// Source file
    #[must_use]
    pub fn file(&self) -> &str {
        &self.file
    }

    /// Enclosing function
    #[must_use]
    pub fn function(&self) -> &str {
        &self.function
    }

    /// Line number
    #[must_use]
    pub const fn line(&self) -> u32 {
        self.line
    }
}

/// One log call.
///
/// Created on the calling thread, handed to the dispatch worker, and lent to
/// each sink in turn. Every accessor counts its calls, reported by
/// [`access_count`](Self::access_count) and
/// [`accessed_fields`](Self::accessed_fields); derived values are computed on
/// first use and then served from cache, which
/// [`cached_fields`](Self::cached_fields) reports.
pub struct LogEvent {
    level: Level,
    channel: Cow<'static, str>,
    call_site: CallSite,
    timestamp: DateTime<Utc>,
    log_lifespan: Duration,
    thread: Thread,
    context: Option<ContextObject>,
    message: String,

    thread_name: Memo<String>,
    message_length: Memo<usize>,
    file_function_line: Memo<String>,
    access_counts: [AtomicU32; FIELD_COUNT],
}

impl LogEvent {
    /// Captures an event on the current thread at the current time.
    ///
    /// `log_lifespan` is the age of the owning service at the moment of the
    /// call. An empty channel is replaced with [`DEFAULT_CHANNEL`].
    pub fn capture(
        level: Level,
        channel: impl Into<Cow<'static, str>>,
        call_site: CallSite,
        context: Option<ContextObject>,
        message: impl Into<String>,
        log_lifespan: Duration,
    ) -> Self {
        let mut channel = channel.into();
        if channel.is_empty() {
            channel = Cow::Borrowed(DEFAULT_CHANNEL);
        }

        Self {
            level,
            channel,
            call_site,
            timestamp: Utc::now(),
            log_lifespan,
            thread: thread::current(),
            context,
            message: message.into(),
            thread_name: Memo::new(),
            message_length: Memo::new(),
            file_function_line: Memo::new(),
            access_counts: [const { AtomicU32::new(0) }; FIELD_COUNT],
        }
    }

    fn counter(&self, field: FieldSet) -> &AtomicU32 {
        &self.access_counts[field.bits().trailing_zeros() as usize]
    }

    fn touch(&self, field: FieldSet) {
        self.counter(field).fetch_add(1, Ordering::Relaxed);
    }

    /// Severity
    pub fn level(&self) -> Level {
        self.touch(FieldSet::LEVEL);
        self.level
    }

    /// Channel
    pub fn channel(&self) -> &str {
        self.touch(FieldSet::CHANNEL);
        &self.channel
    }

    /// Source file of the call
    pub fn file(&self) -> &str {
        self.touch(FieldSet::FILE);
        self.call_site.file()
    }

    /// Function containing the call
    pub fn function(&self) -> &str {
        self.touch(FieldSet::FUNCTION);
        self.call_site.function()
    }

    /// Line of the call
    pub fn line(&self) -> u32 {
        self.touch(FieldSet::LINE);
        self.call_site.line()
    }

    /// Wall-clock time of the call
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.touch(FieldSet::TIMESTAMP);
        self.timestamp
    }

    /// Age of the owning service when the call was made
    pub fn log_lifespan(&self) -> Duration {
        self.touch(FieldSet::LOG_LIFESPAN);
        self.log_lifespan
    }

    /// Id of the calling thread
    pub fn thread_id(&self) -> ThreadId {
        self.touch(FieldSet::THREAD_ID);
        self.thread.id()
    }

    /// Name of the calling thread, or its id when it has none
    pub fn thread_name(&self) -> &str {
        self.touch(FieldSet::THREAD_NAME);
        self.thread_name.get_or_compute(|| match self.thread.name() {
            Some(name) => name.to_owned(),
            None => format!("{:?}", self.thread.id()),
        })
    }

    /// Caller-supplied context, if any
    pub fn context_object(&self) -> Option<&ContextObject> {
        self.touch(FieldSet::CONTEXT_OBJECT);
        self.context.as_ref()
    }

    /// Message text, already truncated if the size policy required it
    pub fn message(&self) -> &str {
        self.touch(FieldSet::MESSAGE);
        &self.message
    }

    /// Message length in characters, computed without reading [`message`](Self::message)
    pub fn message_length(&self) -> usize {
        self.touch(FieldSet::MESSAGE_LENGTH);
        *self
            .message_length
            .get_or_compute(|| self.message.chars().count())
    }

    /// `"<file>:<line> <function>"`, built once per event
    pub fn compose_file_function_line(&self) -> &str {
        self.touch(FieldSet::FILE_FUNCTION_LINE);
        self.file_function_line
            .get_or_compute(|| format!("{}:{} {}", self.file(), self.line(), self.function()))
    }

    /// Human-readable line for this event.
    ///
    /// Rebuilt on every call since `options` may differ between sinks, but
    /// the location part comes from
    /// [`compose_file_function_line`](Self::compose_file_function_line).
    pub fn compose_formatted_message(&self, options: ComposeOptions) -> String {
        self.touch(FieldSet::FORMATTED_MESSAGE);
        let options = options.effective();
        let mut line = String::with_capacity(self.message.len() + 96);

        if options.contains(ComposeOptions::LEVEL) {
            let _ = write!(line, "[{}]", self.level().tag());
        }

        if options.contains(ComposeOptions::TIMESTAMP_SINCE_START) {
            let _ = write!(line, "[{:.6}]", self.log_lifespan().as_secs_f64());
        } else if options.contains(ComposeOptions::TIMESTAMP_LOCAL) {
            let local = self.timestamp().with_timezone(&Local);
            let _ = write!(line, "[{}]", local.format("%Y-%m-%d %H:%M:%S%.3f"));
        } else if options.contains(ComposeOptions::TIMESTAMP_UTC) {
            let _ = write!(line, "[{}]", self.timestamp().format("%Y-%m-%dT%H:%M:%S%.3fZ"));
        }

        if options.contains(ComposeOptions::THREAD_ID) {
            let _ = write!(line, "[{:?}]", self.thread_id());
        }

        if options.contains(ComposeOptions::THREAD_NAME) {
            let _ = write!(line, "[{}]", self.thread_name());
        }

        if options.contains(ComposeOptions::CHANNEL) {
            let _ = write!(line, "[{}]", self.channel());
        }

        if options.contains(ComposeOptions::FILE_FUNCTION_LINE) {
            if !line.is_empty() {
                line.push(' ');
            }
            line.push('(');
            line.push_str(self.compose_file_function_line());
            line.push(')');
        }

        if !line.is_empty() {
            line.push_str(" : ");
        }
        line.push_str(self.message());
        line
    }

    /// Fields whose accessors have run since capture or the last
    /// [`reset_access_tracking`](Self::reset_access_tracking)
    pub fn accessed_fields(&self) -> FieldSet {
        FieldSet::all()
            .iter()
            .filter(|&field| self.access_count(field) > 0)
            .collect()
    }

    /// Calls made to the accessors in `field` since capture or the last
    /// [`reset_access_tracking`](Self::reset_access_tracking).
    ///
    /// Comparing counts taken before and after a sink runs tells what that
    /// sink read, even when an earlier sink read the same fields.
    pub fn access_count(&self, field: FieldSet) -> u32 {
        field
            .iter()
            .map(|field| self.counter(field).load(Ordering::Relaxed))
            .sum()
    }

    /// Shorthand for `accessed_fields().contains(field)`
    pub fn was_accessed(&self, field: FieldSet) -> bool {
        self.accessed_fields().contains(field)
    }

    /// Memoized fields that already hold a value
    pub fn cached_fields(&self) -> FieldSet {
        let mut cached = FieldSet::empty();
        cached.set(FieldSet::THREAD_NAME, self.thread_name.is_computed());
        cached.set(FieldSet::MESSAGE_LENGTH, self.message_length.is_computed());
        cached.set(
            FieldSet::FILE_FUNCTION_LINE,
            self.file_function_line.is_computed(),
        );
        cached
    }

    /// Clears the access record; memoized values are kept.
    pub fn reset_access_tracking(&self) {
        for counter in &self.access_counts {
            counter.store(0, Ordering::Relaxed);
        }
    }

    // Raw views for the size policy. They bypass access tracking so that
    // deciding on an oversized message never counts as reading it.

    pub(crate) fn raw_message(&self) -> &str {
        &self.message
    }

    pub(crate) fn raw_level(&self) -> Level {
        self.level
    }

    pub(crate) fn raw_channel(&self) -> &str {
        &self.channel
    }

    pub(crate) const fn raw_call_site(&self) -> &CallSite {
        &self.call_site
    }

    pub(crate) const fn raw_context(&self) -> Option<&ContextObject> {
        self.context.as_ref()
    }

    /// Shortens the message to its first `chars` characters.
    ///
    /// Only the worker calls this, before the first sink sees the event.
    pub(crate) fn truncate_message(&mut self, chars: usize) {
        debug_assert!(
            !self.message_length.is_computed(),
            "message truncated after a sink read it"
        );
        if let Some((byte_index, _)) = self.message.char_indices().nth(chars) {
            self.message.truncate(byte_index);
        }
    }
}

impl fmt::Debug for LogEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Raw fields only; formatting an event must not count as access.
        f.debug_struct("LogEvent")
            .field("level", &self.level)
            .field("channel", &self.channel)
            .field("call_site", &self.call_site)
            .field("timestamp", &self.timestamp)
            .field("thread", &self.thread.id())
            .field("has_context", &self.context.is_some())
            .field("message_bytes", &self.message.len())
            .field("accessed", &self.accessed_fields())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dummy_event(message: &str) -> LogEvent {
        LogEvent::capture(
            Level::Error,
            "SomeChannel",
            CallSite::new("src/net/socket.rs", "connect", 42),
            None,
            message,
            Duration::from_millis(100),
        )
    }

    #[test]
    fn test_nothing_accessed_after_capture() {
        let event = dummy_event("Some Message");
        assert!(event.accessed_fields().is_empty());
        assert!(event.cached_fields().is_empty());
    }

    #[test]
    fn test_file_function_line_is_memoized() {
        let event = dummy_event("Some Message");

        let first = event.compose_file_function_line();
        assert_eq!(first, "src/net/socket.rs:42 connect");
        assert!(event.was_accessed(FieldSet::FILE | FieldSet::FUNCTION | FieldSet::LINE));
        assert!(event.cached_fields().contains(FieldSet::FILE_FUNCTION_LINE));

        event.reset_access_tracking();
        let second = event.compose_file_function_line();
        assert!(std::ptr::eq(first, second));
        assert!(event.was_accessed(FieldSet::FILE_FUNCTION_LINE));
        assert!(!event.was_accessed(FieldSet::FILE));
        assert!(!event.was_accessed(FieldSet::FUNCTION));
        assert!(!event.was_accessed(FieldSet::LINE));
    }

    #[test]
    fn test_formatted_message_reuses_cached_location() {
        let event = dummy_event("Some Message");

        let first = event.compose_formatted_message(ComposeOptions::empty());
        assert!(event.was_accessed(
            FieldSet::FILE
                | FieldSet::FUNCTION
                | FieldSet::LINE
                | FieldSet::LEVEL
                | FieldSet::CHANNEL
                | FieldSet::MESSAGE
                | FieldSet::FILE_FUNCTION_LINE
                | FieldSet::FORMATTED_MESSAGE
        ));
        event.reset_access_tracking();

        let second = event.compose_formatted_message(ComposeOptions::empty());
        assert_eq!(first, second);
        assert!(!event.was_accessed(FieldSet::FILE));
        assert!(!event.was_accessed(FieldSet::FUNCTION));
        assert!(!event.was_accessed(FieldSet::LINE));
        assert!(event.was_accessed(FieldSet::LEVEL | FieldSet::CHANNEL | FieldSet::MESSAGE));
        assert!(event.was_accessed(FieldSet::FILE_FUNCTION_LINE | FieldSet::FORMATTED_MESSAGE));
    }

    #[test]
    fn test_formatted_message_layout() {
        let event = dummy_event("hello");

        let full = event.compose_formatted_message(
            ComposeOptions::LEVEL | ComposeOptions::CHANNEL | ComposeOptions::FILE_FUNCTION_LINE,
        );
        assert_eq!(full, "[ERR][SomeChannel] (src/net/socket.rs:42 connect) : hello");

        let bare = event.compose_formatted_message(ComposeOptions::CHANNEL);
        assert_eq!(bare, "[SomeChannel] : hello");
    }

    #[test]
    fn test_formatted_message_without_location_leaves_it_uncomputed() {
        let event = dummy_event("hello");
        let _ = event.compose_formatted_message(ComposeOptions::LEVEL | ComposeOptions::CHANNEL);
        assert!(!event.cached_fields().contains(FieldSet::FILE_FUNCTION_LINE));
        assert!(!event.was_accessed(FieldSet::FILE));
    }

    #[test]
    fn test_lifespan_timestamp() {
        let event = dummy_event("x");
        let line = event.compose_formatted_message(ComposeOptions::TIMESTAMP_SINCE_START);
        assert_eq!(line, "[0.100000] : x");
        assert!(event.was_accessed(FieldSet::LOG_LIFESPAN));
        assert!(!event.was_accessed(FieldSet::TIMESTAMP));
    }

    #[test]
    fn test_thread_captured_at_creation() {
        let event = std::thread::Builder::new()
            .name("producer".to_string())
            .spawn(|| dummy_event("from producer"))
            .unwrap()
            .join()
            .unwrap();

        assert_ne!(event.thread_id(), std::thread::current().id());
        assert!(!event.cached_fields().contains(FieldSet::THREAD_NAME));
        assert_eq!(event.thread_name(), "producer");
        assert!(event.cached_fields().contains(FieldSet::THREAD_NAME));
    }

    #[test]
    fn test_access_counts_accumulate() {
        let event = dummy_event("counted");
        let _ = event.message();
        let _ = event.message();
        let _ = event.level();

        assert_eq!(event.access_count(FieldSet::MESSAGE), 2);
        assert_eq!(event.access_count(FieldSet::MESSAGE | FieldSet::LEVEL), 3);
        assert_eq!(event.access_count(FieldSet::CHANNEL), 0);
        assert_eq!(event.accessed_fields(), FieldSet::MESSAGE | FieldSet::LEVEL);

        event.reset_access_tracking();
        assert_eq!(event.access_count(FieldSet::all()), 0);
        assert!(event.accessed_fields().is_empty());
    }

    #[test]
    fn test_message_length_does_not_read_message() {
        let event = dummy_event("héllo");
        assert_eq!(event.message_length(), 5);
        assert!(event.was_accessed(FieldSet::MESSAGE_LENGTH));
        assert!(!event.was_accessed(FieldSet::MESSAGE));
    }

    #[test]
    fn test_truncate_counts_characters() {
        let mut event = dummy_event("añb€c");
        event.truncate_message(3);
        assert_eq!(event.raw_message(), "añb");

        event.truncate_message(10);
        assert_eq!(event.raw_message(), "añb");
        assert!(event.accessed_fields().is_empty());
    }

    #[test]
    fn test_empty_channel_is_replaced() {
        let event = LogEvent::capture(
            Level::Information,
            "",
            CallSite::new(file!(), "test", line!()),
            None,
            "x",
            Duration::ZERO,
        );
        assert_eq!(event.channel(), DEFAULT_CHANNEL);
    }

    #[test]
    fn test_context_object_is_shared_not_copied() {
        let context: ContextObject = Arc::new(7_u32);
        let event = LogEvent::capture(
            Level::Notice,
            "Ctx",
            CallSite::new(file!(), "test", line!()),
            Some(context.clone()),
            "x",
            Duration::ZERO,
        );

        let seen = event.context_object().unwrap();
        assert!(Arc::ptr_eq(seen, &context));
        assert_eq!(seen.downcast_ref::<u32>(), Some(&7));
    }

    #[test]
    fn test_debug_output_does_not_touch_fields() {
        let event = dummy_event("quiet");
        let rendered = format!("{event:?}");
        assert!(rendered.contains("SomeChannel"));
        assert!(event.accessed_fields().is_empty());
    }
}
