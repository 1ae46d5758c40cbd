//! Serial dispatch worker

use crate::overflow::{self, SizeDecision};
use crate::{FilterStatus, Level, LogEvent, LogOptions, OverflowPolicy, Sink};
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use tokio::sync::{mpsc, oneshot};

/// Work items for the dispatch worker, processed strictly in queue order
pub(crate) enum Command {
    Log {
        event: Box<LogEvent>,
        options: LogOptions,
    },
    AddSink(Arc<dyn Sink>),
    RemoveSink(Arc<dyn Sink>),
    SetMaximumSafeMessageLength(usize),
    SetOverflowPolicy(Option<Arc<dyn OverflowPolicy>>),
    InvalidateFilterCache,
    Flush(oneshot::Sender<()>),
    Snapshot(oneshot::Sender<Vec<Arc<dyn Sink>>>),
    Shutdown,
}

/// Queue bookkeeping shared between the service handle and the worker
#[derive(Debug, Default)]
pub(crate) struct Counters {
    /// Log events enqueued and not yet dispatched
    pub(crate) pending: AtomicUsize,
    /// Log events shed because the queue was at capacity
    pub(crate) dropped: AtomicU64,
}

/// Per-channel filter decisions, indexed by level
type LevelDecisions = [Option<FilterStatus>; Level::COUNT];

/// Channels remembered per sink before its filter cache starts over
const MAX_CACHED_CHANNELS: usize = 1024;

struct Registration {
    sink: Arc<dyn Sink>,
    filter_cache: HashMap<String, LevelDecisions>,
}

impl Registration {
    fn new(sink: Arc<dyn Sink>) -> Self {
        Self {
            sink,
            filter_cache: HashMap::new(),
        }
    }

    fn admits(&mut self, event: &LogEvent, options: LogOptions) -> bool {
        let level = event.raw_level();
        let channel = event.raw_channel();

        if !options.contains(LogOptions::IGNORE_FILTER_CACHE) {
            if let Some(status) = self
                .filter_cache
                .get(channel)
                .and_then(|levels| levels[level.index()])
            {
                return status.is_ok();
            }
        }

        let sink = &self.sink;
        let status = panic::catch_unwind(AssertUnwindSafe(|| {
            sink.filter(level, channel, event.raw_context())
        }))
        .unwrap_or_else(|_| {
            tracing::error!(sink = sink.name(), "sink filter panicked; skipping event");
            FilterStatus::CannotLogExternalFactor
        });

        if status.is_cacheable() {
            if self.filter_cache.len() >= MAX_CACHED_CHANNELS
                && !self.filter_cache.contains_key(channel)
            {
                tracing::trace!(sink = self.sink.name(), "filter cache full; clearing");
                self.filter_cache.clear();
            }
            self.filter_cache
                .entry(channel.to_owned())
                .or_insert([None; Level::COUNT])[level.index()] = Some(status);
        } else if let Some(levels) = self.filter_cache.get_mut(channel) {
            levels[level.index()] = None;
        }

        status.is_ok()
    }
}

fn same_sink(a: &Arc<dyn Sink>, b: &Arc<dyn Sink>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

/// Owns every piece of state that dispatch depends on.
///
/// Nothing here is shared: the service changes it only by queueing commands.
pub(crate) struct Worker {
    receiver: mpsc::UnboundedReceiver<Command>,
    sinks: Vec<Registration>,
    overflow_policy: Option<Arc<dyn OverflowPolicy>>,
    maximum_safe_message_length: usize,
    counters: Arc<Counters>,
}

impl Worker {
    pub(crate) fn new(
        receiver: mpsc::UnboundedReceiver<Command>,
        maximum_safe_message_length: usize,
        counters: Arc<Counters>,
    ) -> Self {
        Self {
            receiver,
            sinks: Vec::new(),
            overflow_policy: None,
            maximum_safe_message_length,
            counters,
        }
    }

    pub(crate) fn run(mut self) {
        tracing::debug!("dispatch worker started");

        while let Some(command) = self.receiver.blocking_recv() {
            match command {
                Command::Log { mut event, options } => {
                    self.dispatch(&mut event, options);
                    self.counters.pending.fetch_sub(1, Ordering::AcqRel);
                }

                Command::AddSink(sink) => self.add_sink(sink),

                Command::RemoveSink(sink) => self.remove_sink(&sink),

                Command::SetMaximumSafeMessageLength(length) => {
                    self.maximum_safe_message_length = length;
                }

                Command::SetOverflowPolicy(policy) => self.overflow_policy = policy,

                Command::InvalidateFilterCache => self.invalidate_filter_cache(),

                Command::Flush(done) => {
                    self.flush_sinks();
                    let _ = done.send(());
                }

                Command::Snapshot(reply) => {
                    let sinks = self.sinks.iter().map(|r| r.sink.clone()).collect();
                    let _ = reply.send(sinks);
                }

                Command::Shutdown => break,
            }
        }

        self.flush_sinks();
        tracing::debug!("dispatch worker stopped");
    }

    fn dispatch(&mut self, event: &mut LogEvent, options: LogOptions) {
        match overflow::apply(
            event,
            self.maximum_safe_message_length,
            self.overflow_policy.as_ref(),
        ) {
            SizeDecision::Discard => {
                tracing::debug!(
                    channel = event.raw_channel(),
                    "discarded message exceeding the maximum safe length"
                );
                return;
            }
            SizeDecision::Truncate(chars) => {
                tracing::trace!(
                    channel = event.raw_channel(),
                    chars,
                    "truncated message exceeding the maximum safe length"
                );
            }
            SizeDecision::Deliver => {}
        }

        let event: &LogEvent = event;
        for registration in &mut self.sinks {
            if !registration.admits(event, options) {
                continue;
            }

            let sink = &registration.sink;
            if panic::catch_unwind(AssertUnwindSafe(|| sink.receive(event))).is_err() {
                tracing::error!(sink = sink.name(), "sink panicked while receiving an event");
            }
        }
    }

    fn add_sink(&mut self, sink: Arc<dyn Sink>) {
        if self.sinks.iter().any(|r| same_sink(&r.sink, &sink)) {
            return;
        }

        tracing::debug!(sink = sink.name(), "sink added");
        self.invalidate_filter_cache();
        self.sinks.push(Registration::new(sink));
    }

    fn remove_sink(&mut self, sink: &Arc<dyn Sink>) {
        let before = self.sinks.len();
        self.sinks.retain(|r| !same_sink(&r.sink, sink));

        if self.sinks.len() != before {
            tracing::debug!(sink = sink.name(), "sink removed");
            self.invalidate_filter_cache();
        }
    }

    fn invalidate_filter_cache(&mut self) {
        for registration in &mut self.sinks {
            registration.filter_cache.clear();
        }
    }

    fn flush_sinks(&self) {
        for registration in &self.sinks {
            let sink = &registration.sink;
            if panic::catch_unwind(AssertUnwindSafe(|| sink.flush())).is_err() {
                tracing::error!(sink = sink.name(), "sink panicked while flushing");
            }
        }
    }
}
