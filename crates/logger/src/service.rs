//! The logging service handle

use crate::worker::{Command, Counters, Worker};
use crate::{
    CallSite, ContextObject, Error, Level, LogEvent, LogOptions, LoggingServiceConfig,
    OverflowPolicy, Result, Sink,
};
use arc_swap::ArcSwapOption;
use parking_lot::Mutex;
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Instant;
use tokio::sync::{mpsc, oneshot};

/// Entry point for logging.
///
/// Cheap to clone; clones share one worker. The worker stops, after flushing
/// every sink, once the last clone is dropped.
#[derive(Clone)]
pub struct LoggingService {
    inner: Arc<Inner>,
}

struct Inner {
    sender: mpsc::UnboundedSender<Command>,
    worker: Mutex<Option<JoinHandle<()>>>,
    worker_thread: ThreadId,
    started_at: Instant,
    counters: Arc<Counters>,
    max_pending_events: Option<usize>,

    // Caller-side mirrors of worker state; the worker's own copies are what
    // dispatch uses. Each setter updates its mirror and queues the command
    // under `settings`, so the last mirror write matches the last command.
    settings: Mutex<()>,
    maximum_safe_message_length: AtomicUsize,
    overflow_policy: ArcSwapOption<Arc<dyn OverflowPolicy>>,
}

impl LoggingService {
    /// Starts a service and its dispatch worker.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Spawn`] if the worker thread cannot be started.
    pub fn new(config: LoggingServiceConfig) -> Result<Self> {
        let (sender, receiver) = mpsc::unbounded_channel();
        let counters = Arc::new(Counters::default());
        let worker = Worker::new(
            receiver,
            config.maximum_safe_message_length,
            counters.clone(),
        );

        let handle = thread::Builder::new()
            .name(config.worker_thread_name.clone())
            .spawn(move || worker.run())
            .map_err(Error::Spawn)?;

        tracing::debug!(
            thread = %config.worker_thread_name,
            maximum_safe_message_length = config.maximum_safe_message_length,
            "logging service started"
        );

        Ok(Self {
            inner: Arc::new(Inner {
                sender,
                worker_thread: handle.thread().id(),
                worker: Mutex::new(Some(handle)),
                started_at: Instant::now(),
                counters,
                max_pending_events: config.max_pending_events,
                settings: Mutex::new(()),
                maximum_safe_message_length: AtomicUsize::new(
                    config.maximum_safe_message_length,
                ),
                overflow_policy: ArcSwapOption::empty(),
            }),
        })
    }

    /// Logs a message.
    ///
    /// Captures timestamp, thread and lifespan on the calling thread and
    /// queues the event; never blocks on sink work. An empty channel is
    /// replaced with [`DEFAULT_CHANNEL`](crate::DEFAULT_CHANNEL). When the
    /// queue is at its configured capacity the event is dropped and counted.
    pub fn log(
        &self,
        level: Level,
        channel: impl Into<Cow<'static, str>>,
        call_site: CallSite,
        context: Option<ContextObject>,
        options: LogOptions,
        message: impl Into<String>,
    ) {
        let counters = &self.inner.counters;
        let queued = counters.pending.fetch_add(1, Ordering::AcqRel);
        if self.inner.max_pending_events.is_some_and(|limit| queued >= limit) {
            counters.pending.fetch_sub(1, Ordering::AcqRel);
            counters.dropped.fetch_add(1, Ordering::Relaxed);
            return;
        }

        let event = LogEvent::capture(
            level,
            channel,
            call_site,
            context,
            message,
            self.inner.started_at.elapsed(),
        );

        let command = Command::Log {
            event: Box::new(event),
            options,
        };
        if self.inner.sender.send(command).is_err() {
            counters.pending.fetch_sub(1, Ordering::AcqRel);
        }
    }

    /// Registers a sink. Adding a sink that is already registered does
    /// nothing.
    pub fn add_sink(&self, sink: Arc<dyn Sink>) {
        self.send(Command::AddSink(sink));
    }

    /// Unregisters a sink. Removing an unknown sink does nothing.
    pub fn remove_sink(&self, sink: Arc<dyn Sink>) {
        self.send(Command::RemoveSink(sink));
    }

    /// Sets the longest message, in characters, delivered without
    /// consulting the overflow policy. `0` disables the limit.
    ///
    /// Applies to every event logged after this call.
    pub fn set_maximum_safe_message_length(&self, length: usize) {
        let _settings = self.inner.settings.lock();
        self.inner
            .maximum_safe_message_length
            .store(length, Ordering::Release);
        self.send(Command::SetMaximumSafeMessageLength(length));
    }

    /// Current maximum safe message length
    #[must_use]
    pub fn maximum_safe_message_length(&self) -> usize {
        self.inner.maximum_safe_message_length.load(Ordering::Acquire)
    }

    /// Installs or clears the policy consulted for oversized messages.
    ///
    /// Without a policy, oversized messages are truncated to the maximum
    /// safe length.
    pub fn set_overflow_policy(&self, policy: Option<Arc<dyn OverflowPolicy>>) {
        let _settings = self.inner.settings.lock();
        self.inner
            .overflow_policy
            .store(policy.clone().map(Arc::new));
        self.send(Command::SetOverflowPolicy(policy));
    }

    /// Current overflow policy
    #[must_use]
    pub fn overflow_policy(&self) -> Option<Arc<dyn OverflowPolicy>> {
        self.inner.overflow_policy.load_full().as_deref().cloned()
    }

    /// Forgets every cached filter decision
    pub fn invalidate_filter_cache(&self) {
        self.send(Command::InvalidateFilterCache);
    }

    /// Waits until everything queued before this call has reached the sinks
    /// and every sink has been flushed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CalledFromWorker`] when called from a sink, and
    /// [`Error::WorkerUnavailable`] if the worker has stopped.
    pub async fn flush(&self) -> Result<()> {
        let (done, waiter) = oneshot::channel();
        self.barrier(Command::Flush(done))?;
        waiter.await.map_err(|_| Error::WorkerUnavailable)
    }

    /// Blocking form of [`flush`](Self::flush). Must not be called from
    /// inside an async runtime.
    ///
    /// # Errors
    ///
    /// Same as [`flush`](Self::flush).
    pub fn flush_blocking(&self) -> Result<()> {
        let (done, waiter) = oneshot::channel();
        self.barrier(Command::Flush(done))?;
        waiter.blocking_recv().map_err(|_| Error::WorkerUnavailable)
    }

    /// Registered sinks, in registration order, as of every command queued
    /// before this call.
    ///
    /// # Errors
    ///
    /// Same as [`flush`](Self::flush).
    pub async fn sinks(&self) -> Result<Vec<Arc<dyn Sink>>> {
        let (reply, waiter) = oneshot::channel();
        self.barrier(Command::Snapshot(reply))?;
        waiter.await.map_err(|_| Error::WorkerUnavailable)
    }

    /// Number of events dropped because the queue was full
    #[must_use]
    pub fn dropped_event_count(&self) -> u64 {
        self.inner.counters.dropped.load(Ordering::Relaxed)
    }

    /// When this service was created; event lifespans are measured from here
    #[must_use]
    pub fn started_at(&self) -> Instant {
        self.inner.started_at
    }

    fn send(&self, command: Command) {
        if self.inner.sender.send(command).is_err() {
            tracing::warn!("logging worker is not running; command ignored");
        }
    }

    fn barrier(&self, command: Command) -> Result<()> {
        if thread::current().id() == self.inner.worker_thread {
            return Err(Error::CalledFromWorker);
        }
        self.inner
            .sender
            .send(command)
            .map_err(|_| Error::WorkerUnavailable)
    }
}

impl fmt::Debug for LoggingService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoggingService")
            .field("maximum_safe_message_length", &self.maximum_safe_message_length())
            .field("pending", &self.inner.counters.pending.load(Ordering::Relaxed))
            .field("dropped", &self.dropped_event_count())
            .finish_non_exhaustive()
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        let _ = self.sender.send(Command::Shutdown);

        // A sink holding the last clone drops it on the worker itself;
        // joining there would never return.
        if thread::current().id() == self.worker_thread {
            return;
        }
        if let Some(handle) = self.worker.lock().take() {
            if handle.join().is_err() {
                tracing::error!("logging worker panicked");
            }
        }
    }
}
