//! Dispatch behaviour of the logging service

use assert_matches::assert_matches;
use parking_lot::Mutex;
use relaylog::test_support::CaptureSink;
use relaylog::{
    CallSite, ContextObject, Error, FieldSet, FilterStatus, Level, LogEvent, LogOptions,
    LoggingService, LoggingServiceConfig, Sink,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock, mpsc};
use std::thread;

fn service() -> LoggingService {
    LoggingService::new(LoggingServiceConfig::default()).unwrap()
}

fn here() -> CallSite {
    CallSite::new(file!(), "service_test", line!())
}

fn log(service: &LoggingService, level: Level, channel: &'static str, message: impl Into<String>) {
    service.log(level, channel, here(), None, LogOptions::empty(), message);
}

/// Appends `(sink, message)` to a log shared between sinks
struct Tagged {
    tag: &'static str,
    seen: Arc<Mutex<Vec<(&'static str, String)>>>,
}

impl Sink for Tagged {
    fn receive(&self, event: &LogEvent) {
        self.seen.lock().push((self.tag, event.message().to_string()));
    }
}

#[test]
fn test_per_thread_order_is_preserved() {
    const THREADS: usize = 8;
    const PER_THREAD: usize = 500;

    let service = service();
    let capture = Arc::new(CaptureSink::reading(FieldSet::MESSAGE));
    let mirror = Arc::new(CaptureSink::reading(FieldSet::MESSAGE));
    service.add_sink(capture.clone());
    service.add_sink(mirror.clone());

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let service = service.clone();
            thread::spawn(move || {
                for n in 0..PER_THREAD {
                    log(&service, Level::Information, "Order", format!("{t}:{n}"));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    service.flush_blocking().unwrap();

    let messages = capture.messages();
    assert_eq!(messages.len(), THREADS * PER_THREAD);
    assert_eq!(messages, mirror.messages(), "sinks disagree on interleaving");

    let mut next: HashMap<usize, usize> = HashMap::new();
    for message in messages {
        let (t, n) = message.split_once(':').unwrap();
        let (t, n): (usize, usize) = (t.parse().unwrap(), n.parse().unwrap());
        let expected = next.entry(t).or_insert(0);
        assert_eq!(n, *expected, "thread {t} delivered out of order");
        *expected += 1;
    }
}

#[test]
fn test_fan_out_in_registration_order() {
    let service = service();
    let seen = Arc::new(Mutex::new(Vec::new()));
    service.add_sink(Arc::new(Tagged { tag: "a", seen: seen.clone() }));
    service.add_sink(Arc::new(Tagged { tag: "b", seen: seen.clone() }));

    log(&service, Level::Notice, "FanOut", "m1");
    log(&service, Level::Notice, "FanOut", "m2");
    service.flush_blocking().unwrap();

    let expected = vec![
        ("a", "m1".to_string()),
        ("b", "m1".to_string()),
        ("a", "m2".to_string()),
        ("b", "m2".to_string()),
    ];
    assert_eq!(*seen.lock(), expected);
}

#[tokio::test]
async fn test_add_and_remove_are_idempotent() {
    let service = service();
    let capture = Arc::new(CaptureSink::new());
    let other: Arc<dyn Sink> = Arc::new(CaptureSink::new());

    service.add_sink(capture.clone());
    service.add_sink(capture.clone());
    service.remove_sink(other.clone());
    assert_eq!(service.sinks().await.unwrap().len(), 1);

    log(&service, Level::Warning, "Idempotent", "once");
    service.flush().await.unwrap();
    assert_eq!(capture.messages(), vec!["once"]);

    service.remove_sink(capture.clone());
    service.remove_sink(capture.clone());
    log(&service, Level::Warning, "Idempotent", "unseen");
    service.flush().await.unwrap();

    assert_eq!(capture.len(), 1);
    assert!(service.sinks().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_sinks_snapshot_keeps_order() {
    let service = service();
    let first: Arc<dyn Sink> = Arc::new(CaptureSink::new());
    let second: Arc<dyn Sink> = Arc::new(CaptureSink::new());
    service.add_sink(first.clone());
    service.add_sink(second.clone());

    let sinks = service.sinks().await.unwrap();
    assert_eq!(sinks.len(), 2);
    assert!(Arc::ptr_eq(&sinks[0], &first));
    assert!(Arc::ptr_eq(&sinks[1], &second));
}

#[test]
fn test_panicking_sink_does_not_affect_others() {
    struct Exploding;

    impl Sink for Exploding {
        fn receive(&self, _event: &LogEvent) {
            panic!("sink failure");
        }
    }

    let service = service();
    let capture = Arc::new(CaptureSink::new());
    service.add_sink(Arc::new(Exploding));
    service.add_sink(capture.clone());

    log(&service, Level::Error, "Panics", "first");
    log(&service, Level::Error, "Panics", "second");
    service.flush_blocking().unwrap();

    assert_eq!(capture.messages(), vec!["first", "second"]);
}

#[test]
fn test_context_is_captured_on_calling_thread() {
    let service = service();
    let capture = Arc::new(CaptureSink::new());
    service.add_sink(capture.clone());

    let before = chrono::Utc::now();
    let caller = {
        let service = service.clone();
        thread::Builder::new()
            .name("caller-7".to_string())
            .spawn(move || {
                let context: ContextObject = Arc::new(42_u32);
                service.log(
                    Level::Critical,
                    "Context",
                    CallSite::new("src/jobs.rs", "run_job", 311),
                    Some(context),
                    LogOptions::empty(),
                    "job failed",
                );
                thread::current().id()
            })
            .unwrap()
            .join()
            .unwrap()
    };
    let after = chrono::Utc::now();
    service.flush_blocking().unwrap();

    let events = capture.events();
    let event = &events[0];
    assert_eq!(event.level, Some(Level::Critical));
    assert_eq!(event.channel.as_deref(), Some("Context"));
    assert_eq!(event.file.as_deref(), Some("src/jobs.rs"));
    assert_eq!(event.function.as_deref(), Some("run_job"));
    assert_eq!(event.line, Some(311));
    assert_eq!(event.thread_id, Some(caller));
    assert_eq!(event.thread_name.as_deref(), Some("caller-7"));

    let timestamp = event.timestamp.unwrap();
    assert!(before <= timestamp && timestamp <= after);
    assert!(event.log_lifespan.unwrap() <= service.started_at().elapsed());

    let context = event.context.as_ref().unwrap();
    assert_eq!(context.downcast_ref::<u32>(), Some(&42));
}

#[test]
fn test_empty_channel_becomes_default() {
    let service = service();
    let capture = Arc::new(CaptureSink::reading(FieldSet::CHANNEL));
    service.add_sink(capture.clone());

    log(&service, Level::Information, "", "no channel");
    service.flush_blocking().unwrap();

    assert_eq!(capture.events()[0].channel.as_deref(), Some(relaylog::DEFAULT_CHANNEL));
}

#[test]
fn test_memoized_fields_are_shared_between_sinks() {
    let service = service();
    let first = Arc::new(CaptureSink::reading(FieldSet::MESSAGE_LENGTH | FieldSet::LEVEL));
    let second = Arc::new(CaptureSink::reading(FieldSet::MESSAGE_LENGTH));
    service.add_sink(first.clone());
    service.add_sink(second.clone());

    log(&service, Level::Alert, "Memo", "twelve chars");
    service.flush_blocking().unwrap();

    let first = &first.events()[0];
    assert!(first.accessed_on_entry.is_empty());
    assert!(first.cached_on_entry.is_empty());
    assert_eq!(first.cached_on_exit, FieldSet::MESSAGE_LENGTH);

    let second = &second.events()[0];
    assert_eq!(second.accessed_on_entry, FieldSet::MESSAGE_LENGTH | FieldSet::LEVEL);
    assert_eq!(second.cached_on_entry, FieldSet::MESSAGE_LENGTH);
    assert_eq!(second.message_length, Some(12));
    assert!(!second.accessed_on_exit.contains(FieldSet::MESSAGE));
}

#[test]
fn test_each_sink_reads_only_what_it_needs() {
    let service = service();
    let a = Arc::new(CaptureSink::new());
    let b = Arc::new(CaptureSink::reading(
        FieldSet::LEVEL | FieldSet::CHANNEL | FieldSet::MESSAGE,
    ));
    let seen = Arc::new(Mutex::new(Vec::new()));
    service.add_sink(a.clone());
    service.add_sink(Arc::new(Tagged { tag: "after a", seen: seen.clone() }));
    service.add_sink(b.clone());
    service.add_sink(Arc::new(Tagged { tag: "after b", seen: seen.clone() }));

    log(&service, Level::Error, "X", "hello");
    service.flush_blocking().unwrap();

    assert_eq!(a.messages(), vec!["hello"]);
    assert_eq!(b.messages(), vec!["hello"]);
    assert_eq!(
        *seen.lock(),
        vec![("after a", "hello".to_string()), ("after b", "hello".to_string())]
    );

    let a = &a.events()[0];
    assert!(!a.cached_on_entry.contains(FieldSet::FILE_FUNCTION_LINE));
    assert!(a.cached_on_exit.contains(FieldSet::FILE_FUNCTION_LINE));
    assert!(a.accessed_by_sink.contains(FieldSet::FILE_FUNCTION_LINE));

    let b = &b.events()[0];
    assert_eq!(b.level, Some(Level::Error));
    assert_eq!(b.channel.as_deref(), Some("X"));
    assert!(b.file_function_line.is_none());
    assert_eq!(
        b.accessed_by_sink,
        FieldSet::LEVEL | FieldSet::CHANNEL | FieldSet::MESSAGE
    );
}

/// Refuses debug events and the `External` channel, counting filter calls
#[derive(Default)]
struct CountingFilter {
    calls: AtomicUsize,
    received: Mutex<Vec<String>>,
}

impl Sink for CountingFilter {
    fn receive(&self, event: &LogEvent) {
        self.received.lock().push(event.message().to_string());
    }

    fn filter(

        &self,

        level: Level,

        channel: &str,

        _context: Option<&ContextObject>,

    ) -> FilterStatus {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if channel == "External" {
            FilterStatus::CannotLogExternalFactor
        } else if level == Level::Debug {
            FilterStatus::CannotLogLevel
        } else {
            FilterStatus::Ok
        }
    }
}

#[test]
fn test_filter_decisions_are_cached() {
    let service = service();
    let sink = Arc::new(CountingFilter::default());
    service.add_sink(sink.clone());

    for _ in 0..3 {
        log(&service, Level::Debug, "Net", "refused");
    }
    log(&service, Level::Error, "Net", "e1");
    log(&service, Level::Error, "Net", "e2");
    service.flush_blocking().unwrap();

    assert_eq!(sink.calls.load(Ordering::SeqCst), 2);
    assert_eq!(*sink.received.lock(), vec!["e1", "e2"]);
}

#[test]
fn test_external_factor_is_never_cached() {
    let service = service();
    let sink = Arc::new(CountingFilter::default());
    service.add_sink(sink.clone());

    log(&service, Level::Error, "External", "x1");
    log(&service, Level::Error, "External", "x2");
    service.flush_blocking().unwrap();

    assert_eq!(sink.calls.load(Ordering::SeqCst), 2);
    assert!(sink.received.lock().is_empty());
}

#[test]
fn test_filter_cache_bypass_and_invalidation() {
    let service = service();
    let sink = Arc::new(CountingFilter::default());
    service.add_sink(sink.clone());

    log(&service, Level::Debug, "Net", "cached");
    log(&service, Level::Debug, "Net", "cached");
    service.log(
        Level::Debug,
        "Net",
        here(),
        None,
        LogOptions::IGNORE_FILTER_CACHE,
        "bypass",
    );
    service.flush_blocking().unwrap();
    assert_eq!(sink.calls.load(Ordering::SeqCst), 2);

    service.invalidate_filter_cache();
    log(&service, Level::Debug, "Net", "after invalidation");
    service.flush_blocking().unwrap();
    assert_eq!(sink.calls.load(Ordering::SeqCst), 3);

    service.add_sink(Arc::new(CaptureSink::new()));
    log(&service, Level::Debug, "Net", "after add");
    service.flush_blocking().unwrap();
    assert_eq!(sink.calls.load(Ordering::SeqCst), 4);
}

#[test]
fn test_flush_from_sink_is_rejected() {
    #[derive(Default)]
    struct Reentrant {
        service: OnceLock<LoggingService>,
        outcome: Mutex<Option<relaylog::Result<()>>>,
    }

    impl Sink for Reentrant {
        fn receive(&self, _event: &LogEvent) {
            if let Some(service) = self.service.get() {
                *self.outcome.lock() = Some(service.flush_blocking());
            }
        }
    }

    let service = service();
    let sink = Arc::new(Reentrant::default());
    sink.service.set(service.clone()).unwrap();
    service.add_sink(sink.clone());

    log(&service, Level::Error, "Reentrant", "flush me");
    service.flush_blocking().unwrap();
    assert_matches!(*sink.outcome.lock(), Some(Err(Error::CalledFromWorker)));

    service.remove_sink(sink.clone());
    service.flush_blocking().unwrap();
}

#[test]
fn test_full_queue_drops_and_counts() {
    struct Gated(Mutex<mpsc::Receiver<()>>, Mutex<Vec<String>>);

    impl Sink for Gated {
        fn receive(&self, event: &LogEvent) {
            let _ = self.0.lock().recv();
            self.1.lock().push(event.message().to_string());
        }
    }

    let service =
        LoggingService::new(LoggingServiceConfig::default().with_max_pending_events(2)).unwrap();
    let (open, gate) = mpsc::channel();
    let sink = Arc::new(Gated(Mutex::new(gate), Mutex::new(Vec::new())));
    service.add_sink(sink.clone());

    log(&service, Level::Information, "Queue", "kept 1");
    log(&service, Level::Information, "Queue", "kept 2");
    log(&service, Level::Information, "Queue", "dropped");
    assert_eq!(service.dropped_event_count(), 1);

    open.send(()).unwrap();
    open.send(()).unwrap();
    service.flush_blocking().unwrap();

    assert_eq!(*sink.1.lock(), vec!["kept 1", "kept 2"]);
    assert_eq!(service.dropped_event_count(), 1);
}

#[test]
fn test_sink_flush_runs_on_barrier() {
    #[derive(Default)]
    struct Flushing(AtomicUsize);

    impl Sink for Flushing {
        fn receive(&self, _event: &LogEvent) {}

        fn flush(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    let service = service();
    let sink = Arc::new(Flushing::default());
    service.add_sink(sink.clone());

    service.flush_blocking().unwrap();
    service.flush_blocking().unwrap();
    assert_eq!(sink.0.load(Ordering::SeqCst), 2);
}
