//! Bridge from tracing to relaylog

use crate::{CallSite, Level, LogOptions, LoggingService};
use std::fmt::{self, Write as _};
use std::marker::PhantomData;
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::{Layer, layer::Context, registry::LookupSpan};

/// A tracing layer that forwards events to a [`LoggingService`].
///
/// The event target becomes the channel. Names of the enclosing spans are
/// prefixed to the message. Events emitted by relaylog itself are skipped.
pub struct TracingBridge<S> {
    service: LoggingService,
    _phantom: PhantomData<fn(S)>,
}

impl<S> TracingBridge<S> {
    /// Create a new tracing bridge
    #[must_use]
    pub const fn new(service: LoggingService) -> Self {
        Self {
            service,
            _phantom: PhantomData,
        }
    }
}

impl<S> Layer<S> for TracingBridge<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let metadata = event.metadata();
        if is_internal_target(metadata.target()) {
            return;
        }

        let level = map_level(*metadata.level());
        if !level.is_enabled_static() {
            return;
        }

        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);

        let spans: Vec<&str> = ctx
            .event_scope(event)
            .map(|scope| scope.from_root().map(|span| span.name()).collect())
            .unwrap_or_default();

        let message = if spans.is_empty() {
            visitor.finish()
        } else {
            format!("{}: {}", spans.join("::"), visitor.finish())
        };

        self.service.log(
            level,
            metadata.target(),
            CallSite::new(
                metadata.file().unwrap_or("<unknown>"),
                metadata.module_path().unwrap_or(""),
                metadata.line().unwrap_or(0),
            ),
            None,
            LogOptions::empty(),
            message,
        );
    }
}

/// Crates whose diagnostics would loop back into the service
const INTERNAL_CRATES: [&str; 2] = [env!("CARGO_CRATE_NAME"), "relaylog_crash"];

fn is_internal_target(target: &str) -> bool {
    let crate_name = target.split("::").next().unwrap_or(target);
    INTERNAL_CRATES.contains(&crate_name)
}

fn map_level(level: tracing::Level) -> Level {
    match level {
        tracing::Level::ERROR => Level::Error,
        tracing::Level::WARN => Level::Warning,
        tracing::Level::INFO => Level::Information,
        _ => Level::Debug,
    }
}

/// Collects the `message` field, followed by other fields as `key=value`
#[derive(Default)]
struct MessageVisitor {
    message: String,
    fields: String,
}

impl MessageVisitor {
    fn push_field(&mut self, field: &Field, value: &dyn fmt::Display) {
        if field.name() == "message" {
            let _ = write!(self.message, "{value}");
        } else {
            let _ = write!(self.fields, " {}={value}", field.name());
        }
    }

    fn finish(mut self) -> String {
        if self.message.is_empty() {
            return self.fields.trim_start().to_string();
        }
        self.message.push_str(&self.fields);
        self.message
    }
}

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.push_field(field, &value);
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.push_field(field, &value);
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.push_field(field, &value);
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.push_field(field, &value);
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.push_field(field, &format_args!("{value:?}"));
    }
}

/// Forward all `tracing` events to `service` through a global subscriber.
///
/// # Errors
///
/// Fails if a global subscriber is already installed.
///
/// # Example
/// ```no_run
/// use relaylog::{LoggingService, LoggingServiceConfig, compat::init_tracing_bridge};
///
/// let service = LoggingService::new(LoggingServiceConfig::default()).expect("worker");
/// init_tracing_bridge(service).expect("Failed to set tracing bridge");
/// ```
pub fn init_tracing_bridge(service: LoggingService) -> Result<(), Box<dyn std::error::Error>> {
    use tracing_subscriber::prelude::*;

    tracing_subscriber::registry()
        .with(TracingBridge::new(service))
        .try_init()?;

    Ok(())
}
