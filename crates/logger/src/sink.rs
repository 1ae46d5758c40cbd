//! Sink contract

use crate::{ContextObject, Level, LogEvent};

/// Outcome of a sink's pre-dispatch filter.
///
/// `CannotLogLevel` and `CannotLogChannel` depend only on the level and
/// channel, so the worker caches them per sink. `CannotLogExternalFactor`
/// is re-evaluated for every event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterStatus {
    /// Deliver the event
    Ok,
    /// The sink does not accept this level
    CannotLogLevel,
    /// The sink does not accept this channel
    CannotLogChannel,
    /// Something outside level and channel rules the event out
    CannotLogExternalFactor,
}

impl FilterStatus {
    /// Whether the event should be delivered
    #[must_use]
    pub const fn is_ok(self) -> bool {
        matches!(self, Self::Ok)
    }

    pub(crate) const fn is_cacheable(self) -> bool {
        !matches!(self, Self::CannotLogExternalFactor)
    }
}

/// A destination for log events.
///
/// All methods run on the service's dispatch worker, one call at a time, in
/// registration order. A sink should read only the [`LogEvent`] fields it
/// needs; untouched fields are never computed. Panics are caught at the
/// dispatch boundary and do not reach other sinks.
pub trait Sink: Send + Sync + 'static {
    /// Handle one event
    fn receive(&self, event: &LogEvent);

    /// Decide, without seeing the message, whether an event is wanted
    fn filter(
        &self,
        _level: Level,
        _channel: &str,
        _context: Option<&ContextObject>,
    ) -> FilterStatus {
        FilterStatus::Ok
    }

    /// Flush anything buffered
    fn flush(&self) {}

    /// Name used in diagnostics
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}
