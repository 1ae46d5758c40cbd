//! Oversized-message policy

use crate::{ContextObject, Level, LogEvent};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// Everything an [`OverflowPolicy`] gets to see about an oversized message.
///
/// The policy receives the raw text rather than the event, so asking it
/// never marks any event field as read.
#[derive(Debug, Clone, Copy)]
pub struct OversizedMessage<'a> {
    /// Configured maximum safe length, in characters
    pub max_safe_length: usize,
    /// Severity
    pub level: Level,
    /// Channel
    pub channel: &'a str,
    /// Source file of the call
    pub file: &'a str,
    /// Function containing the call
    pub function: &'a str,
    /// Line of the call
    pub line: u32,
    /// Caller-supplied context
    pub context: Option<&'a ContextObject>,
    /// The full, untruncated message
    pub message: &'a str,
}

/// Decides how much of an oversized message to keep.
///
/// Only consulted when a message is longer than the service's maximum safe
/// length. Returning `0` discards the event; any other value truncates the
/// message to that many characters (values at or beyond its length keep it
/// whole).
pub trait OverflowPolicy: Send + Sync + 'static {
    /// Allowed length for this message
    fn allowed_length(&self, message: &OversizedMessage<'_>) -> usize;
}

impl<F> OverflowPolicy for F
where
    F: Fn(&OversizedMessage<'_>) -> usize + Send + Sync + 'static,
{
    fn allowed_length(&self, message: &OversizedMessage<'_>) -> usize {
        self(message)
    }
}

/// What the worker does with an event after the size check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SizeDecision {
    Deliver,
    Truncate(usize),
    Discard,
}

/// Applies the size policy to `event` in place.
///
/// Reads only the raw message, never the tracked accessor.
pub(crate) fn apply(
    event: &mut LogEvent,
    max_safe_length: usize,
    policy: Option<&Arc<dyn OverflowPolicy>>,
) -> SizeDecision {
    let decision = decide(event, max_safe_length, policy);
    if let SizeDecision::Truncate(chars) = decision {
        event.truncate_message(chars);
    }
    decision
}

fn decide(
    event: &LogEvent,
    max_safe_length: usize,
    policy: Option<&Arc<dyn OverflowPolicy>>,
) -> SizeDecision {
    if max_safe_length == 0 {
        return SizeDecision::Deliver;
    }

    let raw = event.raw_message();
    // A string never has more characters than bytes.
    if raw.len() <= max_safe_length {
        return SizeDecision::Deliver;
    }
    let length = raw.chars().count();
    if length <= max_safe_length {
        return SizeDecision::Deliver;
    }

    let allowed = policy.map_or(max_safe_length, |policy| {
        let call_site = event.raw_call_site();
        let oversized = OversizedMessage {
            max_safe_length,
            level: event.raw_level(),
            channel: event.raw_channel(),
            file: call_site.file(),
            function: call_site.function(),
            line: call_site.line(),
            context: event.raw_context(),
            message: raw,
        };

        panic::catch_unwind(AssertUnwindSafe(|| policy.allowed_length(&oversized)))
            .unwrap_or_else(|_| {
                tracing::error!(
                    max_safe_length,
                    "overflow policy panicked; truncating to the maximum safe length"
                );
                max_safe_length
            })
    });

    match allowed {
        0 => SizeDecision::Discard,
        allowed if allowed >= length => SizeDecision::Deliver,
        allowed => SizeDecision::Truncate(allowed),
    }
}
