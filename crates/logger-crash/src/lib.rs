//! Crash-diagnostics sink for relaylog.
//!
//! Forwards log events as short breadcrumbs to a crash reporter, so the
//! last things an application logged travel with its crash report. Very
//! large messages can be dropped without ever being read.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![forbid(unsafe_code)]

mod reporter;
mod sink;

pub use reporter::{BreadcrumbRing, CrashReporter};
pub use sink::{CrashDiagnosticsSink, DEFAULT_LARGE_MESSAGE_THRESHOLD};
