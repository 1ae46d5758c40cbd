//! Asynchronous multi-sink logging pipeline.
//!
//! Callers hand leveled, channeled messages to a [`LoggingService`]. The
//! service captures call-site, time and thread context on the calling thread,
//! then queues the event onto a single serial worker which applies the
//! oversized-message policy and fans the event out to every registered
//! [`Sink`] in registration order.
//!
//! Fields of a [`LogEvent`] that no sink reads are never computed; derived
//! fields are memoized the first time a sink asks for them.
//!
//! # Example
//! ```no_run
//! use relaylog::{CallSite, Level, LogOptions, LoggingService, LoggingServiceConfig};
//! use relaylog::stream::StreamSink;
//! use std::sync::Arc;
//!
//! let service = LoggingService::new(LoggingServiceConfig::default()).expect("worker");
//! service.add_sink(Arc::new(StreamSink::stderr()));
//! service.log(
//!     Level::Error,
//!     "Network",
//!     CallSite::new(file!(), "main", line!()),
//!     None,
//!     LogOptions::empty(),
//!     "connection reset",
//! );
//! service.flush_blocking().expect("flush");
//! ```
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![forbid(unsafe_code)]

mod config;
mod error;
mod event;
mod global;
mod level;
mod macros;
mod memo;
mod options;
mod overflow;
mod service;
mod sink;
mod worker;

pub mod compat;

#[cfg(feature = "console")]
pub mod console;

pub mod stream;

#[cfg(feature = "test-support")]
pub mod test_support;

pub use config::LoggingServiceConfig;
pub use error::{Error, ParseLevelError, Result};
pub use event::{CallSite, ContextObject, DEFAULT_CHANNEL, FieldSet, LogEvent};
pub use global::{global, init};
pub use level::Level;
#[doc(hidden)]
pub use macros::function_name_from_path as __function_name_from_path;
pub use options::{ComposeOptions, LogOptions};
pub use overflow::{OverflowPolicy, OversizedMessage};
pub use service::LoggingService;
pub use sink::{FilterStatus, Sink};
