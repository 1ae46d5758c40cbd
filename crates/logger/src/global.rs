//! Process-wide service slot used by the logging macros

use crate::{Error, LoggingService, Result};
use std::sync::OnceLock;

static GLOBAL: OnceLock<LoggingService> = OnceLock::new();

/// Installs the service the logging macros write to.
///
/// The slot can be filled once per process. The installed service is never
/// dropped, so call [`LoggingService::flush_blocking`] before exiting.
///
/// # Errors
///
/// Returns [`Error::AlreadyInitialized`] if a service is already installed.
pub fn init(service: LoggingService) -> Result<()> {
    GLOBAL
        .set(service)
        .map_err(|_| Error::AlreadyInitialized)
}

/// The installed service, if any
#[must_use]
pub fn global() -> Option<&'static LoggingService> {
    GLOBAL.get()
}
