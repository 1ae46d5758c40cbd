//! Bridge from the `log` crate to relaylog

use crate::{CallSite, Level, LogOptions, LoggingService};
use log::{Log, Metadata, Record as LogRecord};
use std::borrow::Cow;

/// Forwards `log` records to a [`LoggingService`].
///
/// The record target becomes the channel and the module path stands in for
/// the function name.
pub struct LogBridge {
    service: LoggingService,
}

impl LogBridge {
    /// Create a new log bridge
    #[must_use]
    pub const fn new(service: LoggingService) -> Self {
        Self { service }
    }
}

impl Log for LogBridge {
    fn enabled(&self, metadata: &Metadata) -> bool {
        map_level(metadata.level()).is_enabled_static()
    }

    fn log(&self, record: &LogRecord) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let file: Cow<'static, str> = match (record.file_static(), record.file()) {
            (Some(file), _) => Cow::Borrowed(file),
            (None, Some(file)) => Cow::Owned(file.to_string()),
            (None, None) => Cow::Borrowed("<unknown>"),
        };
        let function: Cow<'static, str> =
            match (record.module_path_static(), record.module_path()) {
                (Some(path), _) => Cow::Borrowed(path),
                (None, Some(path)) => Cow::Owned(path.to_string()),
                (None, None) => Cow::Borrowed(""),
            };

        self.service.log(
            map_level(record.level()),
            record.target().to_string(),
            CallSite::owned(file, function, record.line().unwrap_or(0)),
            None,
            LogOptions::empty(),
            record.args().to_string(),
        );
    }

    // `log` may flush from inside an async runtime or a sink, where the
    // service's barriers cannot wait. Flush the service directly instead.
    fn flush(&self) {}
}

/// Map log levels to our levels
const fn map_level(level: log::Level) -> Level {
    match level {
        log::Level::Error => Level::Error,
        log::Level::Warn => Level::Warning,
        log::Level::Info => Level::Information,
        log::Level::Debug | log::Level::Trace => Level::Debug,
    }
}

/// Route the `log` crate's macros to `service`.
///
/// # Errors
///
/// Fails if another `log` logger is already installed.
///
/// # Example
/// ```no_run
/// use relaylog::{LoggingService, LoggingServiceConfig, compat::init_log_bridge};
///
/// let service = LoggingService::new(LoggingServiceConfig::default()).expect("worker");
/// init_log_bridge(service).expect("Failed to set log bridge");
/// ```
pub fn init_log_bridge(service: LoggingService) -> Result<(), log::SetLoggerError> {
    // `log::set_logger` requires 'static
    let bridge = Box::leak(Box::new(LogBridge::new(service)));
    log::set_logger(bridge)?;

    let max_level = if Level::Debug.is_enabled_static() {
        log::LevelFilter::Trace
    } else {
        log::LevelFilter::Info
    };
    log::set_max_level(max_level);
    Ok(())
}
