//! Error types for the logging service

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by the service's fallible operations.
///
/// Size-policy decisions and sink failures are never reported here: the
/// former are not errors and the latter stay inside the sink.
#[derive(Debug, Error)]
pub enum Error {
    /// The dispatch worker thread could not be started
    #[error("failed to spawn dispatch worker: {0}")]
    Spawn(#[source] std::io::Error),

    /// The dispatch queue is closed
    #[error("dispatch worker is no longer running")]
    WorkerUnavailable,

    /// A barrier was requested from the dispatch worker itself
    #[error("cannot wait for the dispatch worker from inside a sink")]
    CalledFromWorker,

    /// The process-wide service was already installed
    #[error("a global logging service is already installed")]
    AlreadyInitialized,
}

/// Error returned when a level name cannot be parsed
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("unknown log level: {0}")]
pub struct ParseLevelError(pub String);
