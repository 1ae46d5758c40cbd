//! Plain-text sink over any writer

use crate::{ComposeOptions, LogEvent, Sink};
use parking_lot::Mutex;
use std::io::{self, Write};

/// Writes one formatted line per event to a [`Write`] implementation.
///
/// Write errors are ignored; logging never fails the caller.
pub struct StreamSink<W> {
    writer: Mutex<W>,
    options: ComposeOptions,
}

impl<W: Write + Send + 'static> StreamSink<W> {
    /// Sink writing to `writer` with the default prefix fields
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
            options: ComposeOptions::DEFAULT,
        }
    }

    /// Choose the prefix fields written before each message
    #[must_use]
    pub fn with_options(mut self, options: ComposeOptions) -> Self {
        self.options = options;
        self
    }

    /// Consumes the sink, returning the writer
    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

impl StreamSink<io::Stderr> {
    /// Sink on the process's standard error
    #[must_use]
    pub fn stderr() -> Self {
        Self::new(io::stderr())
    }
}

impl<W: Write + Send + 'static> Sink for StreamSink<W> {
    fn receive(&self, event: &LogEvent) {
        let mut line = event.compose_formatted_message(self.options);
        line.push('\n');
        let _ = self.writer.lock().write_all(line.as_bytes());
    }

    fn flush(&self) {
        let _ = self.writer.lock().flush();
    }
}
