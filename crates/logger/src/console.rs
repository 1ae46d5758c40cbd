//! Colourised terminal sink for development

use crate::{ComposeOptions, ContextObject, FilterStatus, Level, LogEvent, Sink};
use parking_lot::Mutex;
use std::io::Write;
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

/// Writes events to stdout or stderr with the level tag coloured
pub struct ConsoleSink {
    /// Minimum level written
    min_level: Level,
    options: ComposeOptions,
    /// Lock for the stream (to prevent interleaving)
    stream: Mutex<StandardStream>,
}

impl ConsoleSink {
    /// Console sink on stdout
    #[must_use]
    pub fn new() -> Self {
        Self::with_stream(StandardStream::stdout(ColorChoice::Auto))
    }

    /// Console sink on stderr
    #[must_use]
    pub fn stderr() -> Self {
        Self::with_stream(StandardStream::stderr(ColorChoice::Auto))
    }

    fn with_stream(stream: StandardStream) -> Self {
        Self {
            min_level: Level::Debug,
            options: ComposeOptions::DEFAULT,
            stream: Mutex::new(stream),
        }
    }

    /// Only write events at `level` or above
    #[must_use]
    pub fn with_level(mut self, level: Level) -> Self {
        self.min_level = level;
        self
    }

    /// Choose the prefix fields written before each message
    #[must_use]
    pub fn with_options(mut self, options: ComposeOptions) -> Self {
        self.options = options;
        self
    }

    const fn color(level: Level) -> Color {
        match level {
            Level::Debug => Color::Blue,
            Level::Information => Color::Green,
            Level::Notice => Color::Cyan,
            Level::Warning => Color::Yellow,
            Level::Error => Color::Red,
            Level::Critical | Level::Alert | Level::Emergency => Color::Magenta,
        }
    }
}

impl Default for ConsoleSink {
    fn default() -> Self {
        Self::new()
    }
}

impl Sink for ConsoleSink {
    fn receive(&self, event: &LogEvent) {
        let options = self.options.effective();
        // The tag is written separately so only it is coloured.
        let prefix = options - ComposeOptions::LEVEL;
        let rest = if prefix.is_empty() {
            format!(" : {}", event.message())
        } else {
            event.compose_formatted_message(prefix)
        };

        let mut stream = self.stream.lock();
        if options.contains(ComposeOptions::LEVEL) {
            let level = event.level();
            let _ = stream.set_color(
                ColorSpec::new()
                    .set_fg(Some(Self::color(level)))
                    .set_bold(level >= Level::Error),
            );
            let _ = write!(stream, "[{}]", level.tag());
            let _ = stream.reset();
        }
        let _ = writeln!(stream, "{rest}");
    }

    fn filter(

        &self,

        level: Level,

        _channel: &str,

        _context: Option<&ContextObject>,

    ) -> FilterStatus {
        if level >= self.min_level {
            FilterStatus::Ok
        } else {
            FilterStatus::CannotLogLevel
        }
    }

    fn flush(&self) {
        let _ = self.stream.lock().flush();
    }
}
