//! Option sets for logging and message composition

use bitflags::bitflags;

bitflags! {
    /// Per-call options passed to [`LoggingService::log`](crate::LoggingService::log).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct LogOptions: u8 {
        /// Re-evaluate every sink's filter for this call instead of using
        /// the cached decision, and store the fresh decision.
        const IGNORE_FILTER_CACHE = 1 << 0;
    }
}

bitflags! {
    /// Pieces included by
    /// [`LogEvent::compose_formatted_message`](crate::LogEvent::compose_formatted_message).
    ///
    /// An empty set selects [`ComposeOptions::DEFAULT`]. At most one
    /// timestamp is rendered; since-start wins over local, local over UTC.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ComposeOptions: u16 {
        /// Level tag
        const LEVEL = 1 << 0;
        /// Wall-clock time in UTC
        const TIMESTAMP_UTC = 1 << 1;
        /// Wall-clock time in the local time zone
        const TIMESTAMP_LOCAL = 1 << 2;
        /// Time elapsed since the service started
        const TIMESTAMP_SINCE_START = 1 << 3;
        /// Calling thread id
        const THREAD_ID = 1 << 4;
        /// Calling thread name
        const THREAD_NAME = 1 << 5;
        /// Channel
        const CHANNEL = 1 << 6;
        /// `file:line function` location
        const FILE_FUNCTION_LINE = 1 << 7;

        /// Layout used when no option is given
        const DEFAULT = Self::LEVEL.bits()
            | Self::TIMESTAMP_SINCE_START.bits()
            | Self::THREAD_NAME.bits()
            | Self::CHANNEL.bits()
            | Self::FILE_FUNCTION_LINE.bits();
    }
}

impl ComposeOptions {
    /// Resolves an empty set to the default layout.
    #[must_use]
    pub const fn effective(self) -> Self {
        if self.is_empty() { Self::DEFAULT } else { self }
    }
}

impl Default for ComposeOptions {
    fn default() -> Self {
        Self::DEFAULT
    }
}
