//! Severity levels

use crate::ParseLevelError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Severity of a log event, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    /// Developer diagnostics; compiled out of release builds by the macros
    Debug = 0,
    /// Normal operational messages
    Information = 1,
    /// Significant but expected conditions
    Notice = 2,
    /// Something unexpected that the program recovered from
    Warning = 3,
    /// A failed operation
    Error = 4,
    /// A failure affecting a whole subsystem
    Critical = 5,
    /// Needs immediate attention
    Alert = 6,
    /// The program is unusable
    Emergency = 7,
}

impl Level {
    /// Number of levels
    pub const COUNT: usize = 8;

    /// Every level in ascending order
    pub const ALL: [Self; Self::COUNT] = [
        Self::Debug,
        Self::Information,
        Self::Notice,
        Self::Warning,
        Self::Error,
        Self::Critical,
        Self::Alert,
        Self::Emergency,
    ];

    /// Whether this level survives the build configuration.
    ///
    /// `Debug` is only enabled with `debug_assertions` or the
    /// `release-debug-logs` feature. This is a `const fn`, so the per-level
    /// macros compile disabled calls away entirely.
    #[inline(always)]
    #[must_use]
    pub const fn is_enabled_static(self) -> bool {
        match self {
            Self::Debug => cfg!(any(debug_assertions, feature = "release-debug-logs")),
            _ => true,
        }
    }

    /// Three letter tag used in composed messages
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Debug => "DBG",
            Self::Information => "INF",
            Self::Notice => "NTC",
            Self::Warning => "WRN",
            Self::Error => "ERR",
            Self::Critical => "CRT",
            Self::Alert => "ALR",
            Self::Emergency => "EMR",
        }
    }

    /// Full lowercase name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Information => "information",
            Self::Notice => "notice",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Critical => "critical",
            Self::Alert => "alert",
            Self::Emergency => "emergency",
        }
    }

    pub(crate) const fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = ParseLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "debug" | "dbg" | "trace" => Ok(Self::Debug),
            "information" | "info" | "inf" => Ok(Self::Information),
            "notice" | "ntc" => Ok(Self::Notice),
            "warning" | "warn" | "wrn" => Ok(Self::Warning),
            "error" | "err" => Ok(Self::Error),
            "critical" | "crit" | "crt" => Ok(Self::Critical),
            "alert" | "alr" => Ok(Self::Alert),
            "emergency" | "emerg" | "emr" => Ok(Self::Emergency),
            _ => Err(ParseLevelError(s.to_string())),
        }
    }
}
