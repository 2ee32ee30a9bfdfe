//! Log levels for messages emitted by checks.
use std::fmt;

/// Severity of a check log message.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub enum Level {
    /// Unrecoverable problem with the check itself.
    Critical,
    /// The pass could not complete.
    Error,
    /// Something was skipped or degraded.
    Warning,
    /// Normal operation.
    Info,
    /// Detail useful when diagnosing a check.
    Debug,
    /// Very verbose detail.
    Trace,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Critical => "critical",
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        };
        f.write_str(name)
    }
}

/// Forwards a check log message to `tracing` at the matching level.
pub fn forward_to_tracing(check_id: &str, level: Level, message: &str) {
    match level {
        Level::Critical | Level::Error => tracing::error!(check.id = check_id, "{message}"),
        Level::Warning => tracing::warn!(check.id = check_id, "{message}"),
        Level::Info => tracing::info!(check.id = check_id, "{message}"),
        Level::Debug => tracing::debug!(check.id = check_id, "{message}"),
        Level::Trace => tracing::trace!(check.id = check_id, "{message}"),
    }
}
