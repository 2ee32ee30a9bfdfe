//! Logging initialization.

use integration_check::GenericError;
use tracing_subscriber::{filter::LevelFilter, EnvFilter};

/// Environment variable holding the default log filter.
pub const LOG_LEVEL_ENV_VAR: &str = "DD_LOG_LEVEL";

/// Builds the log filter.
///
/// An explicit filter wins over `DD_LOG_LEVEL`, which wins over the `info` default.
///
/// # Errors
///
/// If the explicit filter is not a valid filter directive, an error is returned.
pub fn build_filter(explicit: Option<&str>) -> Result<EnvFilter, GenericError> {
    match explicit {
        Some(directives) => Ok(EnvFilter::try_new(directives)?),
        None => Ok(EnvFilter::builder()
            .with_default_directive(LevelFilter::INFO.into())
            .with_env_var(LOG_LEVEL_ENV_VAR)
            .from_env_lossy()),
    }
}

/// Initializes logging to standard error.
///
/// Standard output is reserved for check results.
///
/// # Errors
///
/// If the filter is invalid, or logging was already initialized, an error is returned.
pub fn initialize_logging(explicit: Option<&str>) -> Result<(), GenericError> {
    tracing_subscriber::fmt()
        .with_env_filter(build_filter(explicit)?)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!(e))
}
