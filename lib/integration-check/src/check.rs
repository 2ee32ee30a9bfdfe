//! The check trait.
use std::time::Duration;

use async_trait::async_trait;

use crate::Result;

/// A check.
///
/// Checks run some arbitrary chunk of logic on a configured interval, producing metrics, service checks, and logs
/// through the sink they were built with. Each call to [`run`][Check::run] is one complete collection pass.
#[async_trait]
pub trait Check: Send + Sync {
    /// Gets the identifier of the check instance.
    fn id(&self) -> &str;

    /// Gets the interval between two passes.
    fn interval(&self) -> Duration;

    /// Runs one collection pass.
    ///
    /// # Errors
    ///
    /// If the pass could not be completed, an error is returned. Anything submitted before the failure stays
    /// submitted.
    async fn run(&self) -> Result<()>;
}
