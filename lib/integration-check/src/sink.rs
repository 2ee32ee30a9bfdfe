//! Destination for everything a check produces.
use std::sync::Arc;

use async_trait::async_trait;

use crate::log::Level;
use crate::metric::Metric;
use crate::service_check::ServiceCheck;

/// A sink for check output.
///
/// Submissions never fail from the point of view of the check: a sink that cannot forward a submission deals with it
/// on its own.
#[async_trait]
pub trait Sink: Send + Sync {
    /// Submits a metric sample.
    ///
    /// When `flush_first` is set, the backend should flush the first value of a counter-like metric rather than using
    /// it only as a baseline.
    async fn submit_metric(&self, metric: Metric, flush_first: bool);

    /// Submits a service check result.
    async fn submit_service_check(&self, service_check: ServiceCheck);

    /// Emits a log message on behalf of the check.
    async fn log(&self, level: Level, message: String);
}

#[async_trait]
impl<S> Sink for Arc<S>
where
    S: Sink + ?Sized,
{
    async fn submit_metric(&self, metric: Metric, flush_first: bool) {
        (**self).submit_metric(metric, flush_first).await
    }

    async fn submit_service_check(&self, service_check: ServiceCheck) {
        (**self).submit_service_check(service_check).await
    }

    async fn log(&self, level: Level, message: String) {
        (**self).log(level, message).await
    }
}
