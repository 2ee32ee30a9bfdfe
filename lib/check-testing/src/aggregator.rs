use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use integration_check::{
    log::{forward_to_tracing, Level},
    metric::{Metric, MetricType},
    service_check::{ServiceCheck, ServiceCheckStatus},
    sink::Sink,
    tags::{Tag, TagSet},
};
use snafu::ensure;

use crate::error::{AssertionError, MetricCount, MetricTagCount, MetricTypeMismatch, MetricValue, ServiceCheckCount};

#[derive(Default)]
struct Recorded {
    metrics: BTreeMap<String, Vec<Metric>>,
    service_checks: BTreeMap<String, Vec<ServiceCheck>>,
    logs: Vec<(Level, String)>,
}

/// An in-memory sink that records check output for later assertions.
///
/// Every submission is appended, in order, to the sequence kept for its name; nothing is merged or deduplicated, so a
/// check that emits the same sample twice is visible as two samples. Assertions are count-exact.
///
/// The stub is meant to observe one pass at a time: call [`reset`][Self::reset] between independent passes.
#[derive(Default)]
pub struct AggregatorStub {
    recorded: Mutex<Recorded>,
}

impl AggregatorStub {
    /// Creates an empty aggregator.
    pub fn new() -> Self {
        Self::default()
    }

    fn recorded(&self) -> MutexGuard<'_, Recorded> {
        // A panic while the lock was held happened in a test assertion, and the recorded data is still coherent.
        self.recorded.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Records a metric sample.
    pub fn record_metric<N, I>(&self, name: N, value: f64, metric_type: MetricType, tags: I)
    where
        N: Into<String>,
        I: IntoIterator,
        I::Item: Into<Tag>,
    {
        let metric = Metric::new(name, metric_type, value).with_tags(tags.into_iter().collect());
        self.push_metric(metric);
    }

    /// Records a service check result.
    pub fn record_service_check<N, I>(&self, name: N, status: ServiceCheckStatus, tags: I)
    where
        N: Into<String>,
        I: IntoIterator,
        I::Item: Into<Tag>,
    {
        let service_check = ServiceCheck::new(name, status).with_tags(tags.into_iter().collect());
        self.push_service_check(service_check);
    }

    fn push_metric(&self, metric: Metric) {
        self.recorded()
            .metrics
            .entry(metric.name.clone())
            .or_default()
            .push(metric);
    }

    fn push_service_check(&self, service_check: ServiceCheck) {
        self.recorded()
            .service_checks
            .entry(service_check.name.clone())
            .or_default()
            .push(service_check);
    }

    /// Returns every recorded metric sample, grouped by name.
    ///
    /// Names are ordered lexicographically; samples keep their submission order.
    pub fn all_metrics(&self) -> BTreeMap<String, Vec<Metric>> {
        self.recorded().metrics.clone()
    }

    /// Returns the samples recorded under the given name.
    pub fn metrics(&self, name: &str) -> Vec<Metric> {
        self.recorded().metrics.get(name).cloned().unwrap_or_default()
    }

    /// Returns every recorded service check result, grouped by name.
    pub fn all_service_checks(&self) -> BTreeMap<String, Vec<ServiceCheck>> {
        self.recorded().service_checks.clone()
    }

    /// Returns the service check results recorded under the given name.
    pub fn service_checks(&self, name: &str) -> Vec<ServiceCheck> {
        self.recorded().service_checks.get(name).cloned().unwrap_or_default()
    }

    /// Returns the log messages emitted through the sink.
    pub fn logs(&self) -> Vec<(Level, String)> {
        self.recorded().logs.clone()
    }

    /// Returns `true` if no metric and no service check has been recorded.
    pub fn is_empty(&self) -> bool {
        let recorded = self.recorded();
        recorded.metrics.is_empty() && recorded.service_checks.is_empty()
    }

    /// Clears everything recorded so far.
    pub fn reset(&self) {
        *self.recorded() = Recorded::default();
    }

    /// Checks the samples of a metric.
    ///
    /// Every sample recorded under `name` counts: there must be exactly `count` of them, and each must be of
    /// `metric_type`. Their values are then compared with `value`: one by one for instantaneous types, or as a total
    /// for aggregate types (see [`MetricType::is_aggregate`]), since a fanned-out count is only meaningful as a whole.
    ///
    /// # Errors
    ///
    /// If the count, a sample's type, or the value does not match, an error describing the mismatch is returned.
    pub fn check_metric(
        &self, name: &str, value: f64, count: usize, metric_type: MetricType,
    ) -> Result<(), AssertionError> {
        let samples = self.metrics(name);
        let recorded_types = samples.iter().map(|metric| metric.metric_type).collect::<Vec<_>>();

        ensure!(
            samples.len() == count,
            MetricCount {
                name,
                metric_type,
                expected: count,
                actual: samples.len(),
                recorded_types,
            }
        );

        if let Some(mismatch) = samples.iter().find(|metric| metric.metric_type != metric_type) {
            return MetricTypeMismatch {
                name,
                expected: metric_type,
                actual: mismatch.metric_type,
            }
            .fail();
        }

        if metric_type.is_aggregate() {
            let total = samples.iter().map(|metric| metric.value).sum::<f64>();
            ensure!(
                total == value,
                MetricValue {
                    name,
                    expected: value,
                    actual: total,
                }
            );
        } else if let Some(mismatch) = samples.iter().find(|metric| metric.value != value) {
            return MetricValue {
                name,
                expected: value,
                actual: mismatch.value,
            }
            .fail();
        }

        Ok(())
    }

    /// Asserts the samples of a metric, panicking on mismatch.
    ///
    /// See [`check_metric`][Self::check_metric] for the exact semantics.
    #[track_caller]
    pub fn assert_metric(&self, name: &str, value: f64, count: usize, metric_type: MetricType) {
        if let Err(e) = self.check_metric(name, value, count, metric_type) {
            panic!("{}", e);
        }
    }

    /// Checks how many samples of a metric carry the given tag.
    ///
    /// # Errors
    ///
    /// If the number of tagged samples is not exactly `count`, an error is returned.
    pub fn check_metric_has_tag(&self, name: &str, tag: &str, count: usize) -> Result<(), AssertionError> {
        let actual = self
            .recorded()
            .metrics
            .get(name)
            .map(|samples| samples.iter().filter(|metric| metric.tags.has_tag(tag)).count())
            .unwrap_or(0);

        ensure!(
            actual == count,
            MetricTagCount {
                name,
                tag,
                expected: count,
                actual,
            }
        );
        Ok(())
    }

    /// Asserts how many samples of a metric carry the given tag, panicking on mismatch.
    #[track_caller]
    pub fn assert_metric_has_tag(&self, name: &str, tag: &str, count: usize) {
        if let Err(e) = self.check_metric_has_tag(name, tag, count) {
            panic!("{}", e);
        }
    }

    /// Checks how many results of a service check have the given status.
    ///
    /// # Errors
    ///
    /// If the number of results is not exactly `count`, an error is returned.
    pub fn check_service_check(
        &self, name: &str, status: ServiceCheckStatus, count: usize,
    ) -> Result<(), AssertionError> {
        let actual = self
            .recorded()
            .service_checks
            .get(name)
            .map(|results| results.iter().filter(|sc| sc.status == status).count())
            .unwrap_or(0);

        ensure!(
            actual == count,
            ServiceCheckCount {
                name,
                status,
                expected: count,
                actual,
            }
        );
        Ok(())
    }

    /// Asserts how many results of a service check have the given status, panicking on mismatch.
    #[track_caller]
    pub fn assert_service_check(&self, name: &str, status: ServiceCheckStatus, count: usize) {
        if let Err(e) = self.check_service_check(name, status, count) {
            panic!("{}", e);
        }
    }

    /// Returns the tags of every sample of a metric.
    pub fn metric_tags(&self, name: &str) -> Vec<TagSet> {
        self.metrics(name).into_iter().map(|metric| metric.tags).collect()
    }
}

#[async_trait]
impl Sink for AggregatorStub {
    async fn submit_metric(&self, metric: Metric, _flush_first: bool) {
        self.push_metric(metric);
    }

    async fn submit_service_check(&self, service_check: ServiceCheck) {
        self.push_service_check(service_check);
    }

    async fn log(&self, level: Level, message: String) {
        forward_to_tracing("aggregator_stub", level, &message);
        self.recorded().logs.push((level, message));
    }
}
