use integration_check::{metric::MetricType, service_check::ServiceCheckStatus};
use snafu::Snafu;

use crate::validation::MetricPredicate;

/// An assertion failure against recorded check output.
#[derive(Debug, Snafu)]
#[snafu(context(suffix(false)), visibility(pub(crate)))]
pub enum AssertionError {
    /// The number of samples of a metric did not match.
    #[snafu(display(
        "Expected {} sample(s) of '{}' with type {}, found {} (recorded types: {:?}).",
        expected,
        name,
        metric_type,
        actual,
        recorded_types
    ))]
    MetricCount {
        /// Metric name.
        name: String,
        /// Expected type of the samples.
        metric_type: MetricType,
        /// Expected number of samples.
        expected: usize,
        /// Actual number of samples.
        actual: usize,
        /// Types of every sample recorded under the name.
        recorded_types: Vec<MetricType>,
    },

    /// A sample of a metric had another type than expected.
    #[snafu(display("Expected '{}' samples to have type {}, found {}.", name, expected, actual))]
    MetricTypeMismatch {
        /// Metric name.
        name: String,
        /// Expected type.
        expected: MetricType,
        /// Type of the first mismatching sample.
        actual: MetricType,
    },

    /// A metric value did not match.
    ///
    /// For aggregate types, `actual` is the total over all matching samples.
    #[snafu(display("Expected '{}' to have value {}, got {}.", name, expected, actual))]
    MetricValue {
        /// Metric name.
        name: String,
        /// Expected value.
        expected: f64,
        /// Actual value.
        actual: f64,
    },

    /// The number of samples carrying a tag did not match.
    #[snafu(display(
        "Expected {} sample(s) of '{}' tagged '{}', found {}.",
        expected,
        name,
        tag,
        actual
    ))]
    MetricTagCount {
        /// Metric name.
        name: String,
        /// Tag searched for.
        tag: String,
        /// Expected number of samples.
        expected: usize,
        /// Actual number of samples.
        actual: usize,
    },

    /// The number of service check results with a status did not match.
    #[snafu(display(
        "Expected {} '{}' result(s) with status {}, found {}.",
        expected,
        name,
        status,
        actual
    ))]
    ServiceCheckCount {
        /// Service check name.
        name: String,
        /// Status the results were filtered on.
        status: ServiceCheckStatus,
        /// Expected number of results.
        expected: usize,
        /// Actual number of results.
        actual: usize,
    },

    /// A metric value fell outside of its admissible range.
    #[snafu(display("Value {} of '{}' does not satisfy '{}'.", value, name, predicate))]
    MetricOutOfRange {
        /// Metric name.
        name: String,
        /// Offending value.
        value: f64,
        /// Predicate the value failed.
        predicate: MetricPredicate,
    },

    /// A service check result was missing a required tag.
    #[snafu(display("Service check '{}' is missing tag '{}' (tags: {:?}).", name, tag, tags))]
    MissingTag {
        /// Service check name.
        name: String,
        /// Missing tag, or a description of the acceptable alternatives.
        tag: String,
        /// Tags the result actually carried.
        tags: Vec<String>,
    },

    /// A service check result carried more than one of a set of mutually exclusive tags.
    #[snafu(display("Service check '{}' carries more than one of {:?}.", name, candidates))]
    AmbiguousTag {
        /// Service check name.
        name: String,
        /// Acceptable tags, of which exactly one was expected.
        candidates: Vec<String>,
    },

    /// No service checks were recorded at all.
    #[snafu(display("No service checks were recorded."))]
    NoServiceChecks,

    /// The number of distinct service checks, or results within one, did not match.
    #[snafu(display("Expected {} {}, found {}.", expected, what, actual))]
    ServiceCheckGroups {
        /// What was counted.
        what: &'static str,
        /// Expected count.
        expected: usize,
        /// Actual count.
        actual: usize,
    },
}
