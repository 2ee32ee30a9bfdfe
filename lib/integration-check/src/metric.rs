//! Metrics.
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::tags::TagSet;

/// Metric type.
///
/// The type determines how the monitoring backend interprets successive values of the same metric.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricType {
    /// The latest value of a quantity at a point in time.
    Gauge,

    /// A per-second rate, derived by the backend from successive raw values.
    Rate,

    /// A total over the collection interval.
    Count,

    /// A monotonically increasing counter, reported as the delta between submissions.
    MonotonicCount,

    /// A counter incremented by each submission.
    Counter,

    /// A distribution of values.
    Histogram,

    /// A distribution of per-second rates.
    Historate,
}

impl MetricType {
    /// Returns the lowercase name of the type.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Gauge => "gauge",
            Self::Rate => "rate",
            Self::Count => "count",
            Self::MonotonicCount => "monotonic_count",
            Self::Counter => "counter",
            Self::Histogram => "histogram",
            Self::Historate => "historate",
        }
    }

    /// Returns `true` if values of this type are totalled over the collection interval.
    ///
    /// Several samples of an aggregate type describe one quantity together, so they are compared by their sum rather
    /// than one by one.
    pub const fn is_aggregate(&self) -> bool {
        matches!(self, Self::Count | Self::MonotonicCount)
    }
}

impl fmt::Display for MetricType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A metric sample.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Metric {
    /// Metric name, such as `mongodb.connections.current`.
    pub name: String,

    /// Metric type.
    #[serde(rename = "type")]
    pub metric_type: MetricType,

    /// Observed value.
    pub value: f64,

    /// Tags attached to the sample.
    pub tags: TagSet,
}

impl Metric {
    /// Creates a new metric sample with no tags.
    pub fn new<N>(name: N, metric_type: MetricType, value: f64) -> Self
    where
        N: Into<String>,
    {
        Self {
            name: name.into(),
            metric_type,
            value,
            tags: TagSet::default(),
        }
    }

    /// Sets the tags of the sample.
    ///
    /// This variant is specifically for use in builder-style APIs.
    pub fn with_tags(mut self, tags: TagSet) -> Self {
        self.tags = tags;
        self
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}[{} {}]", self.name, self.tags, self.metric_type, self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggregate_types() {
        assert!(MetricType::Count.is_aggregate());
        assert!(MetricType::MonotonicCount.is_aggregate());
        assert!(!MetricType::Gauge.is_aggregate());
        assert!(!MetricType::Rate.is_aggregate());
        assert!(!MetricType::Counter.is_aggregate());
    }

    #[test]
    fn type_names_round_trip_through_serde() {
        let ty: MetricType = serde_json::from_str(r#""monotonic_count""#).expect("type should parse");
        assert_eq!(ty, MetricType::MonotonicCount);
        assert_eq!(ty.to_string(), "monotonic_count");
        assert!(serde_json::from_str::<MetricType>(r#""tag""#).is_err());
    }

    #[test]
    fn display() {
        let metric = Metric::new("mongodb.uptime", MetricType::Gauge, 42.0)
            .with_tags(["db:test"].into_iter().collect());
        assert_eq!(metric.to_string(), "mongodb.uptime[db:test][gauge 42]");
    }
}
