//! Value-range and tag validation over recorded check output.
use std::collections::HashMap;
use std::fmt;

use snafu::{ensure, OptionExt as _};

use crate::error::{AmbiguousTag, MetricOutOfRange, MissingTag, NoServiceChecks, ServiceCheckGroups};
use crate::{AggregatorStub, AssertionError};

/// Admissible range of a metric value.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum MetricPredicate {
    /// The value must be greater than or equal to the bound.
    AtLeast(f64),

    /// The value must be strictly greater than the bound.
    GreaterThan(f64),
}

impl MetricPredicate {
    /// Returns `true` if the value satisfies the predicate.
    pub fn matches(&self, value: f64) -> bool {
        match self {
            Self::AtLeast(bound) => value >= *bound,
            Self::GreaterThan(bound) => value > *bound,
        }
    }
}

impl fmt::Display for MetricPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AtLeast(bound) => write!(f, ">= {}", bound),
            Self::GreaterThan(bound) => write!(f, "> {}", bound),
        }
    }
}

/// A table of admissible metric ranges.
///
/// The table is a whitelist of checked invariants: a metric whose name is not in the table is always accepted, whatever
/// its value.
#[derive(Clone, Debug, Default)]
pub struct RangeTable {
    predicates: HashMap<String, MetricPredicate>,
}

impl RangeTable {
    /// Returns the predicate for the given metric, if the metric is checked.
    pub fn predicate(&self, name: &str) -> Option<MetricPredicate> {
        self.predicates.get(name).copied()
    }

    /// Returns the number of checked metrics.
    pub fn len(&self) -> usize {
        self.predicates.len()
    }

    /// Returns `true` if no metric is checked.
    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    /// Returns `true` if the value is admissible for the given metric.
    pub fn accepts(&self, name: &str, value: f64) -> bool {
        match self.predicate(name) {
            Some(predicate) => predicate.matches(value),
            None => true,
        }
    }

    fn check_sample(&self, name: &str, value: f64) -> Result<(), AssertionError> {
        match self.predicate(name) {
            Some(predicate) if !predicate.matches(value) => MetricOutOfRange {
                name,
                value,
                predicate,
            }
            .fail(),
            _ => Ok(()),
        }
    }

    /// Range-checks the first sample of every recorded metric present in the table.
    ///
    /// # Errors
    ///
    /// If a checked value is out of range, an error is returned for the first such metric.
    pub fn check_first_samples(&self, aggregator: &AggregatorStub) -> Result<(), AssertionError> {
        for (name, samples) in aggregator.all_metrics() {
            if let Some(first) = samples.first() {
                self.check_sample(&name, first.value)?;
            }
        }
        Ok(())
    }

    /// Range-checks every recorded sample of every metric present in the table.
    ///
    /// # Errors
    ///
    /// If a checked value is out of range, an error is returned for the first such sample.
    pub fn check_every_sample(&self, aggregator: &AggregatorStub) -> Result<(), AssertionError> {
        for (name, samples) in aggregator.all_metrics() {
            for sample in samples {
                self.check_sample(&name, sample.value)?;
            }
        }
        Ok(())
    }
}

impl<N> FromIterator<(N, MetricPredicate)> for RangeTable
where
    N: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (N, MetricPredicate)>>(iter: I) -> Self {
        Self {
            predicates: iter.into_iter().map(|(name, predicate)| (name.into(), predicate)).collect(),
        }
    }
}

/// Tags every service check result of a pass must carry.
///
/// A check may reach the monitored target through any one of several configured endpoints, so several ports are
/// acceptable, but each result must name exactly one of them.
#[derive(Clone, Debug)]
pub struct ServiceCheckTags {
    host: String,
    ports: Vec<u16>,
    db: String,
}

impl ServiceCheckTags {
    /// Creates a new set of expectations.
    pub fn new<H, D>(host: H, ports: impl IntoIterator<Item = u16>, db: D) -> Self
    where
        H: Into<String>,
        D: Into<String>,
    {
        Self {
            host: host.into(),
            ports: ports.into_iter().collect(),
            db: db.into(),
        }
    }

    /// Checks the service checks recorded during one standard pass.
    ///
    /// Exactly one service check must have been recorded, with exactly one result, and that result must carry
    /// `host:<host>`, exactly one `port:<port>` among the acceptable ports, and `db:<db>`.
    ///
    /// # Errors
    ///
    /// If any expectation is not met, an error describing the first failure is returned.
    pub fn check(&self, aggregator: &AggregatorStub) -> Result<(), AssertionError> {
        let groups = aggregator.all_service_checks();
        let (_, results) = groups.iter().next().context(NoServiceChecks)?;

        ensure!(
            groups.len() == 1,
            ServiceCheckGroups {
                what: "distinct service check(s)",
                expected: 1usize,
                actual: groups.len(),
            }
        );
        ensure!(
            results.len() == 1,
            ServiceCheckGroups {
                what: "result(s) in the service check group",
                expected: 1usize,
                actual: results.len(),
            }
        );

        let host_tag = format!("host:{}", self.host);
        let db_tag = format!("db:{}", self.db);
        let port_tags = self.ports.iter().map(|port| format!("port:{}", port)).collect::<Vec<_>>();

        for result in results {
            let tags = || result.tags.iter().map(|tag| tag.to_string()).collect::<Vec<_>>();

            ensure!(
                result.tags.has_tag(&host_tag),
                MissingTag {
                    name: result.name.as_str(),
                    tag: host_tag.as_str(),
                    tags: tags(),
                }
            );

            let ports_present = port_tags.iter().filter(|tag| result.tags.has_tag(tag)).count();
            ensure!(
                ports_present != 0,
                MissingTag {
                    name: result.name.as_str(),
                    tag: format!("one of {}", port_tags.join(", ")),
                    tags: tags(),
                }
            );
            ensure!(
                ports_present == 1,
                AmbiguousTag {
                    name: result.name.as_str(),
                    candidates: port_tags.clone(),
                }
            );

            ensure!(
                result.tags.has_tag(&db_tag),
                MissingTag {
                    name: result.name.as_str(),
                    tag: db_tag.as_str(),
                    tags: tags(),
                }
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use integration_check::{metric::MetricType, service_check::ServiceCheckStatus};
    use proptest::prelude::*;

    use super::*;

    fn table() -> RangeTable {
        [
            ("mongodb.uptime", MetricPredicate::AtLeast(0.0)),
            ("mongodb.mem.resident", MetricPredicate::GreaterThan(0.0)),
            ("mongodb.connections.current", MetricPredicate::AtLeast(1.0)),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn predicates() {
        assert!(MetricPredicate::AtLeast(0.0).matches(0.0));
        assert!(!MetricPredicate::GreaterThan(0.0).matches(0.0));
        assert!(MetricPredicate::GreaterThan(0.0).matches(0.5));
        assert!(!MetricPredicate::AtLeast(1.0).matches(0.99));
        assert_eq!(MetricPredicate::AtLeast(1.0).to_string(), ">= 1");
        assert_eq!(MetricPredicate::GreaterThan(0.0).to_string(), "> 0");
    }

    #[test]
    fn first_sample_per_metric_is_checked() {
        let aggregator = AggregatorStub::new();
        aggregator.record_metric("mongodb.mem.resident", 128.0, MetricType::Gauge, ["db:test"]);
        // Only the first sample is looked at by the lenient variant.
        aggregator.record_metric("mongodb.mem.resident", 0.0, MetricType::Gauge, ["db:test"]);
        aggregator.record_metric("mongodb.uptime", 0.0, MetricType::Gauge, ["db:test"]);

        let table = table();
        table.check_first_samples(&aggregator).expect("first samples are in range");

        let err = table.check_every_sample(&aggregator).unwrap_err();
        assert!(matches!(
            err,
            AssertionError::MetricOutOfRange { ref name, value, .. } if name == "mongodb.mem.resident" && value == 0.0
        ));
    }

    #[test]
    fn out_of_range_first_sample_fails() {
        let aggregator = AggregatorStub::new();
        aggregator.record_metric("mongodb.connections.current", 0.0, MetricType::Gauge, ["db:test"]);

        let err = table().check_first_samples(&aggregator).unwrap_err();
        assert_eq!(err.to_string(), "Value 0 of 'mongodb.connections.current' does not satisfy '>= 1'.");
    }

    fn record_can_connect(aggregator: &AggregatorStub, tags: &[&str]) {
        aggregator.record_service_check("mongodb.can_connect", ServiceCheckStatus::Ok, tags.iter().copied());
    }

    #[test]
    fn service_check_tags_accept_either_port() {
        let expectations = ServiceCheckTags::new("localhost", [27017, 27018], "test");
        for port in ["port:27017", "port:27018"] {
            let aggregator = AggregatorStub::new();
            record_can_connect(&aggregator, &["host:localhost", port, "db:test"]);
            expectations.check(&aggregator).expect("tags are complete");
        }
    }

    #[test]
    fn service_check_tag_failures() {
        let expectations = ServiceCheckTags::new("localhost", [27017, 27018], "test");

        let aggregator = AggregatorStub::new();
        assert!(matches!(expectations.check(&aggregator), Err(AssertionError::NoServiceChecks)));

        record_can_connect(&aggregator, &["host:localhost", "port:27017", "port:27018", "db:test"]);
        assert!(matches!(expectations.check(&aggregator), Err(AssertionError::AmbiguousTag { .. })));

        aggregator.reset();
        record_can_connect(&aggregator, &["host:localhost", "port:27019", "db:test"]);
        assert!(matches!(
            expectations.check(&aggregator),
            Err(AssertionError::MissingTag { ref tag, .. }) if tag.starts_with("one of port:27017")
        ));

        aggregator.reset();
        record_can_connect(&aggregator, &["host:localhost", "port:27017"]);
        assert!(matches!(
            expectations.check(&aggregator),
            Err(AssertionError::MissingTag { ref tag, .. }) if tag == "db:test"
        ));

        aggregator.reset();
        record_can_connect(&aggregator, &["host:localhost", "port:27017", "db:test"]);
        record_can_connect(&aggregator, &["host:localhost", "port:27017", "db:test"]);
        assert!(matches!(
            expectations.check(&aggregator),
            Err(AssertionError::ServiceCheckGroups { actual: 2, .. })
        ));
    }

    proptest! {
        #[test]
        fn predicates_are_pure(value in proptest::num::f64::ANY, bound in -1e6f64..1e6) {
            for predicate in [MetricPredicate::AtLeast(bound), MetricPredicate::GreaterThan(bound)] {
                prop_assert_eq!(predicate.matches(value), predicate.matches(value));
            }
        }

        #[test]
        fn unknown_metrics_are_always_accepted(suffix in "[a-z.]{1,24}", value in proptest::num::f64::ANY) {
            let name = format!("unchecked.{}", suffix);
            prop_assert!(table().accepts(&name, value));

            let aggregator = AggregatorStub::new();
            aggregator.record_metric(name, value, MetricType::Gauge, ["db:test"]);
            prop_assert!(table().check_every_sample(&aggregator).is_ok());
        }
    }
}
