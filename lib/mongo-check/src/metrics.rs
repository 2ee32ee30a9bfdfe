//! Server metric definitions.
//!
//! Metrics are read from command replies by document path. The reported name is `mongodb.` followed by the lowercased
//! path (with an optional section prefix), and rate metrics get a `ps` suffix: `opcounters.command` becomes
//! `mongodb.opcounters.commandps`.
use integration_check::{
    metric::{Metric, MetricType},
    tags::TagSet,
};
use serde_json::Value;
use tracing::debug;

use crate::client::Document;

/// Namespace shared by every metric of the check.
pub const METRIC_NAMESPACE: &str = "mongodb";

/// A metric read from a command reply.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MetricDefinition {
    /// Dotted path of the value in the reply.
    pub path: &'static str,
    /// Type the value is submitted as.
    pub metric_type: MetricType,
}

const fn gauge(path: &'static str) -> MetricDefinition {
    MetricDefinition {
        path,
        metric_type: MetricType::Gauge,
    }
}

const fn rate(path: &'static str) -> MetricDefinition {
    MetricDefinition {
        path,
        metric_type: MetricType::Rate,
    }
}

impl MetricDefinition {
    /// Returns the name the metric is reported under.
    pub fn metric_name(&self, section: Option<&str>) -> String {
        metric_name(section, self.path, self.metric_type)
    }
}

/// Builds a reported metric name.
pub fn metric_name(section: Option<&str>, path: &str, metric_type: MetricType) -> String {
    let mut name = String::with_capacity(METRIC_NAMESPACE.len() + path.len() + 16);
    name.push_str(METRIC_NAMESPACE);
    name.push('.');
    if let Some(section) = section {
        name.push_str(section);
        name.push('.');
    }
    name.push_str(&path.to_lowercase());
    if metric_type == MetricType::Rate {
        name.push_str("ps");
    }
    name
}

/// Metrics read from the `serverStatus` reply.
pub static SERVER_STATUS_METRICS: &[MetricDefinition] = &[
    rate("asserts.msg"),
    rate("asserts.regular"),
    rate("asserts.rollovers"),
    rate("asserts.user"),
    rate("asserts.warning"),
    gauge("connections.available"),
    gauge("connections.current"),
    gauge("connections.totalCreated"),
    gauge("globalLock.activeClients.readers"),
    gauge("globalLock.activeClients.total"),
    gauge("globalLock.activeClients.writers"),
    gauge("globalLock.currentQueue.readers"),
    gauge("globalLock.currentQueue.total"),
    gauge("globalLock.currentQueue.writers"),
    gauge("mem.bits"),
    gauge("mem.mapped"),
    gauge("mem.resident"),
    gauge("mem.virtual"),
    rate("metrics.cursor.timedOut"),
    gauge("metrics.cursor.open.noTimeout"),
    gauge("metrics.cursor.open.pinned"),
    gauge("metrics.cursor.open.total"),
    rate("metrics.document.deleted"),
    rate("metrics.document.inserted"),
    rate("metrics.document.returned"),
    rate("metrics.document.updated"),
    rate("metrics.getLastError.wtime.num"),
    rate("metrics.getLastError.wtime.totalMillis"),
    rate("metrics.repl.apply.batches.num"),
    rate("metrics.repl.apply.batches.totalMillis"),
    rate("metrics.repl.apply.ops"),
    rate("metrics.ttl.deletedDocuments"),
    rate("metrics.ttl.passes"),
    rate("network.bytesIn"),
    rate("network.bytesOut"),
    rate("network.numRequests"),
    rate("opcounters.command"),
    rate("opcounters.delete"),
    rate("opcounters.getmore"),
    rate("opcounters.insert"),
    rate("opcounters.query"),
    rate("opcounters.update"),
    rate("opcountersRepl.command"),
    rate("opcountersRepl.delete"),
    rate("opcountersRepl.getmore"),
    rate("opcountersRepl.insert"),
    rate("opcountersRepl.query"),
    rate("opcountersRepl.update"),
    gauge("uptime"),
];

/// Section prefix of the `dbStats` metrics.
pub const DB_STATS_SECTION: &str = "stats";

/// Metrics read from the `dbStats` reply.
pub static DB_STATS_METRICS: &[MetricDefinition] = &[
    gauge("avgObjSize"),
    gauge("collections"),
    gauge("dataSize"),
    gauge("fileSize"),
    gauge("indexSize"),
    gauge("indexes"),
    gauge("numExtents"),
    gauge("objects"),
    gauge("storageSize"),
];

static COMMANDS_METRICS: &[MetricDefinition] = &[
    rate("metrics.commands.aggregate.failed"),
    rate("metrics.commands.aggregate.total"),
    rate("metrics.commands.count.failed"),
    rate("metrics.commands.count.total"),
    rate("metrics.commands.delete.failed"),
    rate("metrics.commands.delete.total"),
    rate("metrics.commands.find.failed"),
    rate("metrics.commands.find.total"),
    rate("metrics.commands.insert.failed"),
    rate("metrics.commands.insert.total"),
    rate("metrics.commands.update.failed"),
    rate("metrics.commands.update.total"),
];

static TCMALLOC_METRICS: &[MetricDefinition] = &[
    gauge("tcmalloc.generic.current_allocated_bytes"),
    gauge("tcmalloc.generic.heap_size"),
    gauge("tcmalloc.tcmalloc.pageheap_free_bytes"),
    gauge("tcmalloc.tcmalloc.pageheap_unmapped_bytes"),
];

/// Optional group of `serverStatus` metrics.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MetricGroup {
    /// Per-command execution counters.
    Commands,
    /// Allocator statistics.
    Tcmalloc,
}

impl MetricGroup {
    /// Looks up a group by its configuration name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "metrics.commands" => Some(Self::Commands),
            "tcmalloc" => Some(Self::Tcmalloc),
            _ => None,
        }
    }

    /// Returns the metrics of the group.
    pub fn definitions(&self) -> &'static [MetricDefinition] {
        match self {
            Self::Commands => COMMANDS_METRICS,
            Self::Tcmalloc => TCMALLOC_METRICS,
        }
    }
}

/// Looks up a value by dotted path.
pub fn lookup<'a>(document: &'a Document, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let mut current = document.get(segments.next()?)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// Interprets a document value as a number.
///
/// Besides plain numbers, booleans count as 0 or 1, and the extended JSON wrappers `$numberInt`, `$numberLong`, and
/// `$numberDouble` are unwrapped.
pub fn numeric_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::Object(wrapper) if wrapper.len() == 1 => {
            let (key, inner) = wrapper.iter().next()?;
            match key.as_str() {
                "$numberInt" | "$numberLong" | "$numberDouble" => inner.as_str()?.parse().ok(),
                _ => None,
            }
        }
        _ => None,
    }
}

/// Reads every defined metric present in the document.
///
/// Paths missing from the document are skipped silently, since which fields a reply carries depends on the server
/// version and storage engine. Values that are present but not numeric are skipped as well.
pub fn extract_metrics(
    document: &Document, definitions: &[MetricDefinition], section: Option<&str>, tags: &TagSet,
) -> Vec<Metric> {
    definitions
        .iter()
        .filter_map(|definition| {
            let raw = lookup(document, definition.path)?;
            let Some(value) = numeric_value(raw) else {
                debug!(path = definition.path, value = %raw, "Skipping non-numeric metric value.");
                return None;
            };
            Some(Metric::new(definition.metric_name(section), definition.metric_type, value).with_tags(tags.clone()))
        })
        .collect()
}
