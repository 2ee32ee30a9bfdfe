//! The MongoDB check and its collection pass.
use std::time::Duration;

use async_trait::async_trait;
use integration_check::{
    check::Check,
    log::Level,
    metric::{Metric, MetricType},
    service_check::{ServiceCheck, ServiceCheckStatus},
    sink::Sink,
    tags::{Tag, TagSet},
    Context as _, GenericError, Mapping,
};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::client::{command, Document, MongoClient, NOT_YET_INITIALIZED, NO_REPLICATION_ENABLED};
use crate::config::{ConfigError, ConnectionTarget, HostAddr, Instance};
use crate::custom_queries::{CustomQuery, RawCustomQuery};
use crate::metrics::{
    extract_metrics, lookup, metric_name, numeric_value, MetricGroup, DB_STATS_METRICS, DB_STATS_SECTION,
    SERVER_STATUS_METRICS,
};

/// Name of the reachability service check.
pub const SERVICE_CHECK_NAME: &str = "mongodb.can_connect";

const ADMIN_DATABASE: &str = "admin";
const LOCAL_DATABASE: &str = "local";
const OPLOG_COLLECTION: &str = "oplog.rs";
const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// A MongoDB check instance.
pub struct MongoCheck<S, C> {
    id: String,
    sink: S,
    client: C,
    target: ConnectionTarget,
    instance_tags: TagSet,
    metric_groups: Vec<MetricGroup>,
    custom_queries: Vec<RawCustomQuery>,
    interval: Duration,
    replica_check: bool,
}

impl<S, C> MongoCheck<S, C>
where
    S: Sink,
    C: MongoClient,
{
    /// Creates a check for the given instance.
    ///
    /// Unknown `additional_metrics` groups are logged and ignored. Custom query definitions are validated on every
    /// pass instead.
    ///
    /// # Errors
    ///
    /// If the instance does not describe a deployment to connect to, an error is returned.
    pub fn new(sink: S, client: C, instance: Instance) -> Result<Self, ConfigError> {
        let target = instance.connection_target()?;

        let metric_groups = instance
            .additional_metrics
            .iter()
            .filter_map(|name| {
                let group = MetricGroup::from_name(name);
                if group.is_none() {
                    warn!(group = %name, "Ignoring unknown additional metrics group.");
                }
                group
            })
            .collect();

        let id = match target.hosts.first() {
            Some(host) => format!("mongo:{}/{}", host, target.database),
            None => format!("mongo:{}", target.database),
        };

        Ok(Self {
            id,
            sink,
            client,
            instance_tags: instance.tags.iter().map(String::as_str).collect(),
            metric_groups,
            custom_queries: instance.custom_queries,
            interval: Duration::from_secs(instance.min_collection_interval),
            replica_check: instance.replica_check,
            target,
        })
    }

    /// Creates a check from a raw instance configuration mapping.
    ///
    /// # Errors
    ///
    /// If the mapping is not a valid instance configuration, an error is returned.
    pub fn from_mapping(sink: S, client: C, instance: Mapping) -> Result<Self, GenericError> {
        let instance = Instance::from_mapping(instance).context("Failed to parse instance configuration.")?;
        Self::new(sink, client, instance).context("Invalid instance configuration.")
    }

    /// Returns the sink the check submits to.
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Returns the resolved connection target.
    pub fn target(&self) -> &ConnectionTarget {
        &self.target
    }

    fn tags_for_database(&self, database: &str) -> TagSet {
        self.instance_tags.clone().with_tag(Tag::from_parts("db", database))
    }

    fn service_check_tags(&self, host: Option<&HostAddr>) -> TagSet {
        let mut tags = self.instance_tags.clone();
        if let Some(host) = host {
            tags.insert_tag(Tag::from_parts("host", &host.host));
            tags.insert_tag(Tag::from_parts("port", host.port));
        }
        tags.insert_tag(Tag::from_parts("db", &self.target.database));
        tags
    }

    async fn submit_all(&self, metrics: Vec<Metric>) {
        for metric in metrics {
            self.sink.submit_metric(metric, false).await;
        }
    }

    async fn check_impl(&self) -> Result<(), GenericError> {
        let reached = match self.client.connect(&self.target).await {
            Ok(reached) => reached,
            Err(e) => {
                let service_check = ServiceCheck::new(SERVICE_CHECK_NAME, ServiceCheckStatus::Critical)
                    .with_tags(self.service_check_tags(self.target.hosts.first()))
                    .with_message(e.to_string());
                self.sink.submit_service_check(service_check).await;
                return Err(e).context("Failed to connect to MongoDB.");
            }
        };
        debug!(check.id = %self.id, host = %reached, "Connected.");

        let service_check = ServiceCheck::new(SERVICE_CHECK_NAME, ServiceCheckStatus::Ok)
            .with_tags(self.service_check_tags(Some(&reached)));
        self.sink.submit_service_check(service_check).await;

        let tags = self.tags_for_database(&self.target.database);

        self.collect_server_status(&tags).await?;
        self.collect_db_stats(&tags).await?;
        if self.replica_check {
            self.collect_replication(&tags).await?;
        }

        for raw in &self.custom_queries {
            if let Err(e) = self.collect_custom_query(raw).await {
                self.sink.log(Level::Error, format!("{:#}", e)).await;
            }
        }

        Ok(())
    }

    async fn collect_server_status(&self, tags: &TagSet) -> Result<(), GenericError> {
        let status = self
            .client
            .run_command(ADMIN_DATABASE, &command("serverStatus", 1))
            .await
            .context("Failed to collect server status.")?;

        let mut metrics = extract_metrics(&status, SERVER_STATUS_METRICS, None, tags);
        for group in &self.metric_groups {
            metrics.extend(extract_metrics(&status, group.definitions(), None, tags));
        }
        self.submit_all(metrics).await;

        // Whether writes are locked is only visible through the in-progress operations.
        match self.client.run_command(ADMIN_DATABASE, &command("currentOp", 1)).await {
            Ok(current_op) => {
                let locked = current_op.get("fsyncLock").and_then(numeric_value).unwrap_or(0.0);
                let name = metric_name(None, "fsyncLocked", MetricType::Gauge);
                self.sink
                    .submit_metric(Metric::new(name, MetricType::Gauge, locked).with_tags(tags.clone()), false)
                    .await;
            }
            Err(e) => debug!(check.id = %self.id, error = %e, "Skipping fsync lock state."),
        }

        Ok(())
    }

    async fn collect_db_stats(&self, tags: &TagSet) -> Result<(), GenericError> {
        let stats = self
            .client
            .run_command(&self.target.database, &command("dbStats", 1))
            .await
            .with_context(|| format!("Failed to collect statistics of database '{}'.", self.target.database))?;

        self.submit_all(extract_metrics(&stats, DB_STATS_METRICS, Some(DB_STATS_SECTION), tags))
            .await;
        Ok(())
    }

    async fn collect_replication(&self, tags: &TagSet) -> Result<(), GenericError> {
        let status = match self
            .client
            .run_command(ADMIN_DATABASE, &command("replSetGetStatus", 1))
            .await
        {
            Ok(status) => status,
            Err(e) => match e.code() {
                Some(NO_REPLICATION_ENABLED | NOT_YET_INITIALIZED) => {
                    debug!(
                        check.id = %self.id,
                        error = %e,
                        "Not part of a replica set, skipping replication metrics."
                    );
                    return Ok(());
                }
                Some(_) => {
                    self.sink
                        .log(
                            Level::Warning,
                            format!("Replica set status unavailable, skipping replication metrics: {}", e),
                        )
                        .await;
                    return Ok(());
                }
                None => return Err(e).context("Failed to collect replica set status."),
            },
        };

        let mut tags = tags.clone();
        if let Some(set_name) = status.get("set").and_then(Value::as_str) {
            tags.insert_tag(Tag::from_parts("replset_name", set_name));
        }

        let own_member = status
            .get("members")
            .and_then(Value::as_array)
            .and_then(|members| {
                members
                    .iter()
                    .filter_map(Value::as_object)
                    .find(|member| member.get("self").and_then(Value::as_bool) == Some(true))
            });
        match own_member {
            Some(member) => {
                let mut metrics = Vec::with_capacity(2);
                for (field, suffix) in [("health", "health"), ("state", "state")] {
                    if let Some(value) = member.get(field).and_then(numeric_value) {
                        let name = format!("mongodb.replset.{}", suffix);
                        metrics.push(Metric::new(name, MetricType::Gauge, value).with_tags(tags.clone()));
                    }
                }
                self.submit_all(metrics).await;
            }
            None => debug!(check.id = %self.id, "Own member missing from replica set status."),
        }

        self.collect_oplog(&tags).await
    }

    async fn collect_oplog(&self, tags: &TagSet) -> Result<(), GenericError> {
        let mut coll_stats = Document::new();
        coll_stats.insert("collStats".to_string(), json!(OPLOG_COLLECTION));
        let stats = self
            .client
            .run_command(LOCAL_DATABASE, &coll_stats)
            .await
            .context("Failed to collect oplog statistics.")?;

        let mut metrics = Vec::with_capacity(3);
        for (field, name) in [("maxSize", "mongodb.oplog.logsizemb"), ("size", "mongodb.oplog.usedsizemb")] {
            if let Some(bytes) = stats.get(field).and_then(numeric_value) {
                metrics.push(Metric::new(name, MetricType::Gauge, bytes / BYTES_PER_MB).with_tags(tags.clone()));
            }
        }

        let first = self.oplog_edge_timestamp(1).await?;
        let last = self.oplog_edge_timestamp(-1).await?;
        match (first, last) {
            (Some(first), Some(last)) => {
                let timediff = Metric::new("mongodb.oplog.timediff", MetricType::Gauge, last - first);
                metrics.push(timediff.with_tags(tags.clone()));
            }
            _ => debug!(check.id = %self.id, "Oplog is empty, skipping oplog time window."),
        }

        self.submit_all(metrics).await;
        Ok(())
    }

    async fn oplog_edge_timestamp(&self, direction: i64) -> Result<Option<f64>, GenericError> {
        let mut find = Document::new();
        find.insert("find".to_string(), json!(OPLOG_COLLECTION));
        find.insert("sort".to_string(), json!({ "$natural": direction }));
        find.insert("limit".to_string(), json!(1));

        let reply = self
            .client
            .run_command(LOCAL_DATABASE, &find)
            .await
            .context("Failed to read the oplog.")?;

        Ok(lookup(&reply, "cursor.firstBatch")
            .and_then(Value::as_array)
            .and_then(|rows| rows.first())
            .and_then(|row| row.get("ts"))
            .and_then(timestamp_seconds))
    }

    async fn collect_custom_query(&self, raw: &RawCustomQuery) -> Result<(), GenericError> {
        let query = CustomQuery::from_raw(raw).context("Invalid custom query.")?;
        let database = query.database(&self.target.database);

        let reply = self
            .client
            .run_command(database, &query.query)
            .await
            .with_context(|| format!("Custom query with metric_prefix '{}' failed.", query.metric_prefix))?;

        let metrics = query.metrics_from_reply(&reply, &self.tags_for_database(database))?;
        if metrics.is_empty() {
            debug!(check.id = %self.id, metric_prefix = %query.metric_prefix, "Custom query returned no rows.");
        }
        self.submit_all(metrics).await;
        Ok(())
    }
}

/// Reads an oplog timestamp, in seconds.
///
/// Timestamps come as extended JSON (`{"$timestamp": {"t": <seconds>, "i": <ordinal>}}`) or as plain numbers.
fn timestamp_seconds(value: &Value) -> Option<f64> {
    match value.get("$timestamp") {
        Some(timestamp) => timestamp.get("t").and_then(numeric_value),
        None => numeric_value(value),
    }
}

#[async_trait]
impl<S, C> Check for MongoCheck<S, C>
where
    S: Sink,
    C: MongoClient,
{
    fn id(&self) -> &str {
        &self.id
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    async fn run(&self) -> Result<(), GenericError> {
        if let Err(e) = self.check_impl().await {
            self.sink.log(Level::Error, format!("{:#}", e)).await;
            return Err(e);
        }
        Ok(())
    }
}
