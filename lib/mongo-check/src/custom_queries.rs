//! Custom queries.
//!
//! A custom query runs a `find`, `aggregate`, or `count` command and turns the result into metrics:
//!
//! ```yaml
//! custom_queries:
//!   - metric_prefix: dd.custom.mongo.query_a
//!     query: {find: orders, filter: {amount: {$gt: 25}}, sort: {amount: -1}}
//!     fields:
//!       - {field_name: cluster_id, name: cluster_id, type: tag}
//!       - {field_name: amount, name: amount, type: count}
//!     tags: [tag1:val1]
//!   - metric_prefix: dd.custom.mongo
//!     query: {count: foo, query: {}}
//!     count_type: gauge
//! ```
//!
//! For `find` and `aggregate`, every row of the result yields one sample per metric field, tagged with the tag fields
//! of the same row. For `count`, the single count is submitted as `<metric_prefix>.count`.
use integration_check::{
    metric::{Metric, MetricType},
    tags::{Tag, TagSet},
};
use serde::Deserialize;
use serde_json::Value;
use snafu::{OptionExt as _, Snafu};
use tracing::debug;

use crate::client::Document;
use crate::metrics::{lookup, numeric_value};

/// A custom query definition error, or a reply that does not fit the definition.
#[derive(Debug, Snafu)]
#[snafu(context(suffix(false)))]
pub enum CustomQueryError {
    /// `metric_prefix` is missing or empty.
    #[snafu(display("Custom query field `metric_prefix` is required."))]
    MissingPrefix,

    /// `query` is missing or not a document.
    #[snafu(display("Custom query field `query` is required for metric_prefix `{}`.", prefix))]
    MissingQuery {
        /// Metric prefix of the query.
        prefix: String,
    },

    /// The command is not one of `find`, `count`, or `aggregate`.
    #[snafu(display(
        "Custom query command must be of type find, count or aggregate, got `{}` for metric_prefix `{}`.",
        command,
        prefix
    ))]
    UnsupportedCommand {
        /// Metric prefix of the query.
        prefix: String,
        /// Command found.
        command: String,
    },

    /// The command does not name a collection.
    #[snafu(display("Custom query `{}` must name a collection for metric_prefix `{}`.", command, prefix))]
    MissingCollection {
        /// Metric prefix of the query.
        prefix: String,
        /// Command found.
        command: String,
    },

    /// A `find` or `aggregate` query has no fields.
    #[snafu(display("Custom query field `fields` is required for metric_prefix `{}`.", prefix))]
    MissingFields {
        /// Metric prefix of the query.
        prefix: String,
    },

    /// A `count` query has no `count_type`.
    #[snafu(display("Custom query field `count_type` is required for metric_prefix `{}`.", prefix))]
    MissingCountType {
        /// Metric prefix of the query.
        prefix: String,
    },

    /// A field is incomplete or has an unknown type.
    #[snafu(display("Field `{}` of metric_prefix `{}` is invalid: {}.", field, prefix, reason))]
    InvalidField {
        /// Metric prefix of the query.
        prefix: String,
        /// Field name, or its position when unnamed.
        field: String,
        /// What is wrong with it.
        reason: String,
    },

    /// A `count` reply has no numeric `n`.
    #[snafu(display("Count reply for metric_prefix `{}` has no numeric `n`.", prefix))]
    MissingCountReply {
        /// Metric prefix of the query.
        prefix: String,
    },

    /// A `find` or `aggregate` reply has no `cursor.firstBatch`.
    #[snafu(display("Reply for metric_prefix `{}` has no cursor.", prefix))]
    MissingCursor {
        /// Metric prefix of the query.
        prefix: String,
    },
}

/// A field definition, as configured.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct RawField {
    /// Path of the field in each result row.
    #[serde(default)]
    pub field_name: Option<String>,

    /// Name of the resulting metric suffix or tag.
    #[serde(default)]
    pub name: Option<String>,

    /// `tag`, or the metric type to submit the field as.
    #[serde(default, rename = "type")]
    pub field_type: Option<String>,
}

/// A custom query, as configured.
///
/// Definitions are only validated when a pass runs them, so that one broken query does not prevent the others from
/// being collected.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct RawCustomQuery {
    /// Prefix of every metric the query produces.
    #[serde(default)]
    pub metric_prefix: Option<String>,

    /// Command document to run.
    #[serde(default)]
    pub query: Option<Value>,

    /// Database to run the query against, defaulting to the instance database.
    #[serde(default)]
    pub database: Option<String>,

    /// Fields to read from each result row.
    #[serde(default)]
    pub fields: Option<Vec<RawField>>,

    /// Metric type of the count, for `count` queries.
    #[serde(default)]
    pub count_type: Option<String>,

    /// Tags added to every sample of the query.
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Command of a custom query.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum QueryCommand {
    /// `find`, returning matching documents.
    Find,
    /// `aggregate`, returning the output of a pipeline.
    Aggregate,
    /// `count`, returning a single number.
    Count,
}

impl QueryCommand {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "find" => Some(Self::Find),
            "aggregate" => Some(Self::Aggregate),
            "count" => Some(Self::Count),
            _ => None,
        }
    }
}

/// What a field turns into.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FieldKind {
    /// A tag on the samples of the row.
    Tag,
    /// A metric of the given type.
    Metric(MetricType),
}

/// A validated field definition.
#[derive(Clone, Debug, PartialEq)]
pub struct QueryField {
    /// Path of the field in each result row.
    pub field_name: String,
    /// Metric suffix or tag name.
    pub name: String,
    /// What the field turns into.
    pub kind: FieldKind,
}

/// A validated custom query.
#[derive(Clone, Debug)]
pub struct CustomQuery {
    /// Prefix of every metric the query produces.
    pub metric_prefix: String,
    /// Command of the query.
    pub command: QueryCommand,
    /// Collection the command runs on.
    pub collection: String,
    /// Command document sent to the server.
    pub query: Document,
    /// Database override.
    pub database: Option<String>,
    /// Fields read from each result row; empty for `count`.
    pub fields: Vec<QueryField>,
    /// Metric type of the count, for `count` queries.
    pub count_type: Option<MetricType>,
    /// Tags added to every sample.
    pub tags: TagSet,
}

fn parse_submission_type(raw: &str) -> Option<MetricType> {
    match raw {
        "gauge" => Some(MetricType::Gauge),
        "rate" => Some(MetricType::Rate),
        "count" => Some(MetricType::Count),
        "monotonic_count" => Some(MetricType::MonotonicCount),
        _ => None,
    }
}

fn parse_field(prefix: &str, position: usize, raw: &RawField) -> Result<QueryField, CustomQueryError> {
    let label = raw.field_name.clone().unwrap_or_else(|| format!("#{}", position));
    let invalid = |reason: &'static str| InvalidField {
        prefix,
        field: label.as_str(),
        reason,
    };

    let field_name = raw
        .field_name
        .clone()
        .filter(|name| !name.is_empty())
        .with_context(|| invalid("`field_name` is required"))?;
    let name = raw
        .name
        .clone()
        .filter(|name| !name.is_empty())
        .with_context(|| invalid("`name` is required"))?;
    let field_type = raw.field_type.as_deref().with_context(|| invalid("`type` is required"))?;

    let kind = match field_type {
        "tag" => FieldKind::Tag,
        other => FieldKind::Metric(parse_submission_type(other).with_context(|| {
            invalid("`type` must be one of gauge, rate, count, monotonic_count or tag")
        })?),
    };

    Ok(QueryField { field_name, name, kind })
}

impl CustomQuery {
    /// Validates a configured query.
    ///
    /// # Errors
    ///
    /// If the definition is incomplete or uses an unsupported command or type, an error is returned.
    pub fn from_raw(raw: &RawCustomQuery) -> Result<Self, CustomQueryError> {
        let prefix = raw
            .metric_prefix
            .clone()
            .filter(|prefix| !prefix.is_empty())
            .context(MissingPrefix)?;

        let query = match &raw.query {
            Some(Value::Object(query)) if !query.is_empty() => query.clone(),
            _ => return MissingQuery { prefix }.fail(),
        };

        // Commands are order-sensitive: the first key names the command, and its value the collection.
        let (command_name, collection) = query.iter().next().context(MissingQuery { prefix: prefix.as_str() })?;
        let command = QueryCommand::from_name(command_name).with_context(|| UnsupportedCommand {
            prefix: prefix.as_str(),
            command: command_name.as_str(),
        })?;
        let collection = collection
            .as_str()
            .filter(|collection| !collection.is_empty())
            .with_context(|| MissingCollection {
                prefix: prefix.as_str(),
                command: command_name.as_str(),
            })?
            .to_string();

        let (fields, count_type) = if command == QueryCommand::Count {
            let count_type = raw
                .count_type
                .as_deref()
                .and_then(parse_submission_type)
                .with_context(|| MissingCountType { prefix: prefix.as_str() })?;
            (Vec::new(), Some(count_type))
        } else {
            let raw_fields = raw
                .fields
                .as_ref()
                .filter(|fields| !fields.is_empty())
                .with_context(|| MissingFields { prefix: prefix.as_str() })?;
            let fields = raw_fields
                .iter()
                .enumerate()
                .map(|(position, field)| parse_field(&prefix, position, field))
                .collect::<Result<Vec<_>, _>>()?;
            (fields, None)
        };

        let mut tags: TagSet = raw.tags.iter().map(String::as_str).collect();
        tags.insert_tag(Tag::from_parts("collection", &collection));

        Ok(Self {
            metric_prefix: prefix,
            command,
            collection,
            query,
            database: raw.database.clone(),
            fields,
            count_type,
            tags,
        })
    }

    /// Returns the database the query runs against.
    pub fn database<'a>(&'a self, default: &'a str) -> &'a str {
        self.database.as_deref().unwrap_or(default)
    }

    /// Turns a command reply into metrics.
    ///
    /// Every sample carries `base_tags` and the tags of the query. A row missing a field, or holding a value of the
    /// wrong shape for it, skips that field only.
    ///
    /// # Errors
    ///
    /// If the reply does not have the shape the command produces, an error is returned.
    pub fn metrics_from_reply(&self, reply: &Document, base_tags: &TagSet) -> Result<Vec<Metric>, CustomQueryError> {
        let mut query_tags = base_tags.clone();
        query_tags.merge_missing(&self.tags);

        if let Some(count_type) = self.count_type {
            let count = reply
                .get("n")
                .and_then(numeric_value)
                .with_context(|| MissingCountReply {
                    prefix: self.metric_prefix.as_str(),
                })?;
            let name = format!("{}.count", self.metric_prefix);
            return Ok(vec![Metric::new(name, count_type, count).with_tags(query_tags)]);
        }

        let rows = lookup(reply, "cursor.firstBatch")
            .and_then(Value::as_array)
            .with_context(|| MissingCursor {
                prefix: self.metric_prefix.as_str(),
            })?;

        let mut metrics = Vec::new();
        for row in rows.iter().filter_map(Value::as_object) {
            let mut row_tags = query_tags.clone();
            let mut row_values = Vec::new();

            for field in &self.fields {
                let Some(raw) = lookup(row, &field.field_name) else {
                    debug!(metric_prefix = %self.metric_prefix, field = %field.field_name, "Field missing from row.");
                    continue;
                };

                match field.kind {
                    FieldKind::Tag => match tag_value(raw) {
                        Some(value) => row_tags.insert_tag(Tag::from_parts(&field.name, value)),
                        None => debug!(field = %field.field_name, value = %raw, "Skipping field unusable as tag."),
                    },
                    FieldKind::Metric(metric_type) => match numeric_value(raw) {
                        Some(value) => row_values.push((field, metric_type, value)),
                        None => debug!(field = %field.field_name, value = %raw, "Skipping non-numeric field."),
                    },
                }
            }

            for (field, metric_type, value) in row_values {
                let name = format!("{}.{}", self.metric_prefix, field.name);
                metrics.push(Metric::new(name, metric_type, value).with_tags(row_tags.clone()));
            }
        }

        Ok(metrics)
    }
}

fn tag_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Object(wrapper) => wrapper.get("$oid").and_then(Value::as_str).map(str::to_string),
        _ => None,
    }
}
