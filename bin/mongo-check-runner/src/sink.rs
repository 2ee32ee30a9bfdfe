//! JSON lines output.

use std::io::Write;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use integration_check::{
    log::{forward_to_tracing, Level},
    metric::Metric,
    service_check::ServiceCheck,
    sink::Sink,
};
use serde::Serialize;
use tracing::warn;

#[derive(Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum Record<'a> {
    Metric(&'a Metric),
    ServiceCheck(&'a ServiceCheck),
}

/// A sink writing every metric and service check as one JSON object per line.
///
/// Log messages are not written out: they go to `tracing` instead, so that the output stays machine-readable.
pub struct JsonLinesSink<W> {
    source: String,
    writer: Mutex<W>,
}

impl<W: Write + Send> JsonLinesSink<W> {
    /// Creates a sink writing to `writer`, logging on behalf of `source`.
    pub fn new<S: Into<String>>(source: S, writer: W) -> Self {
        Self {
            source: source.into(),
            writer: Mutex::new(writer),
        }
    }

    /// Consumes the sink, returning its writer.
    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.writer.into_inner().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_record(&self, record: Record<'_>) {
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let result = serde_json::to_writer(&mut *writer, &record)
            .map_err(std::io::Error::from)
            .and_then(|()| writer.write_all(b"\n"))
            .and_then(|()| writer.flush());
        if let Err(e) = result {
            warn!(error = %e, "Failed to write check output.");
        }
    }
}

#[async_trait]
impl<W: Write + Send> Sink for JsonLinesSink<W> {
    async fn submit_metric(&self, metric: Metric, _flush_first: bool) {
        self.write_record(Record::Metric(&metric));
    }

    async fn submit_service_check(&self, service_check: ServiceCheck) {
        self.write_record(Record::ServiceCheck(&service_check));
    }

    async fn log(&self, level: Level, message: String) {
        forward_to_tracing(&self.source, level, &message);
    }
}
