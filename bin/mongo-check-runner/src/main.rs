//! MongoDB check runner.
//!
//! This binary runs one pass of the MongoDB check against a deployment described by a JSON fixture, and prints every
//! metric and service check it produces to standard output, one JSON object per line.

#![deny(warnings)]
#![deny(missing_docs)]

use std::io;
use std::time::Instant;

use anyhow::Context as _;
use integration_check::{check::Check as _, GenericError};
use mongo_check::{client::StaticDeployment, MongoCheck};
use tracing::{error, info};

mod cli;
mod config;
mod logging;
mod sink;

use self::cli::Cli;
use self::config::load_instance;
use self::logging::initialize_logging;
use self::sink::JsonLinesSink;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), GenericError> {
    let started = Instant::now();
    let cli: Cli = argh::from_env();

    initialize_logging(cli.log_level.as_deref()).context("Failed to initialize logging.")?;

    let instance = load_instance(&cli.config_file)?;

    let fixture = std::fs::read_to_string(&cli.fixture_file)
        .with_context(|| format!("Failed to read deployment fixture '{}'.", cli.fixture_file.display()))?;
    let deployment = StaticDeployment::from_json(&fixture)
        .with_context(|| format!("Failed to parse deployment fixture '{}'.", cli.fixture_file.display()))?;

    let sink = JsonLinesSink::new("mongo", io::stdout());
    let check = MongoCheck::new(sink, deployment, instance).context("Invalid instance configuration.")?;
    info!(check.id = check.id(), interval_secs = check.interval().as_secs(), "Running check.");

    match check.run().await {
        Ok(()) => {
            info!(check.id = check.id(), elapsed_ms = started.elapsed().as_millis(), "Check pass complete.");
            Ok(())
        }
        Err(e) => {
            error!(check.id = check.id(), error = %e, "Check pass failed.");
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::Arc;

    use serde_json::Value;

    use super::*;

    #[tokio::test]
    async fn shipped_fixtures_run_cleanly() {
        let fixtures = Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures");
        let instance = load_instance(fixtures.join("instance.yaml")).expect("valid instance");
        let fixture = std::fs::read_to_string(fixtures.join("deployment.json")).expect("readable fixture");
        let deployment = StaticDeployment::from_json(&fixture).expect("valid fixture");

        let sink = Arc::new(JsonLinesSink::new("mongo", Vec::new()));
        let check = MongoCheck::new(Arc::clone(&sink), deployment, instance).expect("valid instance");
        check.run().await.expect("pass should succeed");
        drop(check);

        let output = Arc::try_unwrap(sink).ok().expect("sink is no longer shared").into_inner();
        let records = String::from_utf8(output)
            .expect("utf-8 output")
            .lines()
            .map(|line| serde_json::from_str::<Value>(line).expect("one JSON object per line"))
            .collect::<Vec<_>>();

        assert_eq!(records[0]["kind"], "service_check");
        assert_eq!(records[0]["status"], 0);

        let values = |name: &str| {
            records
                .iter()
                .filter(|record| record["kind"] == "metric" && record["name"] == name)
                .map(|record| record["value"].as_f64().unwrap_or(f64::NAN))
                .collect::<Vec<_>>()
        };
        assert_eq!(values("dd.custom.mongo.count"), [70.0]);
        assert_eq!(values("dd.custom.mongo.orders.amount"), [200.0, 150.0]);
        assert_eq!(values("mongodb.metrics.commands.find.totalps"), [30.0]);
        assert!(values("mongodb.replset.health").is_empty());
    }
}
