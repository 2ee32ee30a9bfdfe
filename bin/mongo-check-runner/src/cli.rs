//! CLI parsing for the mongo-check-runner binary.

use std::path::PathBuf;

use argh::FromArgs;

/// Runs one pass of the MongoDB check and prints its results as JSON lines.
#[derive(FromArgs, Debug)]
#[argh(
    description = "Runs one pass of the MongoDB check and prints its results as JSON lines.",
    help_triggers("-h", "--help", "help")
)]
pub struct Cli {
    /// path to the instance configuration file
    #[argh(option, short = 'c', long = "config")]
    pub config_file: PathBuf,

    /// path to the JSON description of the deployment to run against
    #[argh(option, short = 'f', long = "fixture")]
    pub fixture_file: PathBuf,

    /// log level filter, overriding `DD_LOG_LEVEL`
    #[argh(option, long = "log-level")]
    pub log_level: Option<String>,
}
