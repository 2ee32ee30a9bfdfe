//! Instance configuration loading.

use std::path::Path;

use anyhow::Context as _;
use figment::{
    providers::{Env, Format as _, Yaml},
    Figment, Provider,
};
use integration_check::GenericError;
use mongo_check::{config::Instance, custom_queries::RawCustomQuery};
use serde::Deserialize;
use tracing::warn;

/// Prefix of the environment variables overriding instance settings, such as `DD_MONGO_PASSWORD`.
pub const ENV_VAR_PREFIX: &str = "DD_MONGO_";

const CUSTOM_QUERIES_KEY: &str = "custom_queries";

#[derive(Default, Deserialize)]
struct OrderedQueries {
    #[serde(default)]
    custom_queries: Vec<RawCustomQuery>,
}

/// Loads the instance configuration from the given YAML file, overlaid with `DD_MONGO_`-prefixed environment
/// variables.
///
/// Custom queries are only read from the file: `DD_MONGO_CUSTOM_QUERIES` is ignored, with a warning.
///
/// # Errors
///
/// If the file cannot be read, or the merged configuration is not a valid instance, an error is returned.
pub fn load_instance<P: AsRef<Path>>(path: P) -> Result<Instance, GenericError> {
    load_instance_with(path, Env::prefixed(ENV_VAR_PREFIX))
}

fn load_instance_with<P, O>(path: P, overrides: O) -> Result<Instance, GenericError>
where
    P: AsRef<Path>,
    O: Provider,
{
    let path = path.as_ref();
    // `Yaml::file` treats a missing file as empty, which would only surface later as a missing server error.
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read instance configuration file '{}'.", path.display()))?;

    let overrides = Figment::from(overrides);
    if queries_overridden(&overrides) {
        warn!(
            path = %path.display(),
            "Ignoring custom queries override, custom queries are only read from the configuration file."
        );
    }

    let mut instance: Instance = Figment::from(Yaml::file(path))
        .merge(overrides)
        .extract()
        .with_context(|| format!("Failed to load instance configuration from '{}'.", path.display()))?;

    // Merged dictionaries are sorted by key, and the first key of a query document names its command.
    let ordered: OrderedQueries = serde_yaml::from_str(&raw)
        .with_context(|| format!("Failed to read custom queries from '{}'.", path.display()))?;
    instance.custom_queries = ordered.custom_queries;

    Ok(instance)
}

fn queries_overridden(overrides: &Figment) -> bool {
    overrides.contains(CUSTOM_QUERIES_KEY)
}
