//! Client seam towards a MongoDB deployment.
use async_trait::async_trait;
use serde_json::Value;
use snafu::Snafu;

use crate::config::{ConnectionTarget, HostAddr};

mod fixture;
pub use self::fixture::StaticDeployment;

/// A command or reply document.
///
/// Key order is preserved: the first key of a command names the command.
pub type Document = serde_json::Map<String, Value>;

/// Server error code reported when replication is not enabled.
pub const NO_REPLICATION_ENABLED: i64 = 76;

/// Server error code reported when the replica set is not initialized yet.
pub const NOT_YET_INITIALIZED: i64 = 94;

/// Server error code reported for unknown commands.
pub const COMMAND_NOT_FOUND: i64 = 59;

/// A client error.
#[derive(Debug, Snafu)]
#[snafu(context(suffix(false)), visibility(pub(crate)))]
pub enum ClientError {
    /// None of the configured members could be reached.
    #[snafu(display("Unable to reach any of {}.", hosts))]
    Unreachable {
        /// Configured members, comma-separated.
        hosts: String,
    },

    /// The deployment rejected the credentials.
    #[snafu(display("Authentication failed for user '{}'.", user))]
    AuthenticationFailed {
        /// Username that was rejected.
        user: String,
    },

    /// A command failed on the server.
    #[snafu(display("Command failed with code {}: {}", code, message))]
    Command {
        /// Server error code.
        code: i64,
        /// Server error message.
        message: String,
    },

    /// A command was issued before connecting.
    #[snafu(display("Client is not connected."))]
    NotConnected,
}

impl ClientError {
    /// Returns the server error code, if the error came from a failed command.
    pub fn code(&self) -> Option<i64> {
        match self {
            Self::Command { code, .. } => Some(*code),
            _ => None,
        }
    }
}

/// A connection to a MongoDB deployment.
#[async_trait]
pub trait MongoClient: Send + Sync {
    /// Connects to the first reachable member of the target, authenticating if credentials are configured.
    ///
    /// Returns the member that was reached.
    ///
    /// # Errors
    ///
    /// If no member is reachable, or authentication fails, an error is returned.
    async fn connect(&self, target: &ConnectionTarget) -> Result<HostAddr, ClientError>;

    /// Runs a database command and returns its reply.
    ///
    /// # Errors
    ///
    /// If the command fails, including a reply with `ok: 0`, an error is returned.
    async fn run_command(&self, database: &str, command: &Document) -> Result<Document, ClientError>;
}

/// Builds a single-key command document.
pub fn command<V: Into<Value>>(name: &str, value: V) -> Document {
    let mut document = Document::new();
    document.insert(name.to_string(), value.into());
    document
}
