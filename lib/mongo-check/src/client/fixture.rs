use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use snafu::{ensure, OptionExt as _};
use tracing::trace;

use super::{AuthenticationFailed, ClientError, Command, Document, MongoClient, NotConnected, Unreachable};
use super::COMMAND_NOT_FOUND;
use crate::config::{ConnectionTarget, HostAddr};

#[derive(Clone, Debug, Deserialize)]
struct User {
    username: String,
    password: String,
}

#[derive(Clone, Debug, Deserialize)]
struct CannedReply {
    database: String,
    command: Document,
    reply: Document,
}

/// A deployment answering commands from canned replies.
///
/// Members listed in `members` are reachable; every other address is not. When `users` is non-empty, connecting with
/// credentials that match none of them fails, as does connecting without credentials. Each command is answered by the
/// first canned reply whose database and command document are equal to the ones issued; a reply carrying `ok: 0` is
/// turned into a command error, and an unanswered command fails with `CommandNotFound`.
///
/// It deserializes from JSON:
///
/// ```json
/// {
///   "members": ["localhost:27017"],
///   "users": [{"username": "datadog", "password": "secret"}],
///   "replies": [
///     {"database": "admin", "command": {"serverStatus": 1}, "reply": {"ok": 1, "uptime": 3600}}
///   ]
/// }
/// ```
#[derive(Debug, Default, Deserialize)]
pub struct StaticDeployment {
    members: Vec<String>,

    #[serde(default)]
    users: Vec<User>,

    #[serde(default)]
    replies: Vec<CannedReply>,

    #[serde(skip)]
    connected: Mutex<Option<HostAddr>>,
}

impl StaticDeployment {
    /// Creates a deployment with the given reachable members and no canned replies.
    pub fn new<I, S>(members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            members: members.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    /// Parses a deployment from its JSON description.
    ///
    /// # Errors
    ///
    /// If the JSON does not describe a deployment, an error is returned.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Requires authentication, accepting the given user.
    ///
    /// This variant is specifically for use in builder-style APIs.
    pub fn with_user<U, P>(mut self, username: U, password: P) -> Self
    where
        U: Into<String>,
        P: Into<String>,
    {
        self.users.push(User {
            username: username.into(),
            password: password.into(),
        });
        self
    }

    /// Adds a canned reply.
    ///
    /// Both `command` and `reply` must be JSON objects; anything else is ignored.
    ///
    /// This variant is specifically for use in builder-style APIs.
    pub fn with_reply<D: Into<String>>(mut self, database: D, command: Value, reply: Value) -> Self {
        if let (Value::Object(command), Value::Object(reply)) = (command, reply) {
            self.replies.push(CannedReply {
                database: database.into(),
                command,
                reply,
            });
        }
        self
    }

    /// Returns the member the client is connected to, if any.
    pub fn connected_member(&self) -> Option<HostAddr> {
        self.connected.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn authenticate(&self, target: &ConnectionTarget) -> Result<(), ClientError> {
        if self.users.is_empty() {
            return Ok(());
        }

        let credentials = target.credentials.as_ref().context(AuthenticationFailed { user: "" })?;
        let accepted = self.users.iter().any(|user| {
            user.username == credentials.username && Some(&user.password) == credentials.password.as_ref()
        });
        ensure!(
            accepted,
            AuthenticationFailed {
                user: credentials.username.as_str(),
            }
        );
        Ok(())
    }
}

#[async_trait]
impl MongoClient for StaticDeployment {
    async fn connect(&self, target: &ConnectionTarget) -> Result<HostAddr, ClientError> {
        let reached = target
            .hosts
            .iter()
            .find(|host| {
                let addr = host.to_string();
                self.members.iter().any(|member| *member == addr)
            })
            .with_context(|| Unreachable {
                hosts: target.hosts.iter().map(ToString::to_string).collect::<Vec<_>>().join(","),
            })?;

        self.authenticate(target)?;

        *self.connected.lock().unwrap_or_else(PoisonError::into_inner) = Some(reached.clone());
        Ok(reached.clone())
    }

    async fn run_command(&self, database: &str, command: &Document) -> Result<Document, ClientError> {
        ensure!(self.connected_member().is_some(), NotConnected);
        trace!(database, command = ?command, "Answering command from canned replies.");

        let canned = self
            .replies
            .iter()
            .find(|canned| canned.database == database && &canned.command == command)
            .with_context(|| Command {
                code: COMMAND_NOT_FOUND,
                message: format!(
                    "no such command: '{}'",
                    command.keys().next().map(String::as_str).unwrap_or_default()
                ),
            })?;

        let failed = canned.reply.get("ok").and_then(Value::as_f64) == Some(0.0);
        ensure!(
            !failed,
            Command {
                code: canned.reply.get("code").and_then(Value::as_i64).unwrap_or_default(),
                message: canned
                    .reply
                    .get("errmsg")
                    .and_then(Value::as_str)
                    .unwrap_or("command failed"),
            }
        );

        Ok(canned.reply.clone())
    }
}
