//! Service checks.
use std::fmt;

use serde::{Serialize, Serializer};
use snafu::Snafu;

use crate::tags::TagSet;

/// Service status.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ServiceCheckStatus {
    /// The service is operating normally.
    Ok,

    /// The service is in a warning state.
    Warning,

    /// The service is in a critical state.
    Critical,

    /// The service is in an unknown state.
    Unknown,
}

impl ServiceCheckStatus {
    /// Converts the status to its numeric representation.
    pub const fn as_u8(&self) -> u8 {
        match self {
            Self::Ok => 0,
            Self::Warning => 1,
            Self::Critical => 2,
            Self::Unknown => 3,
        }
    }
}

impl fmt::Display for ServiceCheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Ok => "OK",
            Self::Warning => "WARNING",
            Self::Critical => "CRITICAL",
            Self::Unknown => "UNKNOWN",
        };
        f.write_str(name)
    }
}

impl Serialize for ServiceCheckStatus {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u8(self.as_u8())
    }
}

/// Error type for parsing a service check status.
#[derive(Debug, Snafu)]
#[snafu(display("invalid service check status: {}", value))]
pub struct InvalidStatus {
    value: u8,
}

impl TryFrom<u8> for ServiceCheckStatus {
    type Error = InvalidStatus;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Ok),
            1 => Ok(Self::Warning),
            2 => Ok(Self::Critical),
            3 => Ok(Self::Unknown),
            _ => Err(InvalidStatus { value }),
        }
    }
}

/// A service check.
///
/// Service checks represent the health of a monitored endpoint at the time of a collection pass.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ServiceCheck {
    /// Name of the check, such as `mongodb.can_connect`.
    #[serde(rename = "check")]
    pub name: String,

    /// Reported status.
    pub status: ServiceCheckStatus,

    /// Tags identifying the endpoint.
    pub tags: TagSet,

    /// Human-readable detail, usually only set when the status is not OK.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ServiceCheck {
    /// Creates a `ServiceCheck` from the given name and status.
    pub fn new<N>(name: N, status: ServiceCheckStatus) -> Self
    where
        N: Into<String>,
    {
        Self {
            name: name.into(),
            status,
            tags: TagSet::default(),
            message: None,
        }
    }

    /// Sets the tags of the service check.
    ///
    /// This variant is specifically for use in builder-style APIs.
    pub fn with_tags(mut self, tags: TagSet) -> Self {
        self.tags = tags;
        self
    }

    /// Sets the message of the service check.
    ///
    /// This variant is specifically for use in builder-style APIs.
    pub fn with_message(mut self, message: impl Into<Option<String>>) -> Self {
        self.message = message.into();
        self
    }
}
