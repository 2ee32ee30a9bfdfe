//! Building blocks for integration checks.
//!
//! A check performs one collection pass at a time against some monitored system and reports what it observed through a
//! [`Sink`][sink::Sink]: metrics, service checks, and log messages. This crate holds the data model for those outputs
//! and the two traits that sit on either side of a check.
#![deny(warnings)]
#![deny(missing_docs)]

pub mod check;
pub mod log;
pub mod metric;
pub mod service_check;
pub mod sink;
pub mod tags;

pub use anyhow::Context;

/// A generic error.
pub type GenericError = anyhow::Error;

/// Result type used by checks.
pub type Result<T> = anyhow::Result<T>;

/// Raw configuration mapping, as handed to a check.
pub type Mapping = serde_yaml::Mapping;
