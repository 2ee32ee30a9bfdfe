//! Test helpers for integration checks.
//!
//! [`AggregatorStub`] is an in-memory [`Sink`][integration_check::sink::Sink] that records everything a check submits
//! during a pass, so that tests can make exact assertions on it afterwards. The [`validation`] module builds on top of
//! it with value-range tables and service check tag expectations.
#![deny(warnings)]
#![deny(missing_docs)]

mod aggregator;
pub use self::aggregator::AggregatorStub;

mod error;
pub use self::error::AssertionError;

pub mod validation;
