//! MongoDB integration check.
//!
//! [`MongoCheck`] performs one collection pass against a MongoDB deployment: it reports whether the deployment is
//! reachable as the `mongodb.can_connect` service check, collects server, database, and replica set metrics, and runs
//! the user-defined custom queries of the instance, turning their result documents into metrics.
//!
//! The check talks to the deployment through the [`MongoClient`][client::MongoClient] trait. The crate ships
//! [`StaticDeployment`][client::StaticDeployment], a client answering commands from canned replies.
#![deny(warnings)]
#![deny(missing_docs)]

pub mod check;
pub mod client;
pub mod config;
pub mod custom_queries;
pub mod metrics;

pub use self::check::MongoCheck;
