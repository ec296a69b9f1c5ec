//! # Replicant
//!
//! Read-path fan-out and merge for a sharded, replicated time-series store.
//!
//! Series are spread over ingesters by a hash of the tenant and either the
//! metric name or the full label set, and every shard is held by several
//! replicas. A read:
//!
//! - derives the shard key when the metric name is pinned, otherwise
//!   targets every ingester
//! - queries the chosen replicas in parallel, tolerating failures up to the
//!   replica set's error budget
//! - merges the replicas' overlapping results into one answer per series
//!
//! ## Layout
//!
//! - **model**: labels, matchers, requests and the two response shapes
//! - **hash**: shard keys and fingerprints
//! - **ring**: replica membership and the quorum executor
//! - **client**: ingester clients and the client pool
//! - **distributor**: the `query` and `query_stream` entry points
//! - **cluster**: an in-process cluster for tools and tests

pub mod client;
pub mod cluster;
pub mod config;
pub mod context;
pub mod distributor;
pub mod hash;
pub mod model;
pub mod ring;
pub mod telemetry;

mod error;

pub use error::{Error, Result};

pub use config::DistributorConfig;
pub use context::RequestContext;
pub use distributor::Distributor;
