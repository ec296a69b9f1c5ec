//! Replica membership
//!
//! The distributor only needs two lookups from the membership service: the
//! replicas owning a shard key, and every replica. [`ReadRing`] is that
//! port; [`StaticRing`] is an in-process token ring implementing it.

mod replication_set;
mod static_ring;

pub use replication_set::ReplicationSet;
pub use static_ring::{RingConfig, StaticRing};

use crate::Result;
use serde::{Deserialize, Serialize};

/// Lifecycle state of an ingester
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngesterState {
    /// Serving reads and writes
    Active,
    /// Handing off its series; still readable
    Leaving,
    /// Registered but not yet serving
    Pending,
    /// Receiving series from a leaving ingester
    Joining,
    /// Missed heartbeats
    Unhealthy,
}

/// What a replica set will be used for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Read,
    Write,
}

/// A replica as seen by the membership service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngesterDesc {
    pub id: String,
    pub addr: String,
    #[serde(default)]
    pub zone: Option<String>,
    pub state: IngesterState,
    #[serde(default)]
    pub tokens: Vec<u32>,
}

impl IngesterDesc {
    pub fn new(id: impl Into<String>, addr: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            addr: addr.into(),
            zone: None,
            state: IngesterState::Active,
            tokens: Vec::new(),
        }
    }

    pub fn with_state(mut self, state: IngesterState) -> Self {
        self.state = state;
        self
    }

    pub fn with_tokens(mut self, tokens: Vec<u32>) -> Self {
        self.tokens = tokens;
        self
    }

    pub fn with_zone(mut self, zone: impl Into<String>) -> Self {
        self.zone = Some(zone.into());
        self
    }

    pub fn is_healthy(&self, op: Operation) -> bool {
        match op {
            Operation::Read => {
                matches!(self.state, IngesterState::Active | IngesterState::Leaving)
            }
            Operation::Write => self.state == IngesterState::Active,
        }
    }
}

/// Membership lookups consumed by the read path.
pub trait ReadRing: Send + Sync {
    /// Replicas owning `key` for the given operation.
    fn get(&self, key: u32, op: Operation) -> Result<ReplicationSet>;

    /// Every replica, with the error budget the replication factor allows.
    fn get_all(&self) -> Result<ReplicationSet>;
}
