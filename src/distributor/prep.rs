//! Request preparation: tenant check, request normalisation and replica
//! selection.

use crate::context::RequestContext;
use crate::hash::{shard_by_metric_name, ShardBy};
use crate::model::{MatchType, Matcher, QueryRequest, METRIC_NAME};
use crate::ring::{Operation, ReadRing, ReplicationSet};
use crate::Result;
use tracing::debug;

/// Which membership lookup a query needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShardSelection {
    /// Only the replicas owning this shard key.
    Key(u32),
    /// Every replica.
    All,
}

/// Pick the lookup for a query.
///
/// A single shard is only safe when series are placed by metric name and
/// the name is pinned by an equality matcher. Anything looser could live
/// on any shard.
pub fn select_shard(shard_by: ShardBy, tenant: &str, matchers: &[Matcher]) -> ShardSelection {
    if shard_by != ShardBy::MetricName {
        return ShardSelection::All;
    }

    matchers
        .iter()
        .find(|m| m.name == METRIC_NAME && m.match_type == MatchType::Equal)
        .map(|m| ShardSelection::Key(shard_by_metric_name(tenant, &m.value)))
        .unwrap_or(ShardSelection::All)
}

/// Builds the request and resolves the replicas it goes to.
pub struct RequestPreparer<'a> {
    ring: &'a dyn ReadRing,
    shard_by: ShardBy,
}

impl<'a> RequestPreparer<'a> {
    pub fn new(ring: &'a dyn ReadRing, shard_by: ShardBy) -> Self {
        Self { ring, shard_by }
    }

    /// Tenant first, then the request, then the membership lookup.
    pub fn prepare(
        &self,
        ctx: &RequestContext,
        from_ms: i64,
        to_ms: i64,
        matchers: &[Matcher],
    ) -> Result<(ReplicationSet, QueryRequest)> {
        let tenant = ctx.org_id()?;
        let req = QueryRequest::new(from_ms, to_ms, matchers)?;

        let selection = select_shard(self.shard_by, tenant, matchers);
        let replication_set = match selection {
            ShardSelection::Key(key) => self.ring.get(key, Operation::Read)?,
            ShardSelection::All => self.ring.get_all()?,
        };

        debug!(
            tenant,
            ?selection,
            replicas = replication_set.len(),
            max_errors = replication_set.max_errors,
            "Prepared query"
        );
        Ok((replication_set, req))
    }
}
