//! In-process cluster of memory ingesters
//!
//! Wires a [`StaticRing`], a [`StaticClientPool`] and one
//! [`MemoryIngester`] per ring member, and provides the write-path
//! counterpart of the read path: series are placed on the replicas of the
//! same shard key the distributor will later look up.

mod fixture;

pub use fixture::{ClusterFixture, FixtureIngester, FixtureSeries};

use crate::client::{MemoryIngester, StaticClientPool};
use crate::config::DistributorConfig;
use crate::distributor::{Distributor, DistributorMetrics};
use crate::hash::{shard_by_all_labels, shard_by_metric_name, ShardBy};
use crate::model::{Chunk, Labels, Sample};
use crate::ring::{IngesterDesc, Operation, ReadRing, RingConfig, StaticRing};
use crate::{Error, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Ring, clients and ingesters of one in-process cluster
pub struct MemoryCluster {
    shard_by: ShardBy,
    ring: Arc<StaticRing>,
    pool: Arc<StaticClientPool>,
    ingesters: HashMap<String, Arc<MemoryIngester>>,
}

impl MemoryCluster {
    /// Build a cluster placing series by `shard_by`.
    pub fn new(config: RingConfig, members: Vec<IngesterDesc>, shard_by: ShardBy) -> Result<Self> {
        let ring = StaticRing::new(config, members)?;
        let pool = StaticClientPool::new();
        let mut ingesters = HashMap::new();

        for desc in ring.ingesters() {
            let ingester = Arc::new(MemoryIngester::new(desc.addr.clone()));
            pool.insert(desc.addr.clone(), ingester.clone());
            ingesters.insert(desc.addr.clone(), ingester);
        }

        info!(
            ingesters = ingesters.len(),
            replication_factor = ring.replication_factor(),
            ?shard_by,
            "Built memory cluster"
        );

        Ok(Self {
            shard_by,
            ring: Arc::new(ring),
            pool: Arc::new(pool),
            ingesters,
        })
    }

    pub fn shard_by(&self) -> ShardBy {
        self.shard_by
    }

    pub fn ring(&self) -> Arc<StaticRing> {
        self.ring.clone()
    }

    pub fn pool(&self) -> Arc<StaticClientPool> {
        self.pool.clone()
    }

    pub fn ingester(&self, addr: &str) -> Option<Arc<MemoryIngester>> {
        self.ingesters.get(addr).cloned()
    }

    /// Shard key the series is placed under.
    pub fn shard_key(&self, tenant: &str, labels: &Labels) -> Result<u32> {
        if tenant.trim().is_empty() {
            return Err(Error::MissingTenant);
        }
        match self.shard_by {
            ShardBy::MetricName => {
                let name = labels.metric_name().ok_or_else(|| {
                    Error::InvalidRequest(format!("series {} has no metric name", labels))
                })?;
                Ok(shard_by_metric_name(tenant, name))
            }
            ShardBy::AllLabels => Ok(shard_by_all_labels(tenant, labels)),
        }
    }

    /// Addresses of the replicas that take writes for the series.
    pub fn replicas_for(&self, tenant: &str, labels: &Labels) -> Result<Vec<String>> {
        let key = self.shard_key(tenant, labels)?;
        let set = self.ring.get(key, Operation::Write)?;
        Ok(set.ingesters.into_iter().map(|i| i.addr).collect())
    }

    /// Write raw samples to every replica of the series. Returns the number
    /// of replicas written.
    pub fn push(&self, tenant: &str, labels: Labels, samples: &[Sample]) -> Result<usize> {
        let replicas = self.replicas_for(tenant, &labels)?;
        for addr in &replicas {
            self.member(addr)?.append(tenant, labels.clone(), samples);
        }
        debug!(
            tenant,
            series = %labels,
            samples = samples.len(),
            replicas = replicas.len(),
            "Pushed samples"
        );
        Ok(replicas.len())
    }

    /// Write pre-encoded chunks to every replica of the series.
    pub fn push_chunks(&self, tenant: &str, labels: Labels, chunks: Vec<Chunk>) -> Result<usize> {
        let replicas = self.replicas_for(tenant, &labels)?;
        for addr in &replicas {
            self.member(addr)?
                .append_chunks(tenant, labels.clone(), chunks.clone());
        }
        debug!(
            tenant,
            series = %labels,
            chunks = chunks.len(),
            replicas = replicas.len(),
            "Pushed chunks"
        );
        Ok(replicas.len())
    }

    /// Distributor reading from this cluster. Its sharding always follows
    /// the cluster's placement.
    pub fn distributor(&self, mut config: DistributorConfig) -> Distributor {
        config.shard_by = self.shard_by;
        Distributor::new(config, self.ring.clone(), self.pool.clone())
    }

    pub fn distributor_with_metrics(
        &self,
        config: DistributorConfig,
        metrics: Arc<dyn DistributorMetrics>,
    ) -> Distributor {
        self.distributor(config).with_metrics(metrics)
    }

    fn member(&self, addr: &str) -> Result<&Arc<MemoryIngester>> {
        self.ingesters
            .get(addr)
            .ok_or_else(|| Error::Ring(format!("ring member {} has no ingester", addr)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::METRIC_NAME;
    use crate::ring::IngesterState;

    fn members(n: usize) -> Vec<IngesterDesc> {
        (0..n)
            .map(|i| IngesterDesc::new(format!("ing-{i}"), format!("ing-{i}:9095")))
            .collect()
    }

    fn up(job: &str) -> Labels {
        Labels::from_pairs(&[(METRIC_NAME, "up"), ("job", job)])
    }

    #[test]
    fn test_push_writes_every_replica() {
        let cluster = MemoryCluster::new(RingConfig::default(), members(5), ShardBy::MetricName).unwrap();
        let written = cluster.push("t", up("api"), &[Sample::new(1, 1.0)]).unwrap();
        assert_eq!(written, 3);

        let holders = cluster
            .ingesters
            .values()
            .filter(|i| i.series_count("t") == 1)
            .count();
        assert_eq!(holders, 3);
    }

    #[test]
    fn test_metric_name_sharding_colocates_series_of_a_metric() {
        let cluster = MemoryCluster::new(RingConfig::default(), members(6), ShardBy::MetricName).unwrap();
        assert_eq!(
            cluster.replicas_for("t", &up("api")).unwrap(),
            cluster.replicas_for("t", &up("db")).unwrap()
        );
    }

    #[test]
    fn test_metric_name_sharding_requires_name() {
        let cluster = MemoryCluster::new(RingConfig::default(), members(3), ShardBy::MetricName).unwrap();
        let err = cluster
            .push("t", Labels::from_pairs(&[("job", "api")]), &[Sample::new(1, 1.0)])
            .unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)));

        let err = cluster.push("", up("api"), &[]).unwrap_err();
        assert!(matches!(err, Error::MissingTenant));
    }

    #[test]
    fn test_writes_skip_leaving_ingesters() {
        let mut members = members(3);
        members[1] = members[1].clone().with_state(IngesterState::Leaving);
        let cluster = MemoryCluster::new(RingConfig::default(), members, ShardBy::AllLabels).unwrap();

        let replicas = cluster.replicas_for("t", &up("api")).unwrap();
        assert_eq!(replicas.len(), 2);
        assert!(!replicas.contains(&"ing-1:9095".to_string()));
    }
}
