//! JSON description of a cluster and the series it holds

use super::MemoryCluster;
use crate::config::DistributorConfig;
use crate::model::{Label, Labels, Sample};
use crate::ring::{IngesterDesc, RingConfig};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

fn default_online() -> bool {
    true
}

/// One ring member
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixtureIngester {
    #[serde(flatten)]
    pub desc: IngesterDesc,
    /// Offline members stay in the ring but fail every query
    #[serde(default = "default_online")]
    pub online: bool,
}

/// One series pushed through the write path
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixtureSeries {
    pub tenant: String,
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub samples: Vec<(i64, f64)>,
}

impl FixtureSeries {
    pub fn labels(&self) -> Labels {
        Labels::new(
            self.labels
                .iter()
                .map(|(name, value)| Label::new(name.as_str(), value.as_str()))
                .collect(),
        )
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClusterFixture {
    #[serde(default)]
    pub ring: RingConfig,
    #[serde(default)]
    pub distributor: DistributorConfig,
    pub ingesters: Vec<FixtureIngester>,
    #[serde(default)]
    pub series: Vec<FixtureSeries>,
}

impl ClusterFixture {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let fixture: Self = serde_json::from_str(&raw)?;
        info!(
            path = %path.as_ref().display(),
            ingesters = fixture.ingesters.len(),
            series = fixture.series.len(),
            "Loaded cluster fixture"
        );
        Ok(fixture)
    }

    /// Build the cluster, push every series, then take offline members
    /// down so they hold data but cannot serve it.
    pub fn build(&self) -> Result<MemoryCluster> {
        let members = self.ingesters.iter().map(|i| i.desc.clone()).collect();
        let cluster = MemoryCluster::new(self.ring.clone(), members, self.distributor.shard_by)?;

        for series in &self.series {
            let samples: Vec<Sample> = series.samples.iter().copied().map(Sample::from).collect();
            cluster.push(&series.tenant, series.labels(), &samples)?;
        }

        for member in self.ingesters.iter().filter(|i| !i.online) {
            if let Some(ingester) = cluster.ingester(&member.desc.addr) {
                ingester.set_online(false);
            }
        }
        Ok(cluster)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::METRIC_NAME;
    use crate::ring::IngesterState;
    use std::io::Write;

    const FIXTURE: &str = r#"{
        "ring": {"replication_factor": 3},
        "distributor": {"shard_by": "metric_name", "extra_query_delay_ms": 0},
        "ingesters": [
            {"id": "ing-0", "addr": "ing-0:9095", "state": "active"},
            {"id": "ing-1", "addr": "ing-1:9095", "state": "leaving"},
            {"id": "ing-2", "addr": "ing-2:9095", "state": "active", "online": false},
            {"id": "ing-3", "addr": "ing-3:9095", "state": "active", "zone": "b"}
        ],
        "series": [
            {"tenant": "t", "labels": {"__name__": "up", "job": "api"}, "samples": [[10, 1.0], [20, 1.0]]}
        ]
    }"#;

    #[test]
    fn test_parse_fixture() {
        let fixture: ClusterFixture = serde_json::from_str(FIXTURE).unwrap();
        assert_eq!(fixture.ring.replication_factor, 3);
        assert_eq!(fixture.ring.tokens_per_ingester, 128);
        assert_eq!(fixture.ingesters[1].desc.state, IngesterState::Leaving);
        assert!(!fixture.ingesters[2].online);
        assert_eq!(fixture.ingesters[3].desc.zone.as_deref(), Some("b"));
        assert_eq!(fixture.series[0].labels().metric_name(), Some("up"));
    }

    #[test]
    fn test_from_path_and_build() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(FIXTURE.as_bytes()).unwrap();

        let fixture = ClusterFixture::from_path(file.path()).unwrap();
        let cluster = fixture.build().unwrap();

        let labels = Labels::from_pairs(&[(METRIC_NAME, "up"), ("job", "api")]);
        let holders = cluster.replicas_for("t", &labels).unwrap();
        assert!(!holders.is_empty());
        for addr in holders {
            assert_eq!(cluster.ingester(&addr).unwrap().series_count("t"), 1);
        }
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ClusterFixture::from_path(dir.path().join("missing.json")).unwrap_err();
        assert!(matches!(err, crate::Error::Io(_)));
    }
}
