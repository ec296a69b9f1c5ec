//! Token ring with a fixed membership snapshot
//!
//! Each ingester owns a set of 32-bit tokens. A key is served by the
//! ingesters owning the next tokens clockwise from it, skipping repeats
//! until `replication_factor` distinct ingesters are found.

use super::{IngesterDesc, Operation, ReadRing, ReplicationSet};
use crate::hash::{hash_add32, hash_new32};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Ring configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RingConfig {
    /// Copies kept of every series
    pub replication_factor: usize,
    /// Tokens generated for ingesters registered without explicit tokens
    pub tokens_per_ingester: usize,
}

impl Default for RingConfig {
    fn default() -> Self {
        Self {
            replication_factor: 3,
            tokens_per_ingester: 128,
        }
    }
}

/// In-process ring over a fixed set of ingesters
pub struct StaticRing {
    config: RingConfig,
    ingesters: Vec<IngesterDesc>,
    /// token -> index into `ingesters`
    tokens: BTreeMap<u32, usize>,
}

impl StaticRing {
    /// Build a ring. Ingesters without tokens get generated ones.
    pub fn new(config: RingConfig, ingesters: Vec<IngesterDesc>) -> Result<Self> {
        if config.replication_factor == 0 {
            return Err(Error::Config(
                "replication_factor must be at least 1".to_string(),
            ));
        }

        let mut ingesters = ingesters;
        let mut tokens = BTreeMap::new();

        for (idx, ingester) in ingesters.iter_mut().enumerate() {
            if ingester.tokens.is_empty() {
                ingester.tokens = generate_tokens(&ingester.id, config.tokens_per_ingester);
            }
            for token in &ingester.tokens {
                if let Some(owner) = tokens.insert(*token, idx) {
                    if owner != idx {
                        return Err(Error::Config(format!(
                            "token {} claimed by more than one ingester",
                            token
                        )));
                    }
                }
            }
        }

        info!(
            ingesters = ingesters.len(),
            tokens = tokens.len(),
            replication_factor = config.replication_factor,
            "Built static ring"
        );

        Ok(Self {
            config,
            ingesters,
            tokens,
        })
    }

    pub fn ingesters(&self) -> &[IngesterDesc] {
        &self.ingesters
    }

    pub fn replication_factor(&self) -> usize {
        self.config.replication_factor
    }

    /// Distinct ingesters clockwise from `key`, at most `n`.
    fn walk(&self, key: u32, n: usize) -> Vec<&IngesterDesc> {
        let mut picked: Vec<usize> = Vec::with_capacity(n);
        let clockwise = self.tokens.range(key..).chain(self.tokens.range(..key));

        for (_, idx) in clockwise {
            if picked.len() == n {
                break;
            }
            if !picked.contains(idx) {
                picked.push(*idx);
            }
        }

        picked.into_iter().map(|idx| &self.ingesters[idx]).collect()
    }
}

impl ReadRing for StaticRing {
    fn get(&self, key: u32, op: Operation) -> Result<ReplicationSet> {
        if self.tokens.is_empty() {
            return Err(Error::Ring("empty ring".to_string()));
        }

        let replication_factor = self.config.replication_factor.min(self.ingesters.len());
        let replicas = self.walk(key, replication_factor);

        let min_success = replication_factor / 2 + 1;
        let healthy: Vec<IngesterDesc> = replicas
            .into_iter()
            .filter(|i| i.is_healthy(op))
            .cloned()
            .collect();

        if healthy.len() < min_success {
            return Err(Error::Ring(format!(
                "at least {} live replicas required, could only find {}",
                min_success,
                healthy.len()
            )));
        }

        let max_errors = healthy.len() - min_success;
        debug!(key, replicas = healthy.len(), max_errors, "Resolved shard key");
        Ok(ReplicationSet::new(healthy, max_errors))
    }

    fn get_all(&self) -> Result<ReplicationSet> {
        let mut max_errors = self.config.replication_factor / 2;
        let mut healthy = Vec::with_capacity(self.ingesters.len());

        for ingester in &self.ingesters {
            if ingester.is_healthy(Operation::Read) {
                healthy.push(ingester.clone());
                continue;
            }
            max_errors = max_errors.checked_sub(1).ok_or_else(|| {
                Error::Ring("too many unhealthy ingesters to serve reads".to_string())
            })?;
        }

        Ok(ReplicationSet::new(healthy, max_errors))
    }
}

fn generate_tokens(id: &str, count: usize) -> Vec<u32> {
    (0..count)
        .map(|i| hash_add32(hash_new32(), &format!("{}:{}", id, i)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ring::IngesterState;
    use std::collections::HashSet;

    fn ring_of(states: &[IngesterState]) -> StaticRing {
        let ingesters = states
            .iter()
            .enumerate()
            .map(|(i, state)| {
                IngesterDesc::new(format!("ing-{i}"), format!("10.0.0.{i}:9095"))
                    .with_state(*state)
                    .with_tokens(vec![(i as u32 + 1) * 1000])
            })
            .collect();
        StaticRing::new(RingConfig::default(), ingesters).unwrap()
    }

    #[test]
    fn test_get_walks_clockwise_from_key() {
        let ring = ring_of(&[IngesterState::Active; 5]);
        let set = ring.get(2500, Operation::Read).unwrap();
        let ids: Vec<&str> = set.ingesters.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["ing-2", "ing-3", "ing-4"]);
        assert_eq!(set.max_errors, 1);
    }

    #[test]
    fn test_get_wraps_around() {
        let ring = ring_of(&[IngesterState::Active; 5]);
        let set = ring.get(4500, Operation::Read).unwrap();
        let ids: Vec<&str> = set.ingesters.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["ing-4", "ing-0", "ing-1"]);
    }

    #[test]
    fn test_get_drops_unhealthy_and_shrinks_budget() {
        let ring = ring_of(&[
            IngesterState::Active,
            IngesterState::Unhealthy,
            IngesterState::Active,
        ]);
        let set = ring.get(0, Operation::Read).unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.max_errors, 0);
        assert!(!set.includes("10.0.0.1:9095"));
    }

    #[test]
    fn test_get_fails_without_quorum() {
        let ring = ring_of(&[
            IngesterState::Active,
            IngesterState::Unhealthy,
            IngesterState::Pending,
        ]);
        assert!(matches!(ring.get(0, Operation::Read), Err(Error::Ring(_))));
    }

    #[test]
    fn test_leaving_is_readable_not_writable() {
        let ring = ring_of(&[
            IngesterState::Leaving,
            IngesterState::Active,
            IngesterState::Active,
        ]);
        assert_eq!(ring.get(0, Operation::Read).unwrap().len(), 3);
        assert_eq!(ring.get(0, Operation::Write).unwrap().len(), 2);
    }

    #[test]
    fn test_replica_set_carries_zones() {
        let ingesters = ["a", "b", "c"]
            .iter()
            .enumerate()
            .map(|(i, zone)| {
                IngesterDesc::new(format!("ing-{i}"), format!("10.0.0.{i}:9095"))
                    .with_zone(format!("zone-{zone}"))
                    .with_tokens(vec![(i as u32 + 1) * 1000])
            })
            .collect();
        let ring = StaticRing::new(RingConfig::default(), ingesters).unwrap();

        let set = ring.get(1500, Operation::Read).unwrap();
        let zones: Vec<&str> = set
            .ingesters
            .iter()
            .filter_map(|i| i.zone.as_deref())
            .collect();
        assert_eq!(zones, vec!["zone-b", "zone-c", "zone-a"]);
    }

    #[test]
    fn test_get_all_budget() {
        let ring = ring_of(&[IngesterState::Active; 4]);
        let set = ring.get_all().unwrap();
        assert_eq!(set.len(), 4);
        assert_eq!(set.max_errors, 1);

        let ring = ring_of(&[
            IngesterState::Active,
            IngesterState::Unhealthy,
            IngesterState::Active,
        ]);
        let set = ring.get_all().unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.max_errors, 0);

        let ring = ring_of(&[
            IngesterState::Unhealthy,
            IngesterState::Unhealthy,
            IngesterState::Active,
        ]);
        assert!(matches!(ring.get_all(), Err(Error::Ring(_))));
    }

    #[test]
    fn test_generated_tokens_spread_keys() {
        let ingesters = (0..3)
            .map(|i| IngesterDesc::new(format!("ing-{i}"), format!("ing-{i}:9095")))
            .collect();
        let config = RingConfig {
            replication_factor: 1,
            tokens_per_ingester: 64,
        };
        let ring = StaticRing::new(config, ingesters).unwrap();

        let owners: HashSet<String> = (0..200u32)
            .map(|k| {
                let key = hash_add32(hash_new32(), &format!("series-{k}"));
                ring.get(key, Operation::Read).unwrap().ingesters[0].id.clone()
            })
            .collect();
        assert_eq!(owners.len(), 3);
    }

    #[test]
    fn test_small_cluster_caps_replication_factor() {
        let ring = ring_of(&[IngesterState::Active; 2]);
        let set = ring.get(0, Operation::Read).unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.max_errors, 0);
    }

    #[test]
    fn test_rejects_duplicate_tokens() {
        let ingesters = vec![
            IngesterDesc::new("a", "a:1").with_tokens(vec![5]),
            IngesterDesc::new("b", "b:1").with_tokens(vec![5]),
        ];
        assert!(matches!(
            StaticRing::new(RingConfig::default(), ingesters),
            Err(Error::Config(_))
        ));
    }
}
