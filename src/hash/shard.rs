//! Shard keys used to look up the replicas owning a series.
//!
//! These must produce exactly what the write path produced when the data
//! was placed, or reads silently land on the wrong replicas.

use super::fnv::{hash_add32, hash_new32};
use crate::model::Labels;
use serde::{Deserialize, Serialize};

/// How series are spread across the ring
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShardBy {
    /// Tenant + metric name: all series of a metric share replicas.
    #[default]
    MetricName,
    /// Tenant + full label set.
    AllLabels,
}

/// FNV-1a-32 over tenant then metric name.
pub fn shard_by_metric_name(tenant_id: &str, metric_name: &str) -> u32 {
    let h = hash_new32();
    let h = hash_add32(h, tenant_id);
    hash_add32(h, metric_name)
}

/// FNV-1a-32 over tenant then each label name and value, in label order.
pub fn shard_by_all_labels(tenant_id: &str, labels: &Labels) -> u32 {
    let mut h = hash_add32(hash_new32(), tenant_id);
    for label in labels {
        h = hash_add32(h, &label.name);
        h = hash_add32(h, &label.value);
    }
    h
}
