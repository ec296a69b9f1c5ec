//! Distributor configuration
//!
//! Environment variables:
//! - REPLICANT_SHARD_BY_ALL_LABELS: shard by the full label set instead of
//!   the metric name (default: false)
//! - REPLICANT_EXTRA_QUERY_DELAY_MS: hold back the replicas that may fail
//!   for this long before querying them (default: 0)
//! - REPLICANT_QUERY_TIMEOUT_SECS: per-query timeout, 0 disables
//!   (default: 120)

use crate::hash::ShardBy;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::info;

const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(120);

/// Read-path settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DistributorConfig {
    /// Must match how the write path places series
    pub shard_by: ShardBy,
    /// Hedging delay for replicas beyond the quorum
    #[serde(rename = "extra_query_delay_ms", with = "duration_ms")]
    pub extra_query_delay: Duration,
    /// Applied on top of the caller's own deadline
    #[serde(rename = "query_timeout_ms", with = "optional_duration_ms")]
    pub query_timeout: Option<Duration>,
}

impl Default for DistributorConfig {
    fn default() -> Self {
        Self {
            shard_by: ShardBy::MetricName,
            extra_query_delay: Duration::ZERO,
            query_timeout: Some(DEFAULT_QUERY_TIMEOUT),
        }
    }
}

impl DistributorConfig {
    /// Defaults overridden by whatever is set in the environment.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Some(all_labels) = parse_optional_bool("REPLICANT_SHARD_BY_ALL_LABELS")? {
            config.shard_by = if all_labels {
                ShardBy::AllLabels
            } else {
                ShardBy::MetricName
            };
        }

        if let Some(ms) = parse_optional_u64("REPLICANT_EXTRA_QUERY_DELAY_MS")? {
            config.extra_query_delay = Duration::from_millis(ms);
        }

        if let Some(secs) = parse_optional_u64("REPLICANT_QUERY_TIMEOUT_SECS")? {
            config.query_timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }

        info!(
            shard_by = ?config.shard_by,
            extra_query_delay_ms = config.extra_query_delay.as_millis() as u64,
            query_timeout_secs = config.query_timeout.map(|t| t.as_secs()).unwrap_or(0),
            "Loaded distributor configuration"
        );
        Ok(config)
    }
}

fn parse_optional_bool(name: &str) -> Result<Option<bool>> {
    let Some(raw) = std::env::var(name).ok() else {
        return Ok(None);
    };
    parse_bool(name, &raw).map(Some)
}

fn parse_bool(name: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(Error::Config(format!(
            "{name} must be a boolean (true/false/1/0), got '{raw}'"
        ))),
    }
}

fn parse_optional_u64(name: &str) -> Result<Option<u64>> {
    let Some(raw) = std::env::var(name).ok() else {
        return Ok(None);
    };
    parse_u64(name, &raw).map(Some)
}

fn parse_u64(name: &str, raw: &str) -> Result<u64> {
    raw.trim()
        .parse::<u64>()
        .map_err(|e| Error::Config(format!("{name} must be a non-negative integer: {e}")))
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}

/// `0` and `null` both mean no timeout.
mod optional_duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(
        value: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.map(|d| d.as_millis() as u64).unwrap_or(0))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        let ms = Option::<u64>::deserialize(deserializer)?.unwrap_or(0);
        Ok((ms > 0).then(|| Duration::from_millis(ms)))
    }
}
