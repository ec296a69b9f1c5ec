//! Query request sent identically to every targeted replica

use super::matcher::{CompiledMatcher, Matcher};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Inclusive time range in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start_ms: i64,
    pub end_ms: i64,
}

impl TimeRange {
    pub fn new(start_ms: i64, end_ms: i64) -> Self {
        Self { start_ms, end_ms }
    }

    pub fn contains(&self, timestamp_ms: i64) -> bool {
        timestamp_ms >= self.start_ms && timestamp_ms <= self.end_ms
    }

    pub fn overlaps(&self, start_ms: i64, end_ms: i64) -> bool {
        self.start_ms <= end_ms && self.end_ms >= start_ms
    }
}

/// Time range plus matchers. Built once, then shared read-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRequest {
    range: TimeRange,
    matchers: Vec<Matcher>,
}

impl QueryRequest {
    /// Validate the range and every matcher.
    pub fn new(start_ms: i64, end_ms: i64, matchers: &[Matcher]) -> Result<Self> {
        if start_ms > end_ms {
            return Err(Error::InvalidRequest(format!(
                "start {} is after end {}",
                start_ms, end_ms
            )));
        }
        for matcher in matchers {
            matcher.compile()?;
        }

        Ok(Self {
            range: TimeRange::new(start_ms, end_ms),
            matchers: matchers.to_vec(),
        })
    }

    pub fn range(&self) -> TimeRange {
        self.range
    }

    pub fn matchers(&self) -> &[Matcher] {
        &self.matchers
    }

    /// Compile the matchers for evaluation on the ingester side.
    pub fn compile_matchers(&self) -> Result<Vec<CompiledMatcher>> {
        self.matchers.iter().map(Matcher::compile).collect()
    }
}
