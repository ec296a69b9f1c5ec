//! Series payloads exchanged with ingesters

use super::labels::Labels;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// A single (timestamp, value) pair
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub timestamp_ms: i64,
    pub value: f64,
}

impl Sample {
    pub fn new(timestamp_ms: i64, value: f64) -> Self {
        Self {
            timestamp_ms,
            value,
        }
    }
}

impl From<(i64, f64)> for Sample {
    fn from((timestamp_ms, value): (i64, f64)) -> Self {
        Self::new(timestamp_ms, value)
    }
}

/// Legacy response shape: a series with its samples
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleStream {
    pub labels: Labels,
    pub samples: Vec<Sample>,
}

/// Merged legacy result
pub type Matrix = Vec<SampleStream>;

/// Streaming response shape: raw samples for one series
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeSeries {
    pub labels: Labels,
    pub samples: Vec<Sample>,
}

/// An opaque, pre-encoded block of consecutive samples
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub start_timestamp_ms: i64,
    pub end_timestamp_ms: i64,
    pub encoding: i32,
    pub data: Bytes,
}

impl Chunk {
    pub fn overlaps(&self, start_ms: i64, end_ms: i64) -> bool {
        self.start_timestamp_ms <= end_ms && self.end_timestamp_ms >= start_ms
    }
}

/// Streaming response shape: encoded chunks for one series
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkSeries {
    pub labels: Labels,
    pub chunks: Vec<Chunk>,
}

/// Response to a legacy query
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    pub timeseries: Vec<TimeSeries>,
}

impl QueryResponse {
    pub fn into_matrix(self) -> Matrix {
        self.timeseries
            .into_iter()
            .map(|ts| SampleStream {
                labels: ts.labels,
                samples: ts.samples,
            })
            .collect()
    }
}

/// One partial response of a streaming query, and also the merged result
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryStreamResponse {
    pub chunkseries: Vec<ChunkSeries>,
    pub timeseries: Vec<TimeSeries>,
}

impl QueryStreamResponse {
    pub fn is_empty(&self) -> bool {
        self.chunkseries.is_empty() && self.timeseries.is_empty()
    }
}
