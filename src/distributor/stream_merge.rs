//! Streaming-shape merge.
//!
//! Chunk series are grouped and their chunk lists concatenated. Chunks are
//! immutable and decode idempotently, so overlap between replicas is left
//! to whoever decodes them. Raw series are grouped, concatenated and
//! stable-sorted by timestamp; duplicate timestamps are kept.

use crate::hash::Fingerprint;
use crate::model::{ChunkSeries, Labels, QueryStreamResponse, TimeSeries};
use crate::{Error, Result};
use std::collections::HashMap;

/// Accumulates streaming responses keyed by
/// [`crate::model::Labels::fast_fingerprint`].
#[derive(Debug, Default)]
pub struct StreamMerger {
    chunkseries: Vec<ChunkSeries>,
    chunk_index: HashMap<Fingerprint, usize>,
    timeseries: Vec<TimeSeries>,
    series_index: HashMap<Fingerprint, usize>,
}

impl StreamMerger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one replica's accumulated response in.
    pub fn add(&mut self, response: QueryStreamResponse) -> Result<()> {
        for series in response.chunkseries {
            let fp = series.labels.fast_fingerprint();
            match self.chunk_index.get(&fp) {
                Some(&idx) => {
                    let existing = &mut self.chunkseries[idx];
                    check_same_series(fp, &existing.labels, &series.labels)?;
                    existing.chunks.extend(series.chunks);
                }
                None => {
                    self.chunk_index.insert(fp, self.chunkseries.len());
                    self.chunkseries.push(series);
                }
            }
        }

        for series in response.timeseries {
            let fp = series.labels.fast_fingerprint();
            match self.series_index.get(&fp) {
                Some(&idx) => {
                    let existing = &mut self.timeseries[idx];
                    check_same_series(fp, &existing.labels, &series.labels)?;
                    existing.samples.extend(series.samples);
                }
                None => {
                    self.series_index.insert(fp, self.timeseries.len());
                    self.timeseries.push(series);
                }
            }
        }

        Ok(())
    }

    /// Both collections, one entry per distinct label set, raw samples
    /// sorted by timestamp.
    pub fn finish(self) -> QueryStreamResponse {
        let mut timeseries = self.timeseries;
        for series in &mut timeseries {
            series.samples.sort_by_key(|s| s.timestamp_ms);
        }

        QueryStreamResponse {
            chunkseries: self.chunkseries,
            timeseries,
        }
    }
}

fn check_same_series(fp: Fingerprint, existing: &Labels, incoming: &Labels) -> Result<()> {
    if existing == incoming {
        Ok(())
    } else {
        Err(Error::MergeFailure(format!(
            "fingerprint {} shared by {} and {}",
            fp, existing, incoming
        )))
    }
}

/// Merge every replica's streaming response.
pub fn merge_stream_responses(results: Vec<QueryStreamResponse>) -> Result<QueryStreamResponse> {
    let mut merger = StreamMerger::new();
    for response in results {
        merger.add(response)?;
    }
    Ok(merger.finish())
}
