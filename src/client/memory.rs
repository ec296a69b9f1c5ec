//! In-process ingester holding recent series in memory.

use super::{IngesterClient, QueryStream};
use crate::context::RequestContext;
use crate::model::{
    Chunk, ChunkSeries, CompiledMatcher, Labels, QueryRequest, QueryResponse,
    QueryStreamResponse, Sample, TimeSeries,
};
use crate::{Error, Result};
use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

/// Series sent per streamed response.
pub const DEFAULT_STREAM_BATCH_SIZE: usize = 128;

#[derive(Debug, Default)]
struct StoredSeries {
    labels: Labels,
    samples: Vec<Sample>,
    chunks: Vec<Chunk>,
}

#[derive(Debug, Default)]
struct TenantSeries {
    series: Vec<StoredSeries>,
    index: HashMap<Labels, usize>,
}

impl TenantSeries {
    fn entry(&mut self, labels: Labels) -> &mut StoredSeries {
        let idx = match self.index.get(&labels) {
            Some(idx) => *idx,
            None => {
                self.series.push(StoredSeries {
                    labels: labels.clone(),
                    ..Default::default()
                });
                self.index.insert(labels, self.series.len() - 1);
                self.series.len() - 1
            }
        };
        &mut self.series[idx]
    }
}

/// Series selected by a request
struct Selected {
    labels: Labels,
    samples: Vec<Sample>,
    chunks: Vec<Chunk>,
}

/// Ingester serving queries from memory
pub struct MemoryIngester {
    addr: String,
    tenants: RwLock<HashMap<String, TenantSeries>>,
    online: AtomicBool,
    stream_batch_size: usize,
}

impl MemoryIngester {
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            tenants: RwLock::new(HashMap::new()),
            online: AtomicBool::new(true),
            stream_batch_size: DEFAULT_STREAM_BATCH_SIZE,
        }
    }

    pub fn with_stream_batch_size(mut self, size: usize) -> Self {
        self.stream_batch_size = size.max(1);
        self
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Offline ingesters fail every call as unavailable.
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    /// Append raw samples. Samples are kept ordered by timestamp and the
    /// first value written for a timestamp wins.
    pub fn append(&self, tenant: &str, labels: Labels, samples: &[Sample]) {
        let mut tenants = self.tenants.write();
        let series = tenants.entry(tenant.to_string()).or_default().entry(labels);
        series.samples.extend_from_slice(samples);
        series.samples.sort_by_key(|s| s.timestamp_ms);
        series.samples.dedup_by_key(|s| s.timestamp_ms);
    }

    /// Append pre-encoded chunks.
    pub fn append_chunks(&self, tenant: &str, labels: Labels, chunks: Vec<Chunk>) {
        let mut tenants = self.tenants.write();
        let series = tenants.entry(tenant.to_string()).or_default().entry(labels);
        series.chunks.extend(chunks);
    }

    pub fn series_count(&self, tenant: &str) -> usize {
        self.tenants
            .read()
            .get(tenant)
            .map(|t| t.series.len())
            .unwrap_or(0)
    }

    fn check_online(&self) -> Result<()> {
        if self.online.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(Error::ReplicaUnavailable {
                addr: self.addr.clone(),
                reason: "ingester offline".to_string(),
            })
        }
    }

    fn select(&self, ctx: &RequestContext, req: &QueryRequest) -> Result<Vec<Selected>> {
        let tenant = ctx.org_id()?;
        let matchers: Vec<CompiledMatcher> = req.compile_matchers()?;
        let range = req.range();

        let tenants = self.tenants.read();
        let Some(tenant_series) = tenants.get(tenant) else {
            return Ok(Vec::new());
        };

        let selected: Vec<Selected> = tenant_series
            .series
            .iter()
            .filter(|s| matchers.iter().all(|m| m.matches_labels(&s.labels)))
            .filter_map(|s| {
                let samples: Vec<Sample> = s
                    .samples
                    .iter()
                    .filter(|sample| range.contains(sample.timestamp_ms))
                    .copied()
                    .collect();
                let chunks: Vec<Chunk> = s
                    .chunks
                    .iter()
                    .filter(|c| c.overlaps(range.start_ms, range.end_ms))
                    .cloned()
                    .collect();
                if samples.is_empty() && chunks.is_empty() {
                    return None;
                }
                Some(Selected {
                    labels: s.labels.clone(),
                    samples,
                    chunks,
                })
            })
            .collect();

        debug!(
            ingester = %self.addr,
            tenant,
            series = selected.len(),
            "Selected series"
        );
        Ok(selected)
    }
}

#[async_trait]
impl IngesterClient for MemoryIngester {
    async fn query(&self, ctx: &RequestContext, req: &QueryRequest) -> Result<QueryResponse> {
        self.check_online()?;
        let timeseries = self
            .select(ctx, req)?
            .into_iter()
            .filter(|s| !s.samples.is_empty())
            .map(|s| TimeSeries {
                labels: s.labels,
                samples: s.samples,
            })
            .collect();
        Ok(QueryResponse { timeseries })
    }

    async fn query_stream(
        &self,
        ctx: &RequestContext,
        req: &QueryRequest,
    ) -> Result<QueryStream> {
        self.check_online()?;
        let selected = self.select(ctx, req)?;

        let mut batches = Vec::new();
        for group in selected.chunks(self.stream_batch_size) {
            let mut batch = QueryStreamResponse::default();
            for s in group {
                if !s.chunks.is_empty() {
                    batch.chunkseries.push(ChunkSeries {
                        labels: s.labels.clone(),
                        chunks: s.chunks.clone(),
                    });
                }
                if !s.samples.is_empty() {
                    batch.timeseries.push(TimeSeries {
                        labels: s.labels.clone(),
                        samples: s.samples.clone(),
                    });
                }
            }
            batches.push(Ok(batch));
        }

        Ok(futures::stream::iter(batches).boxed())
    }
}
