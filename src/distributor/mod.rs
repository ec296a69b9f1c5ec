//! Distributor read path
//!
//! A query is prepared once (tenant, request, replica set), fanned out to
//! the replica set through the quorum executor and the per-replica results
//! are merged:
//! - `query` returns the legacy shape: one deduplicated sample stream per
//!   series ([`SampleMerger`]).
//! - `query_stream` drains every replica's streaming call and merges
//!   chunk series and raw series ([`StreamMerger`]).
//!
//! Every error escalated to the caller is wrapped as a storage error,
//! except cancellations which stay cancellations.

mod merge;
mod prep;
mod stream_merge;
mod telemetry;

pub use merge::{merge_matrices, merge_sample_sets, SampleMerger};
pub use prep::{select_shard, RequestPreparer, ShardSelection};
pub use stream_merge::{merge_stream_responses, StreamMerger};
pub use telemetry::{
    outcome_of, DistributorMetrics, NoopMetrics, OtelDistributorMetrics, METHOD_QUERY,
    METHOD_QUERY_STREAM, OUTCOME_CANCEL, OUTCOME_ERROR, OUTCOME_SUCCESS,
};

use crate::client::{ClientPool, IngesterClient};
use crate::config::DistributorConfig;
use crate::context::RequestContext;
use crate::model::{Matcher, Matrix, QueryRequest, QueryStreamResponse};
use crate::ring::{IngesterDesc, ReadRing};
use crate::{Error, Result};
use futures::StreamExt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info_span, Instrument};

/// Read-path entry points over a ring and a client pool.
pub struct Distributor {
    config: DistributorConfig,
    ring: Arc<dyn ReadRing>,
    clients: Arc<dyn ClientPool>,
    metrics: Arc<dyn DistributorMetrics>,
}

impl Distributor {
    /// Distributor reporting to the global OpenTelemetry meter provider.
    pub fn new(
        config: DistributorConfig,
        ring: Arc<dyn ReadRing>,
        clients: Arc<dyn ClientPool>,
    ) -> Self {
        Self {
            config,
            ring,
            clients,
            metrics: Arc::new(OtelDistributorMetrics::global()),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn DistributorMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn config(&self) -> &DistributorConfig {
        &self.config
    }

    /// Legacy query: merged, deduplicated samples per series.
    pub async fn query(
        &self,
        ctx: &RequestContext,
        from_ms: i64,
        to_ms: i64,
        matchers: &[Matcher],
    ) -> Result<Matrix> {
        let started = Instant::now();
        let ctx = self.scoped(ctx);

        let result = self
            .query_inner(&ctx, from_ms, to_ms, matchers)
            .instrument(info_span!("distributor_query", from_ms, to_ms))
            .await
            .map_err(Error::into_storage);

        self.metrics.query_duration(
            METHOD_QUERY,
            outcome_of(&result),
            started.elapsed().as_secs_f64(),
        );
        result
    }

    /// Streaming query: merged chunk series and raw series.
    pub async fn query_stream(
        &self,
        ctx: &RequestContext,
        from_ms: i64,
        to_ms: i64,
        matchers: &[Matcher],
    ) -> Result<QueryStreamResponse> {
        let started = Instant::now();
        let ctx = self.scoped(ctx);

        let result = self
            .query_stream_inner(&ctx, from_ms, to_ms, matchers)
            .instrument(info_span!("distributor_query_stream", from_ms, to_ms))
            .await
            .map_err(Error::into_storage);

        self.metrics.query_duration(
            METHOD_QUERY_STREAM,
            outcome_of(&result),
            started.elapsed().as_secs_f64(),
        );
        result
    }

    fn scoped(&self, ctx: &RequestContext) -> RequestContext {
        match self.config.query_timeout {
            Some(timeout) => ctx.clone().with_timeout(timeout),
            None => ctx.clone(),
        }
    }

    async fn query_inner(
        &self,
        ctx: &RequestContext,
        from_ms: i64,
        to_ms: i64,
        matchers: &[Matcher],
    ) -> Result<Matrix> {
        let (replication_set, req) = RequestPreparer::new(self.ring.as_ref(), self.config.shard_by)
            .prepare(ctx, from_ms, to_ms, matchers)?;

        let req = Arc::new(req);
        let clients = self.clients.clone();
        let metrics = self.metrics.clone();

        let results = replication_set
            .execute(ctx, self.config.extra_query_delay, move |ingester, ctx| {
                let clients = clients.clone();
                let metrics = metrics.clone();
                let req = req.clone();
                async move {
                    query_ingester(clients.as_ref(), metrics.as_ref(), &ingester, &ctx, &req).await
                }
            })
            .await?;

        let matrix = merge_matrices(results)?;
        debug!(series = matrix.len(), "Merged replica matrices");
        Ok(matrix)
    }

    async fn query_stream_inner(
        &self,
        ctx: &RequestContext,
        from_ms: i64,
        to_ms: i64,
        matchers: &[Matcher],
    ) -> Result<QueryStreamResponse> {
        let (replication_set, req) = RequestPreparer::new(self.ring.as_ref(), self.config.shard_by)
            .prepare(ctx, from_ms, to_ms, matchers)?;

        let req = Arc::new(req);
        let clients = self.clients.clone();
        let metrics = self.metrics.clone();

        let results = replication_set
            .execute(ctx, self.config.extra_query_delay, move |ingester, ctx| {
                let clients = clients.clone();
                let metrics = metrics.clone();
                let req = req.clone();
                async move {
                    query_ingester_stream(clients.as_ref(), metrics.as_ref(), &ingester, &ctx, &req)
                        .await
                }
            })
            .await?;

        let merged = merge_stream_responses(results)?;
        debug!(
            chunkseries = merged.chunkseries.len(),
            timeseries = merged.timeseries.len(),
            "Merged replica streams"
        );
        Ok(merged)
    }
}

/// Resolve the replica's client. A failure here is that replica's failure.
async fn acquire_client(
    clients: &dyn ClientPool,
    metrics: &dyn DistributorMetrics,
    addr: &str,
) -> Result<Arc<dyn IngesterClient>> {
    match clients.client_for(addr).await {
        Ok(client) => Ok(client),
        Err(err) => {
            metrics.ingester_query(addr);
            Err(settle_failure(metrics, addr, err))
        }
    }
}

/// Decide how a failed replica call is reported. Only a cancellation is
/// kept off the replica's record: an error the client or pool produced on
/// its own counts as a failure even if the request has ended since.
fn settle_failure(metrics: &dyn DistributorMetrics, addr: &str, err: Error) -> Error {
    if err.is_cancelled() {
        debug!(ingester = %addr, "Replica call cancelled");
        return Error::Cancelled;
    }
    metrics.ingester_query_failure(addr);
    err
}

async fn query_ingester(
    clients: &dyn ClientPool,
    metrics: &dyn DistributorMetrics,
    ingester: &IngesterDesc,
    ctx: &RequestContext,
    req: &QueryRequest,
) -> Result<Matrix> {
    let addr = ingester.addr.as_str();
    let client = acquire_client(clients, metrics, addr).await?;

    metrics.ingester_query(addr);
    let response = tokio::select! {
        biased;
        _ = ctx.done() => Err(Error::Cancelled),
        response = client.query(ctx, req) => response,
    };

    match response {
        Ok(response) => Ok(response.into_matrix()),
        Err(err) => Err(settle_failure(metrics, addr, err)),
    }
}

async fn query_ingester_stream(
    clients: &dyn ClientPool,
    metrics: &dyn DistributorMetrics,
    ingester: &IngesterDesc,
    ctx: &RequestContext,
    req: &QueryRequest,
) -> Result<QueryStreamResponse> {
    let addr = ingester.addr.as_str();
    let client = acquire_client(clients, metrics, addr).await?;

    metrics.ingester_query(addr);
    let opened = tokio::select! {
        biased;
        _ = ctx.done() => Err(Error::Cancelled),
        stream = client.query_stream(ctx, req) => stream,
    };
    // Dropping the stream on any return below releases the call.
    let mut stream = opened.map_err(|err| settle_failure(metrics, addr, err))?;

    let mut result = QueryStreamResponse::default();
    let mut batches = 0usize;
    loop {
        let next = tokio::select! {
            biased;
            _ = ctx.done() => return Err(settle_failure(metrics, addr, Error::Cancelled)),
            next = stream.next() => next,
        };

        match next {
            Some(Ok(batch)) => {
                batches += 1;
                result.chunkseries.extend(batch.chunkseries);
                result.timeseries.extend(batch.timeseries);
            }
            Some(Err(err)) => {
                let err = if err.is_cancelled() {
                    err
                } else {
                    Error::ReplicaStream {
                        addr: addr.to_string(),
                        reason: err.to_string(),
                    }
                };
                return Err(settle_failure(metrics, addr, err));
            }
            None => break,
        }
    }

    debug!(
        ingester = %addr,
        batches,
        chunkseries = result.chunkseries.len(),
        timeseries = result.timeseries.len(),
        "Drained replica stream"
    );
    Ok(result)
}
