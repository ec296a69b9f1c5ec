//! Fakes shared by the integration tests
//!
//! - [`ScriptedRing`]: returns a fixed replica set and records lookups
//! - [`ScriptedClient`]: answers with canned data, fails, or hangs
//! - [`SlowRefusalPool`]: refuses chosen addresses only after a delay
//! - [`RecordingMetrics`]: keeps every metric the distributor reports

#![allow(dead_code)]

use async_trait::async_trait;
use dashmap::DashMap;
use futures::StreamExt;
use parking_lot::Mutex;
use replicant::client::{ClientPool, IngesterClient, QueryStream, StaticClientPool};
use replicant::distributor::DistributorMetrics;
use replicant::model::{
    Chunk, ChunkSeries, Labels, QueryRequest, QueryResponse, QueryStreamResponse, Sample,
    TimeSeries, METRIC_NAME,
};
use replicant::ring::{IngesterDesc, Operation, ReadRing, ReplicationSet};
use replicant::{Error, RequestContext, Result};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub fn labels(name: &str) -> Labels {
    Labels::from_pairs(&[(METRIC_NAME, name), ("job", "api")])
}

pub fn samples(pairs: &[(i64, f64)]) -> Vec<Sample> {
    pairs.iter().copied().map(Sample::from).collect()
}

pub fn series(name: &str, pairs: &[(i64, f64)]) -> TimeSeries {
    TimeSeries {
        labels: labels(name),
        samples: samples(pairs),
    }
}

pub fn chunk(start: i64, end: i64, tag: u8) -> Chunk {
    Chunk {
        start_timestamp_ms: start,
        end_timestamp_ms: end,
        encoding: 1,
        data: bytes::Bytes::from(vec![tag]),
    }
}

pub fn chunk_series(name: &str, chunks: Vec<Chunk>) -> ChunkSeries {
    ChunkSeries {
        labels: labels(name),
        chunks,
    }
}

pub fn replicas(addrs: &[&str]) -> Vec<IngesterDesc> {
    addrs
        .iter()
        .map(|addr| IngesterDesc::new(*addr, *addr))
        .collect()
}

/// What a ring lookup asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    Key(u32, Operation),
    All,
}

/// Ring returning the same replica set for every lookup
pub struct ScriptedRing {
    set: ReplicationSet,
    lookups: Mutex<Vec<Lookup>>,
}

impl ScriptedRing {
    pub fn new(ingesters: Vec<IngesterDesc>, max_errors: usize) -> Self {
        Self {
            set: ReplicationSet::new(ingesters, max_errors),
            lookups: Mutex::new(Vec::new()),
        }
    }

    pub fn lookups(&self) -> Vec<Lookup> {
        self.lookups.lock().clone()
    }
}

impl ReadRing for ScriptedRing {
    fn get(&self, key: u32, op: Operation) -> Result<ReplicationSet> {
        self.lookups.lock().push(Lookup::Key(key, op));
        Ok(self.set.clone())
    }

    fn get_all(&self) -> Result<ReplicationSet> {
        self.lookups.lock().push(Lookup::All);
        Ok(self.set.clone())
    }
}

#[derive(Clone)]
enum Behavior {
    Respond(Vec<QueryStreamResponse>),
    Fail(String),
    FailMidStream(Vec<QueryStreamResponse>, String),
    Hang(Vec<QueryStreamResponse>),
}

/// Replica client with canned behaviour
pub struct ScriptedClient {
    addr: String,
    behavior: Behavior,
    calls: AtomicUsize,
    released: Arc<AtomicBool>,
}

impl ScriptedClient {
    fn with(addr: &str, behavior: Behavior) -> Arc<Self> {
        Arc::new(Self {
            addr: addr.to_string(),
            behavior,
            calls: AtomicUsize::new(0),
            released: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Legacy answer: these raw series. Streams them as one batch.
    pub fn series(addr: &str, timeseries: Vec<TimeSeries>) -> Arc<Self> {
        Self::with(
            addr,
            Behavior::Respond(vec![QueryStreamResponse {
                chunkseries: Vec::new(),
                timeseries,
            }]),
        )
    }

    /// Streams these batches then ends.
    pub fn batches(addr: &str, batches: Vec<QueryStreamResponse>) -> Arc<Self> {
        Self::with(addr, Behavior::Respond(batches))
    }

    /// Every call fails with a transport error.
    pub fn failing(addr: &str, reason: &str) -> Arc<Self> {
        Self::with(addr, Behavior::Fail(reason.to_string()))
    }

    /// Streams these batches then fails.
    pub fn failing_mid_stream(
        addr: &str,
        batches: Vec<QueryStreamResponse>,
        reason: &str,
    ) -> Arc<Self> {
        Self::with(addr, Behavior::FailMidStream(batches, reason.to_string()))
    }

    /// Streams these batches then never sends again. Legacy calls never
    /// return.
    pub fn hanging(addr: &str, batches: Vec<QueryStreamResponse>) -> Arc<Self> {
        Self::with(addr, Behavior::Hang(batches))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// True once a stream handed out by this client was dropped.
    pub fn released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }

    fn unavailable(&self, reason: &str) -> Error {
        Error::ReplicaUnavailable {
            addr: self.addr.clone(),
            reason: reason.to_string(),
        }
    }
}

struct ReleaseOnDrop(Arc<AtomicBool>);

impl Drop for ReleaseOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

fn flatten(batches: &[QueryStreamResponse]) -> QueryResponse {
    QueryResponse {
        timeseries: batches
            .iter()
            .flat_map(|b| b.timeseries.iter().cloned())
            .collect(),
    }
}

#[async_trait]
impl IngesterClient for ScriptedClient {
    async fn query(&self, _ctx: &RequestContext, _req: &QueryRequest) -> Result<QueryResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            Behavior::Respond(batches) => Ok(flatten(batches)),
            Behavior::Fail(reason) | Behavior::FailMidStream(_, reason) => {
                Err(self.unavailable(reason))
            }
            Behavior::Hang(_) => futures::future::pending().await,
        }
    }

    async fn query_stream(
        &self,
        _ctx: &RequestContext,
        _req: &QueryRequest,
    ) -> Result<QueryStream> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let guard = ReleaseOnDrop(self.released.clone());

        let stream = match &self.behavior {
            Behavior::Respond(batches) => {
                futures::stream::iter(batches.clone().into_iter().map(Ok)).boxed()
            }
            Behavior::Fail(reason) => return Err(self.unavailable(reason)),
            Behavior::FailMidStream(batches, reason) => {
                let failure = Error::Internal(reason.clone());
                futures::stream::iter(batches.clone().into_iter().map(Ok))
                    .chain(futures::stream::once(async move { Err(failure) }))
                    .boxed()
            }
            Behavior::Hang(batches) => futures::stream::iter(batches.clone().into_iter().map(Ok))
                .chain(futures::stream::pending())
                .boxed(),
        };

        Ok(stream
            .map(move |item| {
                let _guard = &guard;
                item
            })
            .boxed())
    }
}

/// Pool holding the given scripted clients; any other address is
/// unreachable.
pub fn pool(clients: &[Arc<ScriptedClient>]) -> StaticClientPool {
    let pool = StaticClientPool::new();
    for client in clients {
        pool.insert(client.addr.clone(), client.clone());
    }
    pool
}

/// Pool that takes a while to refuse some addresses, like a dial that
/// times out. Everything else resolves through the scripted clients.
pub struct SlowRefusalPool {
    clients: StaticClientPool,
    refusals: DashMap<String, Duration>,
}

impl SlowRefusalPool {
    pub fn new(clients: &[Arc<ScriptedClient>]) -> Self {
        Self {
            clients: pool(clients),
            refusals: DashMap::new(),
        }
    }

    pub fn refuse_after(self, addr: &str, delay: Duration) -> Self {
        self.refusals.insert(addr.to_string(), delay);
        self
    }
}

#[async_trait]
impl ClientPool for SlowRefusalPool {
    async fn client_for(&self, addr: &str) -> Result<Arc<dyn IngesterClient>> {
        let delay = self.refusals.get(addr).map(|entry| *entry.value());
        match delay {
            Some(delay) => {
                tokio::time::sleep(delay).await;
                Err(Error::ReplicaUnavailable {
                    addr: addr.to_string(),
                    reason: "dial timed out".to_string(),
                })
            }
            None => self.clients.client_for(addr).await,
        }
    }
}

/// Metrics port keeping everything it is told
#[derive(Default)]
pub struct RecordingMetrics {
    attempts: DashMap<String, u64>,
    failures: DashMap<String, u64>,
    durations: Mutex<Vec<(&'static str, &'static str)>>,
}

impl RecordingMetrics {
    pub fn attempts(&self, addr: &str) -> u64 {
        self.attempts.get(addr).map(|v| *v).unwrap_or(0)
    }

    pub fn failures(&self, addr: &str) -> u64 {
        self.failures.get(addr).map(|v| *v).unwrap_or(0)
    }

    pub fn total_failures(&self) -> u64 {
        self.failures.iter().map(|e| *e.value()).sum()
    }

    /// (method, outcome) of every entry point call
    pub fn durations(&self) -> Vec<(&'static str, &'static str)> {
        self.durations.lock().clone()
    }
}

impl DistributorMetrics for RecordingMetrics {
    fn ingester_query(&self, addr: &str) {
        *self.attempts.entry(addr.to_string()).or_insert(0) += 1;
    }

    fn ingester_query_failure(&self, addr: &str) {
        *self.failures.entry(addr.to_string()).or_insert(0) += 1;
    }

    fn query_duration(&self, method: &'static str, outcome: &'static str, _seconds: f64) {
        self.durations.lock().push((method, outcome));
    }
}
