//! Ingester clients
//!
//! Transport is out of scope here: a client is anything that can answer a
//! legacy query or open a streaming query. [`ClientPool`] resolves a
//! replica address to a client.

mod memory;

pub use memory::MemoryIngester;

use crate::context::RequestContext;
use crate::model::{QueryRequest, QueryResponse, QueryStreamResponse};
use crate::{Error, Result};
use async_trait::async_trait;
use dashmap::DashMap;
use futures::stream::BoxStream;
use std::sync::Arc;

/// Partial responses of a streaming query. The stream ending is the
/// end-of-stream signal; dropping it releases the call.
pub type QueryStream = BoxStream<'static, Result<QueryStreamResponse>>;

/// Calls a single replica
#[async_trait]
pub trait IngesterClient: Send + Sync {
    /// Legacy sample-based query.
    async fn query(&self, ctx: &RequestContext, req: &QueryRequest) -> Result<QueryResponse>;

    /// Open a streaming query.
    async fn query_stream(&self, ctx: &RequestContext, req: &QueryRequest)
        -> Result<QueryStream>;
}

/// Resolves replica addresses to clients
#[async_trait]
pub trait ClientPool: Send + Sync {
    async fn client_for(&self, addr: &str) -> Result<Arc<dyn IngesterClient>>;
}

/// Pool over a fixed address -> client map
#[derive(Default)]
pub struct StaticClientPool {
    clients: DashMap<String, Arc<dyn IngesterClient>>,
}

impl StaticClientPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, addr: impl Into<String>, client: Arc<dyn IngesterClient>) {
        self.clients.insert(addr.into(), client);
    }

    pub fn remove(&self, addr: &str) -> Option<Arc<dyn IngesterClient>> {
        self.clients.remove(addr).map(|(_, client)| client)
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

#[async_trait]
impl ClientPool for StaticClientPool {
    async fn client_for(&self, addr: &str) -> Result<Arc<dyn IngesterClient>> {
        self.clients
            .get(addr)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| Error::ReplicaUnavailable {
                addr: addr.to_string(),
                reason: "no client registered for address".to_string(),
            })
    }
}
