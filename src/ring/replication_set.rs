//! Replica set snapshot and the quorum executor that fans out over it.

use super::IngesterDesc;
use crate::context::RequestContext;
use crate::{Error, Result};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, warn};

/// The replicas chosen for one query, fixed for its whole duration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplicationSet {
    pub ingesters: Vec<IngesterDesc>,
    /// Failures tolerated before the read is abandoned
    pub max_errors: usize,
}

impl ReplicationSet {
    pub fn new(ingesters: Vec<IngesterDesc>, max_errors: usize) -> Self {
        Self {
            ingesters,
            max_errors,
        }
    }

    pub fn len(&self) -> usize {
        self.ingesters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ingesters.is_empty()
    }

    pub fn includes(&self, addr: &str) -> bool {
        self.ingesters.iter().any(|i| i.addr == addr)
    }

    /// Successes needed before results are returned.
    pub fn min_success(&self) -> usize {
        if self.ingesters.is_empty() {
            return 0;
        }
        self.ingesters.len().saturating_sub(self.max_errors).max(1)
    }

    /// Run `f` once per replica in parallel and wait for quorum.
    ///
    /// The last `max_errors` replicas are only started after `extra_delay`,
    /// or earlier when another replica fails. Returns the first
    /// `min_success()` successful results; outstanding calls are cancelled
    /// through their child context once this returns. Replica outcomes that
    /// are cancellations never count toward `max_errors`.
    pub async fn execute<T, F, Fut>(
        &self,
        ctx: &RequestContext,
        extra_delay: Duration,
        f: F,
    ) -> Result<Vec<T>>
    where
        T: Send + 'static,
        F: Fn(IngesterDesc, RequestContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let min_success = self.min_success();
        if min_success == 0 {
            return Ok(Vec::new());
        }
        let max_errors = self.ingesters.len() - min_success;

        debug!(
            replicas = self.ingesters.len(),
            min_success, max_errors, "Fanning out to replica set"
        );

        let scoped = ctx.child();
        let _cancel_outstanding = scoped.cancel_token().clone().drop_guard();

        let (tx, mut rx) = mpsc::channel(self.ingesters.len());
        let force_start = Arc::new(Semaphore::new(0));
        let f = Arc::new(f);

        for (i, ingester) in self.ingesters.iter().cloned().enumerate() {
            let tx = tx.clone();
            let f = f.clone();
            let ctx = scoped.clone();
            let force_start = force_start.clone();

            tokio::spawn(async move {
                if i >= min_success && !extra_delay.is_zero() {
                    tokio::select! {
                        _ = ctx.done() => return,
                        permit = force_start.acquire() => {
                            if let Ok(permit) = permit {
                                permit.forget();
                            }
                        }
                        _ = tokio::time::sleep(extra_delay) => {}
                    }
                }

                let addr = ingester.addr.clone();
                let result = f(ingester, ctx).await;
                let _ = tx.send((addr, result)).await;
            });
        }
        drop(tx);

        let mut results = Vec::with_capacity(min_success);
        let mut failed = 0usize;
        let mut last_error: Option<Error> = None;

        while results.len() < min_success {
            tokio::select! {
                biased;
                _ = ctx.done() => return Err(Error::Cancelled),
                settled = rx.recv() => match settled {
                    Some((_, Ok(result))) => results.push(result),
                    Some((addr, Err(err))) => {
                        if !err.is_cancelled() {
                            failed += 1;
                            warn!(ingester = %addr, error = %err, "Replica query failed");
                        }
                        if failed > max_errors {
                            return Err(Error::QuorumFailure {
                                failed,
                                max_errors,
                                cause: Box::new(err),
                            });
                        }
                        last_error = Some(err);
                        force_start.add_permits(1);
                    }
                    None => {
                        return Err(Error::QuorumFailure {
                            failed,
                            max_errors,
                            cause: Box::new(last_error.unwrap_or_else(|| {
                                Error::Internal(format!(
                                    "replica calls settled with {} of {} required successes",
                                    results.len(),
                                    min_success
                                ))
                            })),
                        });
                    }
                },
            }
        }

        Ok(results)
    }
}
