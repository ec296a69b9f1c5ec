//! Per-request context: tenant identity, cancellation and deadline.

use crate::{Error, Result};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Request-scoped state handed to every replica call.
#[derive(Debug, Clone)]
pub struct RequestContext {
    org_id: Option<String>,
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl RequestContext {
    /// Context for a tenant.
    pub fn for_tenant(org_id: impl Into<String>) -> Self {
        Self {
            org_id: Some(org_id.into()),
            cancel: CancellationToken::new(),
            deadline: None,
        }
    }

    /// Context without a tenant. Queries on it fail with `MissingTenant`.
    pub fn anonymous() -> Self {
        Self {
            org_id: None,
            cancel: CancellationToken::new(),
            deadline: None,
        }
    }

    /// Use the caller's token so cancelling it aborts this request.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Deadline `timeout` from now. A timeout too large to put on the clock
    /// leaves the context without one.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.with_deadline(deadline),
            None => self,
        }
    }

    /// Set a deadline. An earlier existing deadline wins.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(current) => current.min(deadline),
            None => deadline,
        });
        self
    }

    /// Extract the tenant id.
    pub fn org_id(&self) -> Result<&str> {
        match self.org_id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => Ok(id),
            _ => Err(Error::MissingTenant),
        }
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Derive a context that is cancelled with this one but can also be
    /// cancelled on its own without affecting the parent.
    pub fn child(&self) -> Self {
        Self {
            org_id: self.org_id.clone(),
            cancel: self.cancel.child_token(),
            deadline: self.deadline,
        }
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Resolves once the request is cancelled or its deadline passes.
    pub async fn done(&self) {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = self.cancel.cancelled() => {}
                    _ = tokio::time::sleep_until(deadline) => {}
                }
            }
            None => self.cancel.cancelled().await,
        }
    }

    pub fn is_done(&self) -> bool {
        self.cancel.is_cancelled()
            || self
                .deadline
                .map(|deadline| Instant::now() >= deadline)
                .unwrap_or(false)
    }
}
