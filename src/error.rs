//! Error types for Replicant

use std::fmt;

/// Result type alias for Replicant operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for Replicant
#[derive(Debug)]
pub enum Error {
    /// No tenant (org) id in the request context
    MissingTenant,
    /// Malformed time range or matcher
    InvalidRequest(String),
    /// Client acquisition or transport failure for one replica
    ReplicaUnavailable { addr: String, reason: String },
    /// Mid-stream failure from one replica (not a cancellation)
    ReplicaStream { addr: String, reason: String },
    /// Caller cancelled the request or its deadline passed
    Cancelled,
    /// Too many replicas failed to satisfy the read quorum
    QuorumFailure {
        failed: usize,
        max_errors: usize,
        cause: Box<Error>,
    },
    /// Internal error while combining replica results
    MergeFailure(String),
    /// Membership lookup failed
    Ring(String),
    /// Storage-layer wrapper surfaced by the distributor entry points
    Storage(Box<Error>),
    /// Configuration errors
    Config(String),
    /// IO errors
    Io(std::io::Error),
    /// Serialization errors
    Serialization(String),
    /// Internal error
    Internal(String),
}

impl Error {
    /// True for cancellation, including when wrapped as a storage error.
    pub fn is_cancelled(&self) -> bool {
        match self {
            Error::Cancelled => true,
            Error::Storage(inner) => inner.is_cancelled(),
            _ => false,
        }
    }

    /// Wrap for the downstream query engine. Cancellation stays a
    /// cancellation and already-wrapped errors are not wrapped twice.
    pub fn into_storage(self) -> Self {
        match self {
            Error::Cancelled | Error::Storage(_) => self,
            other => Error::Storage(Box::new(other)),
        }
    }

    /// Strip the storage wrapper, if any.
    pub fn root(&self) -> &Error {
        match self {
            Error::Storage(inner) => inner.root(),
            other => other,
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Storage(e) => Some(e.as_ref()),
            Error::QuorumFailure { cause, .. } => Some(cause.as_ref()),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::MissingTenant => write!(f, "no org id in request context"),
            Error::InvalidRequest(msg) => write!(f, "Invalid request: {}", msg),
            Error::ReplicaUnavailable { addr, reason } => {
                write!(f, "Ingester {} unavailable: {}", addr, reason)
            }
            Error::ReplicaStream { addr, reason } => {
                write!(f, "Stream from ingester {} failed: {}", addr, reason)
            }
            Error::Cancelled => write!(f, "Request cancelled"),
            Error::QuorumFailure {
                failed,
                max_errors,
                cause,
            } => write!(
                f,
                "Quorum not reached: {} replicas failed (max {}), last error: {}",
                failed, max_errors, cause
            ),
            Error::MergeFailure(msg) => write!(f, "Merge error: {}", msg),
            Error::Ring(msg) => write!(f, "Ring error: {}", msg),
            Error::Storage(e) => write!(f, "Storage error: {}", e),
            Error::Config(msg) => write!(f, "Configuration error: {}", msg),
            Error::Io(e) => write!(f, "IO error: {}", e),
            Error::Serialization(msg) => write!(f, "Serialization error: {}", msg),
            Error::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<regex::Error> for Error {
    fn from(e: regex::Error) -> Self {
        Error::InvalidRequest(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_wrapping_keeps_cancellation() {
        let err = Error::Cancelled.into_storage();
        assert!(matches!(err, Error::Cancelled));
        assert!(err.is_cancelled());
    }

    #[test]
    fn test_storage_wrapping_is_idempotent() {
        let err = Error::MissingTenant.into_storage().into_storage();
        match &err {
            Error::Storage(inner) => assert!(matches!(inner.as_ref(), Error::MissingTenant)),
            other => panic!("expected storage error, got {other:?}"),
        }
        assert!(matches!(err.root(), Error::MissingTenant));
    }

    #[test]
    fn test_quorum_failure_display_includes_cause() {
        let err = Error::QuorumFailure {
            failed: 2,
            max_errors: 1,
            cause: Box::new(Error::ReplicaUnavailable {
                addr: "ing-2:9095".to_string(),
                reason: "connection refused".to_string(),
            }),
        };
        let msg = err.to_string();
        assert!(msg.contains("2 replicas failed"));
        assert!(msg.contains("ing-2:9095"));
    }
}
