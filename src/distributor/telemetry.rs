//! Distributor telemetry port and its OpenTelemetry implementation.

use opentelemetry::global;
use opentelemetry::metrics::{Counter, Histogram, Meter};
use opentelemetry::KeyValue;

pub const METHOD_QUERY: &str = "Distributor.Query";
pub const METHOD_QUERY_STREAM: &str = "Distributor.QueryStream";

pub const OUTCOME_SUCCESS: &str = "success";
pub const OUTCOME_CANCEL: &str = "cancel";
pub const OUTCOME_ERROR: &str = "error";

/// Where the distributor reports per-replica bookkeeping and latency.
pub trait DistributorMetrics: Send + Sync {
    /// One query attempt against an ingester.
    fn ingester_query(&self, addr: &str);

    /// One failed ingester query. Never called for cancellations.
    fn ingester_query_failure(&self, addr: &str);

    /// Latency of one entry point call.
    fn query_duration(&self, method: &'static str, outcome: &'static str, seconds: f64);
}

/// Discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetrics;

impl DistributorMetrics for NoopMetrics {
    fn ingester_query(&self, _addr: &str) {}

    fn ingester_query_failure(&self, _addr: &str) {}

    fn query_duration(&self, _method: &'static str, _outcome: &'static str, _seconds: f64) {}
}

/// Records through OpenTelemetry instruments
pub struct OtelDistributorMetrics {
    ingester_queries: Counter<u64>,
    ingester_query_failures: Counter<u64>,
    query_duration_seconds: Histogram<f64>,
}

impl OtelDistributorMetrics {
    pub fn new(meter: &Meter) -> Self {
        Self {
            ingester_queries: meter
                .u64_counter("replicant.distributor.ingester.queries")
                .with_description("Queries sent to ingesters, by ingester address")
                .init(),
            ingester_query_failures: meter
                .u64_counter("replicant.distributor.ingester.query_failures")
                .with_description("Failed ingester queries excluding cancellations")
                .init(),
            query_duration_seconds: meter
                .f64_histogram("replicant.distributor.query.duration")
                .with_description("Distributor query latency")
                .with_unit("s")
                .init(),
        }
    }

    /// Instruments on the globally installed meter provider.
    pub fn global() -> Self {
        Self::new(&global::meter("replicant.distributor"))
    }
}

impl DistributorMetrics for OtelDistributorMetrics {
    fn ingester_query(&self, addr: &str) {
        self.ingester_queries
            .add(1, &[KeyValue::new("ingester", addr.to_string())]);
    }

    fn ingester_query_failure(&self, addr: &str) {
        self.ingester_query_failures
            .add(1, &[KeyValue::new("ingester", addr.to_string())]);
    }

    fn query_duration(&self, method: &'static str, outcome: &'static str, seconds: f64) {
        self.query_duration_seconds.record(
            seconds,
            &[
                KeyValue::new("method", method),
                KeyValue::new("outcome", outcome),
            ],
        );
    }
}

/// Outcome label for a finished call.
pub fn outcome_of<T>(result: &crate::Result<T>) -> &'static str {
    match result {
        Ok(_) => OUTCOME_SUCCESS,
        Err(e) if e.is_cancelled() => OUTCOME_CANCEL,
        Err(_) => OUTCOME_ERROR,
    }
}
