//! Metrics and observability utilities
//!
//! Provides Prometheus metrics with standardized naming conventions
//! for the query, ingestion, and model-call paths.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};
use std::time::Instant;

/// Metrics prefix for all Bifrost metrics
pub const METRICS_PREFIX: &str = "bifrost";

/// Histogram buckets for request latency (in seconds)
pub const LATENCY_BUCKETS: &[f64] = &[
    0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.000, 2.500, 5.000, 10.00, 30.00,
];

/// Register all metric descriptions
pub fn register_metrics() {
    // Request metrics
    describe_counter!(
        format!("{}_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of HTTP requests"
    );

    describe_histogram!(
        format!("{}_request_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "HTTP request latency in seconds"
    );

    // Query metrics
    describe_counter!(
        format!("{}_queries_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of hybrid queries, labeled by route"
    );

    describe_histogram!(
        format!("{}_query_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Query latency in seconds, labeled by route"
    );

    // Routing metrics
    describe_counter!(
        format!("{}_routing_decisions_total", METRICS_PREFIX),
        Unit::Count,
        "Routing decisions, labeled by route and whether the default was applied"
    );

    // Ingestion metrics
    describe_counter!(
        format!("{}_chunks_ingested_total", METRICS_PREFIX),
        Unit::Count,
        "Total chunks embedded and upserted"
    );

    describe_counter!(
        format!("{}_chunks_failed_total", METRICS_PREFIX),
        Unit::Count,
        "Total chunks skipped due to embedding or upsert failure"
    );

    describe_counter!(
        format!("{}_triples_extracted_total", METRICS_PREFIX),
        Unit::Count,
        "Total triples merged into the graph store"
    );

    describe_histogram!(
        format!("{}_ingestion_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Ingestion batch latency in seconds"
    );

    // Model call metrics
    describe_counter!(
        format!("{}_llm_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total chat model completion requests"
    );

    describe_histogram!(
        format!("{}_llm_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Chat model completion latency in seconds"
    );

    describe_counter!(
        format!("{}_embedding_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total embedding API requests"
    );

    describe_histogram!(
        format!("{}_embedding_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Embedding generation latency in seconds"
    );

    // Store metrics
    describe_gauge!(
        format!("{}_vector_store_records", METRICS_PREFIX),
        Unit::Count,
        "Records reported by the vector store at last count"
    );

    tracing::info!("Metrics registered");
}

/// Helper to record request metrics
pub struct RequestMetrics {
    start: Instant,
    endpoint: String,
    method: String,
}

impl RequestMetrics {
    /// Start tracking a request
    pub fn start(method: &str, endpoint: &str) -> Self {
        Self {
            start: Instant::now(),
            endpoint: endpoint.to_string(),
            method: method.to_string(),
        }
    }

    /// Record request completion
    pub fn finish(self, status: u16) {
        let duration = self.start.elapsed().as_secs_f64();

        counter!(
            format!("{}_requests_total", METRICS_PREFIX),
            "method" => self.method.clone(),
            "endpoint" => self.endpoint.clone(),
            "status" => status.to_string()
        )
        .increment(1);

        histogram!(
            format!("{}_request_duration_seconds", METRICS_PREFIX),
            "method" => self.method,
            "endpoint" => self.endpoint
        )
        .record(duration);
    }
}

/// Helper to record query metrics
pub fn record_query(duration_secs: f64, route: &str, source_count: usize) {
    counter!(
        format!("{}_queries_total", METRICS_PREFIX),
        "route" => route.to_string()
    )
    .increment(1);

    histogram!(
        format!("{}_query_duration_seconds", METRICS_PREFIX),
        "route" => route.to_string()
    )
    .record(duration_secs);

    gauge!(
        format!("{}_query_sources_count", METRICS_PREFIX),
        "route" => route.to_string()
    )
    .set(source_count as f64);
}

/// Helper to record routing decisions
pub fn record_routing(route: &str, defaulted: bool) {
    counter!(
        format!("{}_routing_decisions_total", METRICS_PREFIX),
        "route" => route.to_string(),
        "defaulted" => defaulted.to_string()
    )
    .increment(1);
}

/// Helper to record ingestion metrics
pub fn record_ingestion(duration_secs: f64, chunks: usize, failed: usize, triples: usize) {
    counter!(format!("{}_chunks_ingested_total", METRICS_PREFIX)).increment(chunks as u64);
    counter!(format!("{}_chunks_failed_total", METRICS_PREFIX)).increment(failed as u64);
    counter!(format!("{}_triples_extracted_total", METRICS_PREFIX)).increment(triples as u64);

    histogram!(format!("{}_ingestion_duration_seconds", METRICS_PREFIX)).record(duration_secs);
}

/// Helper to record chat model call metrics
pub fn record_llm_call(duration_secs: f64, model: &str, success: bool) {
    let status = if success { "success" } else { "error" };

    counter!(
        format!("{}_llm_requests_total", METRICS_PREFIX),
        "model" => model.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    if success {
        histogram!(
            format!("{}_llm_duration_seconds", METRICS_PREFIX),
            "model" => model.to_string()
        )
        .record(duration_secs);
    }
}

/// Helper to record embedding call metrics
pub fn record_embedding(duration_secs: f64, model: &str, batch_size: usize, success: bool) {
    let status = if success { "success" } else { "error" };

    counter!(
        format!("{}_embedding_requests_total", METRICS_PREFIX),
        "model" => model.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    if success {
        histogram!(
            format!("{}_embedding_duration_seconds", METRICS_PREFIX),
            "model" => model.to_string(),
            "batch" => batch_size.to_string()
        )
        .record(duration_secs);
    }
}
