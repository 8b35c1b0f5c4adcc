//! Metric names and descriptions.
//!
//! The crate records through the `metrics` facade only. Installing an
//! exporter is left to the host application.

/// Cache lookups that hit.
pub const CACHE_HITS: &str = "mnemo_cache_hits_total";
/// Cache lookups that missed.
pub const CACHE_MISSES: &str = "mnemo_cache_misses_total";
/// Cache entries evicted to make room.
pub const CACHE_EVICTIONS: &str = "mnemo_cache_evictions_total";
/// Current cache size.
pub const CACHE_SIZE: &str = "mnemo_cache_size";
/// Retrieval calls by status.
pub const RETRIEVAL_TOTAL: &str = "mnemo_retrieval_total";
/// Retrieval latency.
pub const RETRIEVAL_DURATION_MS: &str = "mnemo_retrieval_duration_ms";
/// Memories packed per retrieval.
pub const RETRIEVAL_PACKED: &str = "mnemo_retrieval_packed";
/// Consolidated records by phase.
pub const CONSOLIDATION_RECORDS: &str = "mnemo_consolidation_records_total";
/// Consolidation latency.
pub const CONSOLIDATION_DURATION_MS: &str = "mnemo_consolidation_duration_ms";
/// Predictions returned.
pub const PREDICTIONS_TOTAL: &str = "mnemo_predictions_total";
/// Causal edges proposed by inference.
pub const INFERRED_EDGES: &str = "mnemo_inferred_edges_total";
/// Storage calls made by graph traversals.
pub const TRAVERSAL_STORAGE_CALLS: &str = "mnemo_traversal_storage_calls_total";

/// Registers descriptions for every metric with the installed recorder.
///
/// Safe to call more than once; without a recorder it does nothing.
pub fn describe_metrics() {
    metrics::describe_counter!(CACHE_HITS, "L1 cache lookups that found the key");
    metrics::describe_counter!(CACHE_MISSES, "L1 cache lookups that missed");
    metrics::describe_counter!(CACHE_EVICTIONS, "L1 cache entries evicted at capacity");
    metrics::describe_gauge!(CACHE_SIZE, "Current number of L1 cache entries");
    metrics::describe_counter!(RETRIEVAL_TOTAL, "Retrieval calls by status");
    metrics::describe_histogram!(
        RETRIEVAL_DURATION_MS,
        metrics::Unit::Milliseconds,
        "Retrieval latency"
    );
    metrics::describe_histogram!(RETRIEVAL_PACKED, "Memories packed into one retrieval response");
    metrics::describe_counter!(CONSOLIDATION_RECORDS, "Records touched by consolidation, by phase");
    metrics::describe_histogram!(
        CONSOLIDATION_DURATION_MS,
        metrics::Unit::Milliseconds,
        "Consolidation run latency"
    );
    metrics::describe_counter!(PREDICTIONS_TOTAL, "Predicted memories returned");
    metrics::describe_counter!(INFERRED_EDGES, "Causal edges proposed by inference");
    metrics::describe_counter!(
        TRAVERSAL_STORAGE_CALLS,
        "Causal storage calls issued by traversals"
    );
}
