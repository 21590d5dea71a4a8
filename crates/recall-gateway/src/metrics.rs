//! Prometheus metrics for the Recall gateway.

use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_gauge_vec, register_histogram_vec, CounterVec, Encoder, GaugeVec, HistogramVec,
    TextEncoder,
};
use tracing::warn;

lazy_static! {
    // ============================================================================
    // Indexing Metrics
    // ============================================================================

    /// Change events handled, by stream (messages/documents), event type and outcome
    pub static ref EVENTS_TOTAL: CounterVec = register_counter_vec!(
        "recall_events_total",
        "Change events handled",
        &["stream", "event", "outcome"]
    ).unwrap();

    /// Documents reaching a terminal embedding status
    pub static ref DOCUMENT_STATUS_TOTAL: CounterVec = register_counter_vec!(
        "recall_document_status_total",
        "Documents reaching a terminal embedding status",
        &["status", "reason"]
    ).unwrap();

    /// Time to handle one change event end to end
    pub static ref INDEXING_LATENCY: HistogramVec = register_histogram_vec!(
        "recall_indexing_latency_seconds",
        "Change event handling latency in seconds",
        &["stream"],
        vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]
    ).unwrap();

    // ============================================================================
    // Question Metrics
    // ============================================================================

    /// Questions answered, by kind (open/persona) and outcome
    pub static ref QUESTIONS_TOTAL: CounterVec = register_counter_vec!(
        "recall_questions_total",
        "Questions handled",
        &["kind", "outcome"]
    ).unwrap();

    /// Retrieval plus generation latency per question
    pub static ref QUESTION_LATENCY: HistogramVec = register_histogram_vec!(
        "recall_question_latency_seconds",
        "Question answering latency in seconds",
        &["kind"],
        vec![0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]
    ).unwrap();

    // ============================================================================
    // System Metrics
    // ============================================================================

    /// Build info
    pub static ref BUILD_INFO: GaugeVec =
        register_gauge_vec!("recall_build_info", "Build information", &["version", "commit"]).unwrap();
}

/// Initialize metrics with build info
pub fn init_metrics() {
    BUILD_INFO
        .with_label_values(&[
            env!("CARGO_PKG_VERSION"),
            option_env!("GIT_COMMIT_SHA").unwrap_or("unknown"),
        ])
        .set(1.0);
}

/// Export metrics in Prometheus text format
pub fn export() -> String {
    let mut buffer = Vec::new();
    if let Err(e) = TextEncoder::new().encode(&prometheus::gather(), &mut buffer) {
        warn!(error = %e, "Failed to encode metrics");
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_can_be_exported() {
        EVENTS_TOTAL.with_label_values(&["messages", "create", "indexed"]).inc();
        QUESTIONS_TOTAL.with_label_values(&["open", "answered"]).inc();

        let exported = export();
        assert!(exported.contains("recall_events_total"));
        assert!(exported.contains("recall_questions_total"));
    }
}
