//! Metrics instrumentation for run observability.

use std::time::Instant;

pub const PROVIDER_LATENCY: &str = "provider_round_trip_latency";
pub const TOOL_LATENCY: &str = "tool_dispatch_latency";
pub const RUN_DURATION: &str = "run_duration";

/// Record provider round trip latency, retries included.
pub fn record_provider_latency(duration_ms: f64) {
    metrics::histogram!(PROVIDER_LATENCY, duration_ms);
}

/// Record tool dispatch latency.
pub fn record_tool_latency(duration_ms: f64) {
    metrics::histogram!(TOOL_LATENCY, duration_ms);
}

/// Record total run duration.
pub fn record_run_duration(duration_ms: f64) {
    metrics::histogram!(RUN_DURATION, duration_ms);
}

/// Count stripped screenshots.
pub fn increment_compaction_count(removed: usize) {
    metrics::counter!("compaction_removed_images", removed as u64);
}

pub fn increment_transport_retries(retries: usize) {
    metrics::counter!("transport_retries", retries as u64);
}

pub fn increment_run_outcome(outcome: &'static str) {
    metrics::counter!("run_outcome", 1, "outcome" => outcome);
}

/// RAII timer for automatic metric recording.
pub struct MetricTimer {
    start: Instant,
    metric_name: &'static str,
}

impl MetricTimer {
    pub fn new(metric_name: &'static str) -> Self {
        Self {
            start: Instant::now(),
            metric_name,
        }
    }
}

impl Drop for MetricTimer {
    fn drop(&mut self) {
        let duration_ms = self.start.elapsed().as_secs_f64() * 1000.0;
        match self.metric_name {
            PROVIDER_LATENCY => record_provider_latency(duration_ms),
            TOOL_LATENCY => record_tool_latency(duration_ms),
            RUN_DURATION => record_run_duration(duration_ms),
            _ => {}
        }
    }
}
