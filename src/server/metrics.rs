use axum::{http::StatusCode, response::IntoResponse};
use lazy_static::lazy_static;
use prometheus::{
    CounterVec, Encoder, Gauge, HistogramOpts, HistogramVec, IntCounter, Opts, Registry,
    TextEncoder,
};
use std::time::Duration;

/// Metric name prefix for all enrichment server metrics
const PREFIX: &str = "enrichment";

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    // HTTP Request Metrics
    pub static ref HTTP_REQUESTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_http_requests_total"), "Total number of HTTP requests"),
        &["method", "path", "status"]
    ).expect("Failed to create http_requests_total metric");

    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            format!("{PREFIX}_http_request_duration_seconds"),
            "HTTP request duration in seconds"
        )
        .buckets(vec![0.001, 0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0]),
        &["method", "path"]
    ).expect("Failed to create http_request_duration_seconds metric");

    // Orchestration Metrics
    pub static ref ENRICHMENT_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            format!("{PREFIX}_duration_seconds"),
            "Duration of a single entity enrichment"
        )
        .buckets(vec![0.01, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0]),
        &["entity_type"]
    ).expect("Failed to create enrichment_duration_seconds metric");

    pub static ref CAPABILITY_OUTCOMES_TOTAL: CounterVec = CounterVec::new(
        Opts::new(
            format!("{PREFIX}_capability_outcomes_total"),
            "Per-capability enrichment outcomes"
        ),
        &["capability", "outcome"]
    ).expect("Failed to create capability_outcomes_total metric");

    pub static ref PROVIDER_CALLS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_provider_calls_total"), "Calls made to provider agents"),
        &["agent", "result"]
    ).expect("Failed to create provider_calls_total metric");

    // Queue Metrics
    pub static ref QUEUE_ITEMS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_queue_items_total"), "Items processed by the enrichment queue"),
        &["entity_type", "result"]
    ).expect("Failed to create queue_items_total metric");

    pub static ref QUEUE_RUNNING: Gauge = Gauge::new(
        format!("{PREFIX}_queue_running"),
        "1 while a queue session is running"
    ).expect("Failed to create queue_running metric");

    // Notification Bus Metrics
    pub static ref BUS_DROPPED_MESSAGES_TOTAL: IntCounter = IntCounter::new(
        format!("{PREFIX}_bus_dropped_messages_total"),
        "Messages dropped because a subscriber buffer was full"
    ).expect("Failed to create bus_dropped_messages_total metric");

    pub static ref PROCESS_MEMORY_BYTES: Gauge = Gauge::new(
        format!("{PREFIX}_process_memory_bytes"),
        "Process memory usage in bytes"
    ).expect("Failed to create process_memory_bytes metric");
}

/// Initialize all metrics and register them with the Prometheus registry
pub fn init_metrics() {
    // Ignore errors if already registered (for tests)
    let _ = REGISTRY.register(Box::new(HTTP_REQUESTS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(HTTP_REQUEST_DURATION_SECONDS.clone()));
    let _ = REGISTRY.register(Box::new(ENRICHMENT_DURATION_SECONDS.clone()));
    let _ = REGISTRY.register(Box::new(CAPABILITY_OUTCOMES_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(PROVIDER_CALLS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(QUEUE_ITEMS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(QUEUE_RUNNING.clone()));
    let _ = REGISTRY.register(Box::new(BUS_DROPPED_MESSAGES_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(PROCESS_MEMORY_BYTES.clone()));

    tracing::info!("Metrics system initialized successfully");
}

/// Record an HTTP request
pub fn record_http_request(method: &str, path: &str, status: u16, duration: Duration) {
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, path, &status.to_string()])
        .inc();

    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[method, path])
        .observe(duration.as_secs_f64());
}

/// Record one completed orchestration
pub fn record_enrichment(entity_type: &str, duration: Duration) {
    ENRICHMENT_DURATION_SECONDS
        .with_label_values(&[entity_type])
        .observe(duration.as_secs_f64());
}

/// Record the outcome of one capability within an orchestration
pub fn record_capability_outcome(capability: &str, outcome: &str) {
    CAPABILITY_OUTCOMES_TOTAL
        .with_label_values(&[capability, outcome])
        .inc();
}

/// Record a provider agent call (`hit`, `empty`, `error`, `timeout`)
pub fn record_provider_call(agent: &str, result: &str) {
    PROVIDER_CALLS_TOTAL.with_label_values(&[agent, result]).inc();
}

/// Record a processed queue item
pub fn record_queue_item(entity_type: &str, result: &str) {
    QUEUE_ITEMS_TOTAL
        .with_label_values(&[entity_type, result])
        .inc();
}

pub fn set_queue_running(running: bool) {
    QUEUE_RUNNING.set(if running { 1.0 } else { 0.0 });
}

pub fn record_bus_message_dropped() {
    BUS_DROPPED_MESSAGES_TOTAL.inc();
}

/// Update process memory usage
pub fn update_memory_usage() {
    #[cfg(target_os = "linux")]
    {
        if let Ok(status) = std::fs::read_to_string("/proc/self/status") {
            for line in status.lines() {
                if line.starts_with("VmRSS:") {
                    // RSS is reported in kB
                    if let Some(kb) = line
                        .split_whitespace()
                        .nth(1)
                        .and_then(|s| s.parse::<f64>().ok())
                    {
                        PROCESS_MEMORY_BYTES.set(kb * 1024.0);
                    }
                    return;
                }
            }
        }
    }
}

/// Handler for the /metrics endpoint
pub async fn metrics_handler() -> impl IntoResponse {
    update_memory_usage();

    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();

    let mut buffer = vec![];
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => {
            let response = String::from_utf8(buffer).unwrap_or_default();
            (StatusCode::OK, response)
        }
        Err(e) => {
            tracing::error!("Failed to encode metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to encode metrics: {}", e),
            )
        }
    }
}
