use axum::{http::StatusCode, response::IntoResponse};
use lazy_static::lazy_static;
use prometheus::{
    CounterVec, Encoder, GaugeVec, Histogram, HistogramOpts, HistogramVec, Opts, Registry,
    TextEncoder,
};
use std::time::Duration;

/// Metric name prefix for all similarity server metrics
const PREFIX: &str = "similarity";

lazy_static! {
    // Global Prometheus registry
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
        .buckets(vec![0.001, 0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 60.0]),
        &["method", "path"]
    ).expect("Failed to create http_request_duration_seconds metric");

    // Similarity pipeline metrics
    pub static ref SIMILARITY_REQUESTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_requests_total"), "Similar-artists requests by mode and outcome"),
        &["mode", "outcome"]
    ).expect("Failed to create requests_total metric");

    pub static ref CALCULATION_TRIGGERS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_calculation_triggers_total"), "Calculator invocations by calculator and outcome"),
        &["calculator", "outcome"]
    ).expect("Failed to create calculation_triggers_total metric");

    pub static ref CALCULATION_WAIT_SECONDS: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            format!("{PREFIX}_calculation_wait_seconds"),
            "Time spent triggering and waiting for a calculation"
        )
        .buckets(vec![0.01, 0.1, 0.5, 1.0, 5.0, 15.0, 30.0, 60.0, 120.0])
    ).expect("Failed to create calculation_wait_seconds metric");

    pub static ref LOOKUP_DURATION_SECONDS: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            format!("{PREFIX}_lookup_duration_seconds"),
            "Nearest-neighbor lookup duration in seconds"
        )
        .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0])
    ).expect("Failed to create lookup_duration_seconds metric");

    pub static ref STORE_ITEMS_TOTAL: GaugeVec = GaugeVec::new(
        Opts::new(format!("{PREFIX}_store_items_total"), "Rows in the similarity store"),
        &["type"]
    ).expect("Failed to create store_items_total metric");
}

/// Initialize all metrics and register them with the Prometheus registry
pub fn init_metrics() {
    // Ignore errors if already registered (for tests)
    let _ = REGISTRY.register(Box::new(HTTP_REQUESTS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(HTTP_REQUEST_DURATION_SECONDS.clone()));
    let _ = REGISTRY.register(Box::new(SIMILARITY_REQUESTS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(CALCULATION_TRIGGERS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(CALCULATION_WAIT_SECONDS.clone()));
    let _ = REGISTRY.register(Box::new(LOOKUP_DURATION_SECONDS.clone()));
    let _ = REGISTRY.register(Box::new(STORE_ITEMS_TOTAL.clone()));

    tracing::info!("Metrics system initialized successfully");
}

/// Publish the row counts of the similarity store
pub fn set_store_items(artists: usize, embeddings: usize, similarity_records: usize) {
    STORE_ITEMS_TOTAL
        .with_label_values(&["artist"])
        .set(artists as f64);
    STORE_ITEMS_TOTAL
        .with_label_values(&["embedding"])
        .set(embeddings as f64);
    STORE_ITEMS_TOTAL
        .with_label_values(&["similarity"])
        .set(similarity_records as f64);
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

/// Record the outcome of a similar-artists request
pub fn record_similarity_request(mode: &str, outcome: &str) {
    SIMILARITY_REQUESTS_TOTAL
        .with_label_values(&[mode, outcome])
        .inc();
}

/// Record a calculator invocation and how long the caller waited on it
pub fn record_calculation_trigger(calculator: &str, outcome: &str, waited: Duration) {
    CALCULATION_TRIGGERS_TOTAL
        .with_label_values(&[calculator, outcome])
        .inc();
    CALCULATION_WAIT_SECONDS.observe(waited.as_secs_f64());
}

pub fn record_lookup(duration: Duration) {
    LOOKUP_DURATION_SECONDS.observe(duration.as_secs_f64());
}

/// Collapse request paths into a bounded set of metric labels.
pub fn categorize_endpoint(path: &str) -> &'static str {
    match path {
        "/" => "home",
        "/v1/similar-artists" => "similar_artists",
        "/v1/similarities/calculate" => "calculate",
        _ => "other",
    }
}

/// Handler for the /metrics endpoint
pub async fn metrics_handler() -> impl IntoResponse {
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
