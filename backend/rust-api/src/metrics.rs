use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, Encoder,
    HistogramVec, IntCounter, IntCounterVec, TextEncoder,
};

lazy_static! {
    // HTTP Metrics
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "http_requests_total",
        "Total number of HTTP requests",
        &["method", "path", "status"]
    )
    .unwrap();

    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "http_request_duration_seconds",
        "HTTP request duration in seconds",
        &["method", "path"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .unwrap();

    // Business Metrics
    pub static ref LOGINS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "logins_total",
        "Login attempts by outcome",
        &["outcome"]
    )
    .unwrap();

    pub static ref RESULTS_SUBMITTED_TOTAL: IntCounter = register_int_counter!(
        "results_submitted_total",
        "Total number of exam results submitted"
    )
    .unwrap();

    pub static ref USERS_IMPORTED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "users_imported_total",
        "CSV import rows by outcome",
        &["outcome"]
    )
    .unwrap();

    pub static ref CHEATING_VIOLATIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "cheating_violations_total",
        "Proctoring screenshots recorded by violation type",
        &["violation_type"]
    )
    .unwrap();

    pub static ref CODE_RUNS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "code_runs_total",
        "Code executions by language and outcome",
        &["language", "status"]
    )
    .unwrap();

    pub static ref EXPORTS_GENERATED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "exports_generated_total",
        "Total number of exports generated",
        &["format"]
    )
    .unwrap();
}

/// Renders all metrics in Prometheus text format
pub fn render_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer)
        .map_err(|e| prometheus::Error::Msg(format!("Failed to convert metrics to UTF-8: {}", e)))
}
