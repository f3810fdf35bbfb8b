//! Prometheus Metrics Definitions
//!
//! Defines all SafeConnect metrics with appropriate labels and types.
//! Exposes a /metrics endpoint for Prometheus scraping.

use axum::{http::StatusCode, response::IntoResponse};
use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_gauge, register_histogram_vec, CounterVec, Encoder, Gauge,
    HistogramVec, TextEncoder,
};

/// HTTP request latency buckets (seconds)
/// Covers: 1ms, 5ms, 10ms, 25ms, 50ms, 100ms, 250ms, 500ms, 1s, 2.5s, 5s, 10s
const HTTP_LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0, 2.5, 5.0, 10.0,
];

/// Fan-out latency buckets (seconds), bounded above by the per-call timeout
const DISPATCH_LATENCY_BUCKETS: &[f64] = &[0.050, 0.100, 0.250, 0.500, 1.0, 2.5, 5.0, 10.0, 30.0];

/// Global metrics instance - initialized on first use
pub static METRICS: Lazy<SafeConnectMetrics> = Lazy::new(|| {
    SafeConnectMetrics::new().expect("metric definitions are static and valid")
});

/// Container for all SafeConnect metrics.
#[derive(Clone)]
pub struct SafeConnectMetrics {
    /// HTTP request counter - labels: method, path, status
    pub http_requests_total: CounterVec,

    /// HTTP request duration histogram - labels: method, path
    pub http_request_duration_seconds: HistogramVec,

    /// Gateway calls - labels: channel, outcome (delivered/failed/skipped)
    pub notifications_total: CounterVec,

    /// Alerts dispatched - labels: type, status
    pub alerts_dispatched_total: CounterVec,

    /// Whole fan-out duration - labels: type
    pub dispatch_duration_seconds: HistogramVec,

    /// Escalations fired - labels: source (timer/recovery/manual)
    pub escalations_total: CounterVec,

    /// Deadlines currently armed in the escalation engine
    pub armed_timers: Gauge,

    /// Verification checks - labels: outcome
    pub verification_outcomes_total: CounterVec,
}

impl SafeConnectMetrics {
    /// Create and register all metrics with Prometheus.
    pub fn new() -> Result<Self, prometheus::Error> {
        Ok(Self {
            http_requests_total: register_counter_vec!(
                "safeconnect_http_requests_total",
                "Total number of HTTP requests",
                &["method", "path", "status"]
            )?,

            http_request_duration_seconds: register_histogram_vec!(
                "safeconnect_http_request_duration_seconds",
                "HTTP request duration in seconds",
                &["method", "path"],
                HTTP_LATENCY_BUCKETS.to_vec()
            )?,

            notifications_total: register_counter_vec!(
                "safeconnect_notifications_total",
                "Notification gateway calls by channel and outcome",
                &["channel", "outcome"]
            )?,

            alerts_dispatched_total: register_counter_vec!(
                "safeconnect_alerts_dispatched_total",
                "Alerts dispatched by type and overall delivery status",
                &["type", "status"]
            )?,

            dispatch_duration_seconds: register_histogram_vec!(
                "safeconnect_dispatch_duration_seconds",
                "Time to fan an alert out to every contact",
                &["type"],
                DISPATCH_LATENCY_BUCKETS.to_vec()
            )?,

            escalations_total: register_counter_vec!(
                "safeconnect_escalations_total",
                "Overdue escalations fired by source",
                &["source"]
            )?,

            armed_timers: register_gauge!(
                "safeconnect_armed_timers",
                "Journey deadlines currently armed"
            )?,

            verification_outcomes_total: register_counter_vec!(
                "safeconnect_verification_outcomes_total",
                "Verification code checks by outcome",
                &["outcome"]
            )?,
        })
    }

    /// Record an HTTP request.
    pub fn record_http_request(&self, method: &str, path: &str, status: u16, duration_secs: f64) {
        let status_str = status.to_string();
        self.http_requests_total
            .with_label_values(&[method, path, &status_str])
            .inc();
        self.http_request_duration_seconds
            .with_label_values(&[method, path])
            .observe(duration_secs);
    }

    /// Record one gateway call.
    pub fn record_notification(&self, channel: &str, outcome: &str) {
        self.notifications_total
            .with_label_values(&[channel, outcome])
            .inc();
    }

    /// Record a completed fan-out.
    pub fn record_dispatch(&self, alert_type: &str, status: &str, duration_secs: f64) {
        self.alerts_dispatched_total
            .with_label_values(&[alert_type, status])
            .inc();
        self.dispatch_duration_seconds
            .with_label_values(&[alert_type])
            .observe(duration_secs);
    }

    pub fn record_escalation(&self, source: &str) {
        self.escalations_total.with_label_values(&[source]).inc();
    }

    pub fn set_armed_timers(&self, count: usize) {
        self.armed_timers.set(count as f64);
    }

    pub fn record_verification(&self, outcome: &str) {
        self.verification_outcomes_total
            .with_label_values(&[outcome])
            .inc();
    }
}

/// Handler for GET /metrics endpoint.
///
/// Returns Prometheus text format metrics.
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/metrics",
    tag = "Observability",
    responses(
        (status = 200, description = "Prometheus metrics in text format", content_type = "text/plain"),
        (status = 500, description = "Failed to encode metrics"),
    ),
))]
pub async fn metrics_handler() -> impl IntoResponse {
    // Touch the registry so an idle process still exports its series
    Lazy::force(&METRICS);

    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    match encoder.encode(&metric_families, &mut buffer) {
        Ok(_) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        ),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [("content-type", "text/plain")],
                format!("Failed to encode metrics: {}", e).into_bytes(),
            )
        }
    }
}
