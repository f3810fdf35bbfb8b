//! SafeConnect Telemetry - Observability Infrastructure
//!
//! Structured logging and Prometheus metrics for the API layer.

pub mod logging;
pub mod metrics;
pub mod middleware;

pub use logging::{init_tracing, LogConfig, LogFormat};
pub use metrics::{metrics_handler, SafeConnectMetrics, METRICS};
pub use middleware::{normalize_path, observability_middleware};
