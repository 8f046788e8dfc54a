//! Observability for the feed service
//!
//! Structured logging, process-wide metrics and the health check server.

pub mod health;
pub mod logging;
pub mod metrics;

// Re-export for convenience
pub use health::HealthServer;
pub use logging::{init_logging, init_logging_from_env, LogFormat, LogSettings};
pub use metrics::{metrics, MetricsCollector, MetricsSnapshot, RequestOutcome};

// Span macros for structured logging
pub use logging::{feed_request_span, upstream_span};
