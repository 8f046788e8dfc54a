//! Health check HTTP server for container orchestration
//!
//! Runs on its own port so that every path on the feed port stays available
//! as an author slug.

use crate::observability::metrics::{current_timestamp, metrics};
use serde::Serialize;
use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use warp::http::StatusCode;
use warp::{Filter, Rejection, Reply};

/// Seconds after which an unanswered upstream failure marks the service degraded
const UPSTREAM_FAILURE_WINDOW_SECONDS: u64 = 300;

/// HTTP health check server
pub struct HealthServer {
    service_name: String,
    addr: SocketAddr,
    feed_listening: AtomicBool,
    last_live_load: AtomicU64,
    last_upstream_failure: AtomicU64,
}

impl HealthServer {
    /// Create new health server
    pub fn new(service_name: impl Into<String>, addr: SocketAddr) -> Self {
        Self {
            service_name: service_name.into(),
            addr,
            feed_listening: AtomicBool::new(false),
            last_live_load: AtomicU64::new(0),
            last_upstream_failure: AtomicU64::new(0),
        }
    }

    /// Update whether the feed listener accepts connections
    pub fn set_feed_listening(&self, listening: bool) {
        self.feed_listening.store(listening, Ordering::Relaxed);
    }

    /// Record the result of a live upstream load
    pub fn record_upstream_result(&self, success: bool) {
        let target = if success {
            &self.last_live_load
        } else {
            &self.last_upstream_failure
        };
        target.store(current_timestamp(), Ordering::Relaxed);
    }

    /// Warp filter serving every health endpoint
    pub fn routes(
        self: Arc<Self>,
    ) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
        let health_server = self.clone();
        let ready_server = self.clone();

        // GET /health - comprehensive health status
        let health_route = warp::path("health")
            .and(warp::path::end())
            .and(warp::get())
            .and_then(move || {
                let server = health_server.clone();
                async move {
                    let status = server.get_health_status();
                    let status_code = if status.status == "healthy" {
                        StatusCode::OK
                    } else {
                        StatusCode::SERVICE_UNAVAILABLE
                    };
                    Ok::<_, Infallible>(warp::reply::with_status(
                        warp::reply::json(&status),
                        status_code,
                    ))
                }
            });

        // GET /metrics - complete metrics export
        let metrics_route = warp::path("metrics")
            .and(warp::path::end())
            .and(warp::get())
            .map(|| warp::reply::json(&metrics().get_metrics()));

        // GET /ready - readiness probe
        let ready_route = warp::path("ready")
            .and(warp::path::end())
            .and(warp::get())
            .map(move || {
                let ready = ready_server.feed_listening.load(Ordering::Relaxed);
                let response = ReadinessResponse {
                    ready,
                    timestamp: current_timestamp(),
                };
                let status_code = if ready {
                    StatusCode::OK
                } else {
                    StatusCode::SERVICE_UNAVAILABLE
                };
                warp::reply::with_status(warp::reply::json(&response), status_code)
            });

        // GET /live - liveness probe
        let live_route = warp::path("live")
            .and(warp::path::end())
            .and(warp::get())
            .map(|| {
                warp::reply::json(&LivenessResponse {
                    alive: true,
                    timestamp: current_timestamp(),
                })
            });

        // GET / - API documentation
        let root_route = warp::path::end().and(warp::get()).map(|| {
            let endpoints = HashMap::from([
                (
                    "/health".to_string(),
                    "Overall health status with detailed checks".to_string(),
                ),
                (
                    "/metrics".to_string(),
                    "Request, upstream and cache counters".to_string(),
                ),
                ("/ready".to_string(), "Readiness probe".to_string()),
                ("/live".to_string(), "Liveness probe".to_string()),
            ]);
            warp::reply::json(&ApiDocumentationResponse { endpoints })
        });

        health_route
            .or(metrics_route)
            .or(ready_route)
            .or(live_route)
            .or(root_route)
    }

    /// Start the HTTP health server
    pub async fn start(self: Arc<Self>) {
        let addr = self.addr;
        tracing::info!(%addr, "Starting health server");
        warp::serve(self.routes()).run(addr).await;
    }

    fn get_health_status(&self) -> HealthStatus {
        let checks = HashMap::from([
            ("feed_server".to_string(), self.check_feed_server()),
            ("upstream".to_string(), self.check_upstream()),
        ]);

        let overall_healthy = checks.values().all(|check| check.status == "healthy");

        HealthStatus {
            status: if overall_healthy { "healthy" } else { "degraded" }.to_string(),
            timestamp: current_timestamp(),
            service: self.service_name.clone(),
            uptime_seconds: metrics().uptime_seconds(),
            checks,
        }
    }

    fn check_feed_server(&self) -> HealthCheck {
        let now = current_timestamp();

        if self.feed_listening.load(Ordering::Relaxed) {
            HealthCheck {
                status: "healthy".to_string(),
                message: Some("Feed listener accepting requests".to_string()),
                last_check: now,
            }
        } else {
            HealthCheck {
                status: "unhealthy".to_string(),
                message: Some("Feed listener not running".to_string()),
                last_check: now,
            }
        }
    }

    fn check_upstream(&self) -> HealthCheck {
        let now = current_timestamp();
        let last_success = self.last_live_load.load(Ordering::Relaxed);
        let last_failure = self.last_upstream_failure.load(Ordering::Relaxed);

        let recent_failure = last_failure > last_success
            && now.saturating_sub(last_failure) <= UPSTREAM_FAILURE_WINDOW_SECONDS;

        if recent_failure {
            HealthCheck {
                status: "degraded".to_string(),
                message: Some(format!(
                    "Upstream failing for {} seconds, serving cached feeds",
                    now.saturating_sub(last_failure.max(last_success))
                )),
                last_check: now,
            }
        } else if last_success == 0 {
            HealthCheck {
                status: "healthy".to_string(),
                message: Some("No feeds loaded yet".to_string()),
                last_check: now,
            }
        } else {
            HealthCheck {
                status: "healthy".to_string(),
                message: Some("Upstream answering".to_string()),
                last_check: now,
            }
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthCheck {
    pub status: String,
    pub message: Option<String>,
    pub last_check: u64,
}

#[derive(Debug, Serialize)]
struct HealthStatus {
    status: String,
    timestamp: u64,
    service: String,
    uptime_seconds: u64,
    checks: HashMap<String, HealthCheck>,
}

#[derive(Debug, Serialize)]
struct ReadinessResponse {
    ready: bool,
    timestamp: u64,
}

#[derive(Debug, Serialize)]
struct LivenessResponse {
    alive: bool,
    timestamp: u64,
}

#[derive(Debug, Serialize)]
struct ApiDocumentationResponse {
    endpoints: HashMap<String, String>,
}
