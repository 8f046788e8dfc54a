//! Thread-safe metrics collection system
//!
//! Provides atomic counters and a mutex-protected latency window for tracking
//! feed requests, upstream fetches and fallback cache usage.

use once_cell::sync::Lazy;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Latency samples kept for percentile calculation
const MAX_LATENCY_SAMPLES: usize = 1000;

/// Global metrics collector instance
pub static METRICS: Lazy<MetricsCollector> = Lazy::new(MetricsCollector::new);

/// Get reference to global metrics collector
pub fn metrics() -> &'static MetricsCollector {
    &METRICS
}

/// How a feed request ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    Live,
    Cached,
    Unavailable,
    BadRequest,
    InternalError,
}

/// Thread-safe metrics collector using atomics and mutexes
pub struct MetricsCollector {
    // Feed requests
    requests_received: AtomicU64,
    requests_in_flight: AtomicU64,
    served_live: AtomicU64,
    served_cached: AtomicU64,
    unavailable: AtomicU64,
    bad_requests: AtomicU64,
    internal_errors: AtomicU64,

    // Upstream fetches
    upstream_attempts: AtomicU64,
    upstream_failures: AtomicU64,

    // Fallback cache
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    cache_writes: AtomicU64,
    cache_write_failures: AtomicU64,

    request_times: Mutex<Vec<u64>>, // in milliseconds
    service_state: Mutex<String>,
    uptime_start: AtomicU64,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            requests_received: AtomicU64::new(0),
            requests_in_flight: AtomicU64::new(0),
            served_live: AtomicU64::new(0),
            served_cached: AtomicU64::new(0),
            unavailable: AtomicU64::new(0),
            bad_requests: AtomicU64::new(0),
            internal_errors: AtomicU64::new(0),
            upstream_attempts: AtomicU64::new(0),
            upstream_failures: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
            cache_misses: AtomicU64::new(0),
            cache_writes: AtomicU64::new(0),
            cache_write_failures: AtomicU64::new(0),
            request_times: Mutex::new(Vec::new()),
            service_state: Mutex::new("initializing".to_string()),
            uptime_start: AtomicU64::new(current_timestamp()),
        }
    }

    // Feed request metrics
    pub fn request_started(&self) {
        self.requests_received.fetch_add(1, Ordering::Relaxed);
        self.requests_in_flight.fetch_add(1, Ordering::Relaxed);
    }

    pub fn request_finished(&self, outcome: RequestOutcome, duration: Duration) {
        self.requests_in_flight.fetch_sub(1, Ordering::Relaxed);

        let counter = match outcome {
            RequestOutcome::Live => &self.served_live,
            RequestOutcome::Cached => &self.served_cached,
            RequestOutcome::Unavailable => &self.unavailable,
            RequestOutcome::BadRequest => &self.bad_requests,
            RequestOutcome::InternalError => &self.internal_errors,
        };
        counter.fetch_add(1, Ordering::Relaxed);

        self.record_request_time(duration);
    }

    fn record_request_time(&self, duration: Duration) {
        if let Ok(mut times) = self.request_times.lock() {
            times.push(duration.as_millis() as u64);

            if times.len() > MAX_LATENCY_SAMPLES {
                times.remove(0);
            }
        }
    }

    // Upstream metrics
    pub fn upstream_attempt(&self) {
        self.upstream_attempts.fetch_add(1, Ordering::Relaxed);
    }

    /// A fetch that exhausted its retry budget
    pub fn upstream_failure(&self) {
        self.upstream_failures.fetch_add(1, Ordering::Relaxed);
    }

    // Cache metrics
    pub fn cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn cache_missed(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn cache_written(&self) {
        self.cache_writes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn cache_write_failed(&self) {
        self.cache_write_failures.fetch_add(1, Ordering::Relaxed);
    }

    // Lifecycle metrics
    pub fn set_service_state(&self, state: &str) {
        if let Ok(mut current_state) = self.service_state.lock() {
            *current_state = state.to_string();
        }
    }

    pub fn service_state(&self) -> String {
        self.service_state
            .lock()
            .map(|s| s.clone())
            .unwrap_or_else(|_| "unknown".to_string())
    }

    pub fn uptime_seconds(&self) -> u64 {
        current_timestamp().saturating_sub(self.uptime_start.load(Ordering::Relaxed))
    }

    /// Reset all metrics (useful for testing)
    pub fn reset(&self) {
        for counter in [
            &self.requests_received,
            &self.requests_in_flight,
            &self.served_live,
            &self.served_cached,
            &self.unavailable,
            &self.bad_requests,
            &self.internal_errors,
            &self.upstream_attempts,
            &self.upstream_failures,
            &self.cache_hits,
            &self.cache_misses,
            &self.cache_writes,
            &self.cache_write_failures,
        ] {
            counter.store(0, Ordering::Relaxed);
        }

        if let Ok(mut times) = self.request_times.lock() {
            times.clear();
        }
        self.set_service_state("initializing");
        self.uptime_start
            .store(current_timestamp(), Ordering::Relaxed);
    }

    /// Average and percentiles of recent request latencies
    fn calculate_latency_statistics(&self) -> (f64, f64, f64, f64) {
        let Ok(times) = self.request_times.lock() else {
            return (0.0, 0.0, 0.0, 0.0);
        };

        if times.is_empty() {
            return (0.0, 0.0, 0.0, 0.0);
        }

        let mut sorted_times = times.clone();
        sorted_times.sort_unstable();

        let avg = sorted_times.iter().sum::<u64>() as f64 / sorted_times.len() as f64;
        (
            avg,
            percentile(&sorted_times, 50.0),
            percentile(&sorted_times, 95.0),
            percentile(&sorted_times, 99.0),
        )
    }

    /// Get complete metrics snapshot
    pub fn get_metrics(&self) -> MetricsSnapshot {
        let (avg_latency_ms, p50, p95, p99) = self.calculate_latency_statistics();

        MetricsSnapshot {
            requests: RequestMetrics {
                received: self.requests_received.load(Ordering::Relaxed),
                in_flight: self.requests_in_flight.load(Ordering::Relaxed),
                served_live: self.served_live.load(Ordering::Relaxed),
                served_cached: self.served_cached.load(Ordering::Relaxed),
                unavailable: self.unavailable.load(Ordering::Relaxed),
                bad_requests: self.bad_requests.load(Ordering::Relaxed),
                internal_errors: self.internal_errors.load(Ordering::Relaxed),
                avg_latency_ms,
                latency_p50_ms: p50,
                latency_p95_ms: p95,
                latency_p99_ms: p99,
            },
            upstream: UpstreamMetrics {
                attempts: self.upstream_attempts.load(Ordering::Relaxed),
                failures: self.upstream_failures.load(Ordering::Relaxed),
            },
            cache: CacheMetrics {
                hits: self.cache_hits.load(Ordering::Relaxed),
                misses: self.cache_misses.load(Ordering::Relaxed),
                writes: self.cache_writes.load(Ordering::Relaxed),
                write_failures: self.cache_write_failures.load(Ordering::Relaxed),
            },
            lifecycle: LifecycleMetrics {
                current_state: self.service_state(),
                uptime_seconds: self.uptime_seconds(),
            },
            timestamp: current_timestamp(),
        }
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

// Public metrics structures
#[derive(Debug, Serialize)]
pub struct MetricsSnapshot {
    pub requests: RequestMetrics,
    pub upstream: UpstreamMetrics,
    pub cache: CacheMetrics,
    pub lifecycle: LifecycleMetrics,
    pub timestamp: u64,
}

#[derive(Debug, Serialize)]
pub struct RequestMetrics {
    pub received: u64,
    pub in_flight: u64,
    pub served_live: u64,
    pub served_cached: u64,
    pub unavailable: u64,
    pub bad_requests: u64,
    pub internal_errors: u64,
    pub avg_latency_ms: f64,
    pub latency_p50_ms: f64,
    pub latency_p95_ms: f64,
    pub latency_p99_ms: f64,
}

#[derive(Debug, Serialize)]
pub struct UpstreamMetrics {
    pub attempts: u64,
    pub failures: u64,
}

#[derive(Debug, Serialize)]
pub struct CacheMetrics {
    pub hits: u64,
    pub misses: u64,
    pub writes: u64,
    pub write_failures: u64,
}

#[derive(Debug, Serialize)]
pub struct LifecycleMetrics {
    pub current_state: String,
    pub uptime_seconds: u64,
}

// Helper functions
pub(crate) fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

fn percentile(sorted_data: &[u64], percentile: f64) -> f64 {
    if sorted_data.is_empty() {
        return 0.0;
    }

    let len = sorted_data.len();
    let index = (percentile / 100.0) * (len - 1) as f64;

    if index.fract() == 0.0 {
        sorted_data[index as usize] as f64
    } else {
        let lower_index = index.floor() as usize;
        let upper_index = index.ceil() as usize;
        let lower_value = sorted_data[lower_index] as f64;
        let upper_value = sorted_data[upper_index] as f64;

        lower_value + (upper_value - lower_value) * index.fract()
    }
}
