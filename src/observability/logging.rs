//! Log output for the feed service
//!
//! Every feed request is logged inside a `feed_request` span (request id,
//! path, author) and every live load inside an `upstream_load` span, so JSON
//! output can be grouped per request by a log aggregator.
//!
//! Settings come from the environment:
//!
//! | Variable     | Values                                  | Default |
//! |--------------|-----------------------------------------|---------|
//! | `LOG_LEVEL`  | ERROR, WARN, INFO, DEBUG, TRACE         | INFO    |
//! | `LOG_FORMAT` | json, pretty, compact                   | json    |
//! | `LOG_SPANS`  | `true` logs span open and close         | off     |
//! | `RUST_LOG`   | full filter, replaces everything above  |         |
//!
//! `-v` on the command line raises the level to DEBUG (`-vv` to TRACE) when
//! `LOG_LEVEL` is not set.
//!
//! ```bash
//! LOG_FORMAT=pretty ./authorfeed -v run
//! RUST_LOG=authorfeed=trace,reqwest=debug ./authorfeed run
//! ```

use std::env;
use tracing::{Level, Subscriber};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{fmt, prelude::*, EnvFilter, Layer};

/// HTTP stack crates that drown request logs at DEBUG
const QUIET_TARGETS: &[&str] = &["hyper=warn", "reqwest=warn", "warp=warn", "tokio=warn"];

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per event
    Json,
    /// Multi-line, colored
    Pretty,
    /// Single line, colored, no targets
    Compact,
}

impl LogFormat {
    /// Unknown values fall back to JSON
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "pretty" => LogFormat::Pretty,
            "compact" => LogFormat::Compact,
            _ => LogFormat::Json,
        }
    }
}

/// Resolved logging configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogSettings {
    pub level: Level,
    pub format: LogFormat,
    pub include_spans: bool,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: LogFormat::Json,
            include_spans: false,
        }
    }
}

impl LogSettings {
    /// Combine raw `LOG_LEVEL`, `LOG_FORMAT` and `LOG_SPANS` values with the
    /// `-v` count. An explicit level always wins over `-v`.
    pub fn resolve(
        level: Option<&str>,
        format: Option<&str>,
        spans: Option<&str>,
        verbose: u8,
    ) -> Self {
        let level = match (level, verbose) {
            (Some(level), _) => parse_level(level),
            (None, 0) => Level::INFO,
            (None, 1) => Level::DEBUG,
            (None, _) => Level::TRACE,
        };

        Self {
            level,
            format: format.map(LogFormat::parse).unwrap_or(LogFormat::Json),
            include_spans: spans.map(parse_flag).unwrap_or(false),
        }
    }

    /// Read settings from the process environment
    pub fn from_env(verbose: u8) -> Self {
        let level = env::var("LOG_LEVEL").ok();
        let format = env::var("LOG_FORMAT").ok();
        let spans = env::var("LOG_SPANS").ok();

        Self::resolve(level.as_deref(), format.as_deref(), spans.as_deref(), verbose)
    }

    fn filter(&self) -> EnvFilter {
        if let Ok(rust_log) = env::var("RUST_LOG") {
            return EnvFilter::new(rust_log);
        }

        QUIET_TARGETS
            .iter()
            .filter_map(|directive| directive.parse().ok())
            .fold(EnvFilter::new(self.level.to_string()), |filter, directive| {
                filter.add_directive(directive)
            })
    }

    fn fmt_layer<S>(&self) -> Box<dyn Layer<S> + Send + Sync>
    where
        S: Subscriber + for<'a> LookupSpan<'a>,
    {
        let span_events = if self.include_spans {
            FmtSpan::NEW | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        };

        match self.format {
            LogFormat::Json => fmt::layer().json().with_span_events(span_events).boxed(),
            LogFormat::Pretty => fmt::layer()
                .pretty()
                .with_ansi(true)
                .with_span_events(span_events)
                .boxed(),
            LogFormat::Compact => fmt::layer()
                .compact()
                .with_ansi(true)
                .with_target(false)
                .with_span_events(span_events)
                .boxed(),
        }
    }
}

/// Install the global subscriber. Later calls are ignored.
pub fn init_logging(settings: LogSettings) {
    let _ = tracing_subscriber::registry()
        .with(settings.fmt_layer())
        .with(settings.filter())
        .try_init();
}

/// Install the global subscriber from the environment and the `-v` count
pub fn init_logging_from_env(verbose: u8) {
    init_logging(LogSettings::from_env(verbose));
}

/// Parse a LOG_LEVEL value, defaulting to INFO
pub fn parse_level(s: &str) -> Level {
    match s.trim().to_uppercase().as_str() {
        "ERROR" => Level::ERROR,
        "WARN" => Level::WARN,
        "DEBUG" => Level::DEBUG,
        "TRACE" => Level::TRACE,
        _ => Level::INFO,
    }
}

/// Only a case-insensitive "true" enables a flag
pub fn parse_flag(s: &str) -> bool {
    s.trim().eq_ignore_ascii_case("true")
}

/// Span covering one feed request
#[macro_export]
macro_rules! feed_request_span {
    ($($field:tt)*) => {
        tracing::info_span!("feed_request", $($field)*)
    };
}

/// Span covering one live listing load
#[macro_export]
macro_rules! upstream_span {
    ($($field:tt)*) => {
        tracing::info_span!("upstream_load", $($field)*)
    };
}

pub use {feed_request_span, upstream_span};
