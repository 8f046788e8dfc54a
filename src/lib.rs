//! Author Feed - JSON Feed bridge for content platform authors
//!
//! Serves `GET /<author>` as a JSON Feed 1.1 document built from the author's
//! public article listing on the content platform.
//!
//! # Overview
//!
//! - Resilient HTTP fetching with per-attempt timeouts and linear backoff
//! - Two-phase upstream loading (count probe, then full listing)
//! - Best-effort fallback cache over a pluggable key-value store
//! - JSON Feed rendering and the warp feed listener
//! - Structured logging, metrics and a separate health server
//!
//! # Quick Start
//!
//! ```rust
//! use authorfeed::config::{FeedSection, UpstreamSection};
//! use authorfeed::feed::FeedRenderer;
//! use authorfeed::upstream::NormalizedArticle;
//!
//! let renderer = FeedRenderer::new(&UpstreamSection::default(), &FeedSection::default());
//! let article = NormalizedArticle {
//!     title: "Hello".to_string(),
//!     link: "https://sspai.com/post/1".to_string(),
//!     author: "Wayne".to_string(),
//!     pub_date: 1_700_000_000_000,
//!     summary: "First post".to_string(),
//! };
//!
//! let feed = renderer.render("wayne", &[article]).unwrap();
//! assert_eq!(feed.items[0].date_published, "2023-11-14T22:13:20.000Z");
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod feed;
pub mod fetch;
pub mod observability;
pub mod server;
pub mod testing;
pub mod upstream;

pub use cache::{CacheFallback, FileStore, KeyValueStore, MemoryStore, StoreError};
pub use config::*;
pub use error::{FeedError, FeedResult};
pub use feed::{FeedRenderer, JsonFeed};
pub use fetch::{FetchError, RequestOptions, ResilientFetcher, RetryPolicy};
pub use server::{FeedHandler, FeedResponse};
pub use upstream::{ArticleSource, LoadOutcome, NormalizedArticle, UpstreamLoader};
