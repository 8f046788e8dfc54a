//! Author article loading from the content platform
//!
//! Wraps the platform's public listing API and maps its records onto the
//! normalized article shape used by feeds and the fallback cache.

pub mod loader;
pub mod models;

pub use loader::{ArticleSource, LoadFailure, LoadOutcome, LoadStage, UpstreamLoader};
pub use models::{
    ArticleNormalizer, NormalizedArticle, PageResponse, RemoteArticle, RemoteAuthor,
};
