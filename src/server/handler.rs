//! Feed request handling
//!
//! `/<author>` goes through the live loader first. A live listing is served
//! and written to the fallback cache in the background; otherwise the cached
//! listing is served, and without one the request fails with 502.

use crate::cache::{CacheFallback, KeyValueStore};
use crate::config::FeedConfig;
use crate::error::{FeedError, FeedResult};
use crate::feed::{FeedRenderer, JsonFeed};
use crate::fetch::ResilientFetcher;
use crate::observability::metrics::{metrics, RequestOutcome};
use crate::observability::HealthServer;
use crate::upstream::{ArticleSource, UpstreamLoader};
use crate::{feed_request_span, upstream_span};
use percent_encoding::percent_decode_str;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn, Instrument, Span};
use uuid::Uuid;
use warp::http::StatusCode;
use warp::reply::{Reply, Response};

/// Where a served feed came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedOrigin {
    Live,
    Cached,
}

/// Status and JSON body of a feed response
#[derive(Debug, Clone, PartialEq)]
pub struct FeedResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl FeedResponse {
    fn feed(feed: &JsonFeed) -> Self {
        match serde_json::to_value(feed) {
            Ok(body) => Self {
                status: StatusCode::OK,
                body,
            },
            Err(e) => Self::error(&FeedError::internal_error(format!(
                "failed to serialize feed: {e}"
            ))),
        }
    }

    fn error(error: &FeedError) -> Self {
        let body = serde_json::to_value(error.to_error_body())
            .unwrap_or_else(|_| serde_json::json!({ "error": crate::error::INTERNAL_ERROR_MESSAGE }));

        Self {
            status: error.status_code(),
            body,
        }
    }
}

impl Reply for FeedResponse {
    fn into_response(self) -> Response {
        warp::reply::with_status(warp::reply::json(&self.body), self.status).into_response()
    }
}

/// Author slug from a request path: everything after the leading `/`,
/// percent-decoded
pub fn author_from_path(path: &str) -> FeedResult<String> {
    let raw = path.strip_prefix('/').unwrap_or(path);
    let author = percent_decode_str(raw).decode_utf8_lossy().into_owned();

    if author.is_empty() {
        return Err(FeedError::MissingAuthor);
    }

    Ok(author)
}

/// Orchestrates loader, fallback cache and feed rendering
#[derive(Clone)]
pub struct FeedHandler {
    source: Arc<dyn ArticleSource>,
    cache: CacheFallback,
    renderer: FeedRenderer,
    health: Option<Arc<HealthServer>>,
}

impl FeedHandler {
    pub fn new(source: Arc<dyn ArticleSource>, cache: CacheFallback, renderer: FeedRenderer) -> Self {
        Self {
            source,
            cache,
            renderer,
            health: None,
        }
    }

    /// Wire the live loader to the platform API described by `config`
    pub fn from_config(config: &FeedConfig, store: Arc<dyn KeyValueStore>) -> FeedResult<Self> {
        let fetcher = ResilientFetcher::with_user_agent(&config.upstream.user_agent)
            .map_err(|e| FeedError::internal_error(format!("failed to build HTTP client: {e}")))?;
        let loader = UpstreamLoader::new(fetcher, &config.upstream, &config.feed);

        Ok(Self::new(
            Arc::new(loader),
            CacheFallback::new(store),
            FeedRenderer::new(&config.upstream, &config.feed),
        ))
    }

    /// Report live load results to the health server
    pub fn with_health(mut self, health: Arc<HealthServer>) -> Self {
        self.health = Some(health);
        self
    }

    /// Answer a request for `path`. Never fails: every error, including a
    /// panic in the request path, becomes an error response.
    pub async fn handle(&self, path: &str) -> FeedResponse {
        let started = Instant::now();
        metrics().request_started();

        let span = feed_request_span!(
            request_id = %Uuid::new_v4(),
            path = %path,
            author = tracing::field::Empty
        );
        let handler = self.clone();
        let path_owned = path.to_string();
        let task = tokio::spawn(
            async move {
                let author = author_from_path(&path_owned)?;
                Span::current().record("author", author.as_str());
                handler.serve_feed(&author).await
            }
            .instrument(span.clone()),
        );

        let result = match task.await {
            Ok(result) => result,
            Err(join_error) => Err(FeedError::internal_error(format!(
                "feed task aborted: {join_error}"
            ))),
        };

        let (response, outcome) = match result {
            Ok((feed, origin)) => {
                let outcome = match origin {
                    FeedOrigin::Live => RequestOutcome::Live,
                    FeedOrigin::Cached => RequestOutcome::Cached,
                };
                (FeedResponse::feed(&feed), outcome)
            }
            Err(e) => {
                let outcome = match e {
                    FeedError::MissingAuthor => RequestOutcome::BadRequest,
                    FeedError::ArticlesUnavailable { .. } => RequestOutcome::Unavailable,
                    _ => {
                        span.in_scope(|| error!(error = %e, "Feed request failed"));
                        RequestOutcome::InternalError
                    }
                };
                (FeedResponse::error(&e), outcome)
            }
        };

        metrics().request_finished(outcome, started.elapsed());
        response
    }

    /// Build the feed of `author`, live if possible, cached otherwise
    pub async fn serve_feed(&self, author: &str) -> FeedResult<(JsonFeed, FeedOrigin)> {
        if author.is_empty() {
            return Err(FeedError::MissingAuthor);
        }

        let outcome = self
            .source
            .load(author)
            .instrument(upstream_span!(author = %author))
            .await;

        if let Some(health) = &self.health {
            health.record_upstream_result(!outcome.is_unreachable());
        }

        if let Some(articles) = outcome.into_articles() {
            let feed = self.renderer.render(author, &articles)?;
            self.spawn_cache_save(author, articles);
            return Ok((feed, FeedOrigin::Live));
        }

        match self.cache.load(author).await {
            Some(articles) => {
                info!(author, count = articles.len(), "Serving cached articles");
                let feed = self.renderer.render(author, &articles)?;
                Ok((feed, FeedOrigin::Cached))
            }
            None => {
                warn!(author, "No live or cached articles");
                Err(FeedError::articles_unavailable(author))
            }
        }
    }

    fn spawn_cache_save(&self, author: &str, articles: Vec<crate::upstream::NormalizedArticle>) {
        let cache = self.cache.clone();
        let author = author.to_string();
        tokio::spawn(
            async move {
                cache.save(&author, &articles).await;
            }
            .instrument(Span::current()),
        );
    }
}
