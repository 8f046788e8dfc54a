//! Two-step author listing loader
//!
//! The listing endpoint only returns every article when the caller already
//! knows how many there are, so loading an author always takes two requests:
//!
//! 1. Probe: `?slug=<author>&object_type=0` without retries, read `total`.
//! 2. Full call: the same query plus `&offset=0&limit=<total>`, with retries.
//!
//! Any failure in either step yields no articles. Partial listings are never
//! returned.

use super::models::{ArticleNormalizer, NormalizedArticle, PageResponse, RemoteArticle};
use crate::config::{FeedSection, UpstreamSection};
use crate::fetch::{FetchError, RequestOptions, ResilientFetcher, RetryPolicy};
use async_trait::async_trait;
use std::fmt;
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

/// Path of the author listing endpoint relative to the API root
pub const LISTING_PATH: &str = "article/user/public/page/get";

/// Result of loading an author's articles
#[derive(Debug)]
pub enum LoadOutcome {
    /// Live listing, never empty
    Articles(Vec<NormalizedArticle>),
    /// Upstream answered but has nothing to list
    Empty,
    /// Upstream could not be queried or answered unexpectedly
    Failed(LoadFailure),
}

impl LoadOutcome {
    /// Articles if the load produced any
    pub fn into_articles(self) -> Option<Vec<NormalizedArticle>> {
        match self {
            LoadOutcome::Articles(articles) => Some(articles),
            LoadOutcome::Empty | LoadOutcome::Failed(_) => None,
        }
    }

    /// Whether the platform itself could not be reached or kept failing.
    /// `Empty` and sentinel answers still prove the platform is up.
    pub fn is_unreachable(&self) -> bool {
        matches!(self, LoadOutcome::Failed(LoadFailure::Fetch { .. }))
    }
}

/// Which of the two requests went wrong
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStage {
    Probe,
    Full,
}

impl fmt::Display for LoadStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadStage::Probe => write!(f, "probe"),
            LoadStage::Full => write!(f, "full"),
        }
    }
}

#[derive(Debug, Error)]
pub enum LoadFailure {
    #[error("{stage} request failed: {source}")]
    Fetch {
        stage: LoadStage,
        #[source]
        source: FetchError,
    },

    #[error("{stage} response carried error code {code}")]
    Sentinel { stage: LoadStage, code: i64 },

    #[error("{stage} response had no data array")]
    MissingData { stage: LoadStage },

    #[error("invalid listing URL: {0}")]
    InvalidUrl(String),
}

/// Source of an author's articles
#[async_trait]
pub trait ArticleSource: Send + Sync {
    /// Load every public article of `author`
    async fn load(&self, author: &str) -> LoadOutcome;
}

/// Loader backed by the platform's public listing API
#[derive(Debug, Clone)]
pub struct UpstreamLoader {
    fetcher: ResilientFetcher,
    api_base_url: String,
    normalizer: ArticleNormalizer,
    success_code: i64,
    probe_policy: RetryPolicy,
    full_policy: RetryPolicy,
    options: RequestOptions,
}

impl UpstreamLoader {
    pub fn new(
        fetcher: ResilientFetcher,
        upstream: &UpstreamSection,
        feed: &FeedSection,
    ) -> Self {
        Self {
            fetcher,
            api_base_url: upstream.api_base_url.trim_end_matches('/').to_string(),
            normalizer: ArticleNormalizer::new(&upstream.site_url, &feed.paid_marker),
            success_code: upstream.success_code,
            probe_policy: RetryPolicy::new(upstream.timeout(), upstream.probe_retries),
            full_policy: RetryPolicy::new(upstream.timeout(), upstream.full_retries),
            options: RequestOptions::new().with_header("accept", "application/json"),
        }
    }

    /// Override the retry policies, mainly to shorten backoff in tests
    pub fn with_policies(mut self, probe: RetryPolicy, full: RetryPolicy) -> Self {
        self.probe_policy = probe;
        self.full_policy = full;
        self
    }

    /// Listing URL; `limit` switches from the probe to the full call
    pub fn listing_url(&self, author: &str, limit: Option<i64>) -> Result<String, LoadFailure> {
        let mut url = Url::parse(&format!("{}/{}", self.api_base_url, LISTING_PATH))
            .map_err(|e| LoadFailure::InvalidUrl(e.to_string()))?;

        {
            let mut query = url.query_pairs_mut();
            query.append_pair("slug", author);
            query.append_pair("object_type", "0");
            if let Some(limit) = limit {
                query.append_pair("offset", "0");
                query.append_pair("limit", &limit.to_string());
            }
        }

        Ok(url.into())
    }

    async fn fetch_page(
        &self,
        stage: LoadStage,
        url: &str,
        policy: RetryPolicy,
    ) -> Result<PageResponse<RemoteArticle>, LoadFailure> {
        let page: PageResponse<RemoteArticle> = self
            .fetcher
            .fetch_json(url, &self.options, policy)
            .await
            .map_err(|source| LoadFailure::Fetch { stage, source })?;

        if page.error != self.success_code {
            return Err(LoadFailure::Sentinel {
                stage,
                code: page.error,
            });
        }

        Ok(page)
    }

    async fn load_listing(&self, author: &str) -> Result<Vec<NormalizedArticle>, LoadFailure> {
        let probe_url = self.listing_url(author, None)?;
        let probe = self
            .fetch_page(LoadStage::Probe, &probe_url, self.probe_policy)
            .await?;

        if probe.total <= 0 {
            debug!(author, total = probe.total, "Probe reported nothing to fetch");
            return Ok(Vec::new());
        }

        let full_url = self.listing_url(author, Some(probe.total))?;
        let full = self
            .fetch_page(LoadStage::Full, &full_url, self.full_policy)
            .await?;

        let records = full.data.ok_or(LoadFailure::MissingData {
            stage: LoadStage::Full,
        })?;

        Ok(records
            .into_iter()
            .map(|record| self.normalizer.normalize(record))
            .collect())
    }
}

#[async_trait]
impl ArticleSource for UpstreamLoader {
    async fn load(&self, author: &str) -> LoadOutcome {
        match self.load_listing(author).await {
            Ok(articles) if articles.is_empty() => LoadOutcome::Empty,
            Ok(articles) => {
                info!(author, count = articles.len(), "Loaded live articles");
                LoadOutcome::Articles(articles)
            }
            Err(failure) => {
                warn!(author, error = %failure, "Failed to load live articles");
                LoadOutcome::Failed(failure)
            }
        }
    }
}
