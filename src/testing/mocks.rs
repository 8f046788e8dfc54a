//! Mock implementations for testing
//!
//! Provides mock ArticleSource and KeyValueStore implementations.

use crate::cache::{KeyValueStore, StoreError};
use crate::fetch::{AttemptFailure, FetchError};
use crate::upstream::{ArticleSource, LoadFailure, LoadOutcome, LoadStage, NormalizedArticle};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;

/// What a [`MockArticleSource`] answers with
#[derive(Debug, Clone)]
pub enum MockListing {
    Articles(Vec<NormalizedArticle>),
    Empty,
    /// Platform answered with a non-success sentinel
    Failed,
    /// Platform could not be reached
    Unreachable,
}

/// Article source returning a fixed outcome and recording requested authors
#[derive(Debug)]
pub struct MockArticleSource {
    listing: MockListing,
    calls: Mutex<Vec<String>>,
    call_count: AtomicUsize,
}

impl MockArticleSource {
    pub fn new(listing: MockListing) -> Self {
        Self {
            listing,
            calls: Mutex::new(Vec::new()),
            call_count: AtomicUsize::new(0),
        }
    }

    pub fn articles(articles: Vec<NormalizedArticle>) -> Self {
        Self::new(MockListing::Articles(articles))
    }

    pub fn empty() -> Self {
        Self::new(MockListing::Empty)
    }

    pub fn failed() -> Self {
        Self::new(MockListing::Failed)
    }

    pub fn unreachable() -> Self {
        Self::new(MockListing::Unreachable)
    }

    pub async fn calls(&self) -> Vec<String> {
        self.calls.lock().await.clone()
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ArticleSource for MockArticleSource {
    async fn load(&self, author: &str) -> LoadOutcome {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        self.calls.lock().await.push(author.to_string());

        match self.listing.clone() {
            MockListing::Articles(articles) if articles.is_empty() => LoadOutcome::Empty,
            MockListing::Articles(articles) => LoadOutcome::Articles(articles),
            MockListing::Empty => LoadOutcome::Empty,
            MockListing::Failed => LoadOutcome::Failed(LoadFailure::Sentinel {
                stage: LoadStage::Probe,
                code: 500,
            }),
            MockListing::Unreachable => LoadOutcome::Failed(LoadFailure::Fetch {
                stage: LoadStage::Probe,
                source: FetchError {
                    url: "http://upstream.invalid/".to_string(),
                    attempts: 1,
                    cause: AttemptFailure::Timeout(Duration::from_secs(5)),
                },
            }),
        }
    }
}

/// Article source that panics on every load
#[derive(Debug, Default)]
pub struct PanickingSource;

#[async_trait]
impl ArticleSource for PanickingSource {
    async fn load(&self, author: &str) -> LoadOutcome {
        panic!("article source exploded for {author}");
    }
}

/// Store whose every operation fails
#[derive(Debug, Default)]
pub struct FailingStore;

#[async_trait]
impl KeyValueStore for FailingStore {
    async fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
        Err(StoreError::Backend("store unavailable".to_string()))
    }

    async fn put(&self, _key: &str, _value: String) -> Result<(), StoreError> {
        Err(StoreError::Backend("store unavailable".to_string()))
    }
}

/// Two normalized articles, newest first, one of them paid
pub fn sample_articles() -> Vec<NormalizedArticle> {
    vec![
        NormalizedArticle {
            title: "[$] Second post".to_string(),
            link: "https://sspai.com/post/2".to_string(),
            author: "Wayne".to_string(),
            pub_date: 1_700_000_100_000,
            summary: "Second summary".to_string(),
        },
        NormalizedArticle {
            title: "First post".to_string(),
            link: "https://sspai.com/post/1".to_string(),
            author: "Wayne".to_string(),
            pub_date: 1_700_000_000_000,
            summary: "First summary".to_string(),
        },
    ]
}
