//! JSON Feed 1.1 rendering
//!
//! See <https://jsonfeed.org/version/1.1>. Only the fields feed readers need
//! for an author listing are emitted.

use crate::config::{FeedSection, UpstreamSection};
use crate::error::{FeedError, FeedResult};
use crate::upstream::NormalizedArticle;
use chrono::{DateTime, SecondsFormat};
use serde::{Deserialize, Serialize};

pub const JSON_FEED_VERSION: &str = "https://jsonfeed.org/version/1.1";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonFeed {
    pub version: String,
    pub title: String,
    pub home_page_url: String,
    pub description: String,
    pub authors: Vec<FeedAuthor>,
    pub items: Vec<FeedItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedAuthor {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedItem {
    pub id: String,
    pub url: String,
    pub title: String,
    pub content_text: String,
    /// RFC 3339 in UTC with millisecond precision
    pub date_published: String,
}

/// Builds author feeds from normalized articles
#[derive(Debug, Clone)]
pub struct FeedRenderer {
    site_url: String,
    title_suffix: String,
    description_suffix: String,
}

impl FeedRenderer {
    pub fn new(upstream: &UpstreamSection, feed: &FeedSection) -> Self {
        Self {
            site_url: upstream.site_url.trim_end_matches('/').to_string(),
            title_suffix: feed.title_suffix.clone(),
            description_suffix: feed.description_suffix.clone(),
        }
    }

    pub fn render(&self, author: &str, articles: &[NormalizedArticle]) -> FeedResult<JsonFeed> {
        let items = articles
            .iter()
            .map(|article| {
                Ok(FeedItem {
                    id: article.link.clone(),
                    url: article.link.clone(),
                    title: article.title.clone(),
                    content_text: article.summary.clone(),
                    date_published: iso_timestamp(article.pub_date)?,
                })
            })
            .collect::<FeedResult<Vec<_>>>()?;

        Ok(JsonFeed {
            version: JSON_FEED_VERSION.to_string(),
            title: format!("{author}{}", self.title_suffix),
            home_page_url: format!("{}/u/{author}/posts", self.site_url),
            description: format!("{author}{}", self.description_suffix),
            authors: vec![FeedAuthor {
                name: author.to_string(),
            }],
            items,
        })
    }
}

/// Render epoch milliseconds as `YYYY-MM-DDTHH:MM:SS.mmmZ`
pub fn iso_timestamp(millis: i64) -> FeedResult<String> {
    DateTime::from_timestamp_millis(millis)
        .map(|timestamp| timestamp.to_rfc3339_opts(SecondsFormat::Millis, true))
        .ok_or_else(|| FeedError::internal_error(format!("timestamp {millis} is out of range")))
}
