//! Upstream wire records and the normalized article shape

use serde::{Deserialize, Serialize};

/// `total` value meaning the platform could not count the listing
pub const UNKNOWN_TOTAL: i64 = -1;

/// One page of the author listing endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct PageResponse<T> {
    /// Status sentinel, compared against `upstream.success_code`
    pub error: i64,
    pub data: Option<Vec<T>>,
    #[serde(default = "unknown_total")]
    pub total: i64,
}

fn unknown_total() -> i64 {
    UNKNOWN_TOTAL
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteAuthor {
    pub nickname: String,
}

/// Article record as returned by the platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteArticle {
    pub id: u64,
    pub title: String,
    pub free: bool,
    pub author: RemoteAuthor,
    /// Seconds since the Unix epoch
    pub released_time: i64,
    #[serde(default)]
    pub summary: String,
}

/// Article shape served in feeds and stored in the fallback cache
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedArticle {
    pub title: String,
    pub link: String,
    pub author: String,
    /// Milliseconds since the Unix epoch
    #[serde(rename = "pubDate")]
    pub pub_date: i64,
    pub summary: String,
}

/// Maps remote records onto [`NormalizedArticle`]
#[derive(Debug, Clone)]
pub struct ArticleNormalizer {
    site_url: String,
    paid_marker: String,
}

impl ArticleNormalizer {
    pub fn new(site_url: impl Into<String>, paid_marker: impl Into<String>) -> Self {
        let site_url: String = site_url.into();
        Self {
            site_url: site_url.trim_end_matches('/').to_string(),
            paid_marker: paid_marker.into(),
        }
    }

    /// Public URL of an article, unique per id
    pub fn link_for(&self, id: u64) -> String {
        format!("{}/post/{}", self.site_url, id)
    }

    pub fn normalize(&self, article: RemoteArticle) -> NormalizedArticle {
        let title = if article.free {
            article.title
        } else {
            format!("{}{}", self.paid_marker, article.title)
        };

        NormalizedArticle {
            title,
            link: self.link_for(article.id),
            author: article.author.nickname,
            pub_date: article.released_time.saturating_mul(1000),
            summary: article.summary,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn remote(id: u64, free: bool) -> RemoteArticle {
        RemoteArticle {
            id,
            title: "Notes on tooling".to_string(),
            free,
            author: RemoteAuthor {
                nickname: "Wayne".to_string(),
            },
            released_time: 1_700_000_000,
            summary: "A summary".to_string(),
        }
    }

    #[test]
    fn test_free_article_keeps_title() {
        let normalizer = ArticleNormalizer::new("https://sspai.com", "[$] ");
        let article = normalizer.normalize(remote(42, true));

        assert_eq!(article.title, "Notes on tooling");
        assert_eq!(article.link, "https://sspai.com/post/42");
        assert_eq!(article.author, "Wayne");
        assert_eq!(article.pub_date, 1_700_000_000_000);
        assert_eq!(article.summary, "A summary");
    }

    #[test]
    fn test_paid_article_gets_marker() {
        let normalizer = ArticleNormalizer::new("https://sspai.com", "[$] ");
        let article = normalizer.normalize(remote(7, false));

        assert_eq!(article.title, "[$] Notes on tooling");
    }

    #[test]
    fn test_trailing_slash_in_site_url() {
        let normalizer = ArticleNormalizer::new("https://sspai.com/", "[$] ");
        assert_eq!(normalizer.link_for(1), "https://sspai.com/post/1");
    }

    #[test]
    fn test_normalized_article_uses_pub_date_key() {
        let normalizer = ArticleNormalizer::new("https://sspai.com", "[$] ");
        let value = serde_json::to_value(normalizer.normalize(remote(3, true))).unwrap();

        assert_eq!(value["pubDate"], json!(1_700_000_000_000_i64));
        assert!(value.get("pub_date").is_none());
    }

    #[test]
    fn test_page_response_defaults() {
        let page: PageResponse<RemoteArticle> =
            serde_json::from_value(json!({"error": 0})).unwrap();

        assert_eq!(page.total, UNKNOWN_TOTAL);
        assert!(page.data.is_none());
    }

    #[test]
    fn test_remote_article_without_summary() {
        let article: RemoteArticle = serde_json::from_value(json!({
            "id": 9,
            "title": "t",
            "free": true,
            "author": {"nickname": "n", "slug": "ignored"},
            "released_time": 10,
            "extra_field": [1, 2, 3]
        }))
        .unwrap();

        assert_eq!(article.summary, "");
    }

    proptest! {
        #[test]
        fn link_is_derived_from_id(id in any::<u64>()) {
            let normalizer = ArticleNormalizer::new("https://sspai.com", "[$] ");
            let mut article = remote(id, true);
            article.title = "x".to_string();
            let normalized = normalizer.normalize(article);
            prop_assert_eq!(normalized.link, format!("https://sspai.com/post/{}", id));
        }

        #[test]
        fn marker_present_exactly_when_paid(title in "[a-zA-Z0-9 ]{0,32}", free in any::<bool>()) {
            let normalizer = ArticleNormalizer::new("https://sspai.com", "[$] ");
            let mut article = remote(1, free);
            article.title = title.clone();
            let normalized = normalizer.normalize(article);

            if free {
                prop_assert_eq!(normalized.title, title);
            } else {
                prop_assert_eq!(normalized.title, format!("[$] {}", title));
            }
        }

        #[test]
        fn pub_date_is_released_time_in_millis(seconds in 0i64..4_102_444_800) {
            let normalizer = ArticleNormalizer::new("https://sspai.com", "[$] ");
            let mut article = remote(1, true);
            article.released_time = seconds;
            prop_assert_eq!(normalizer.normalize(article).pub_date, seconds * 1000);
        }
    }
}
