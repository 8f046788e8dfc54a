//! Error types for the author feed service
//!
//! Maps internal failures to the `{"error": "..."}` payloads and status codes
//! returned to feed readers. Internal details never reach the response body.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use warp::http::StatusCode;

/// Public message used for every unexpected failure
pub const INTERNAL_ERROR_MESSAGE: &str = "internal server error";

/// Main error type for feed operations
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("missing author")]
    MissingAuthor,

    #[error("Can not get articles of author {author}")]
    ArticlesUnavailable { author: String },

    #[error("Internal error: {message}")]
    InternalError { message: String },
}

/// JSON body of every error response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

impl FeedError {
    /// HTTP status for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            FeedError::MissingAuthor => StatusCode::BAD_REQUEST,
            FeedError::ArticlesUnavailable { .. } => StatusCode::BAD_GATEWAY,
            FeedError::InternalError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Convert to the payload sent to the client
    pub fn to_error_body(&self) -> ErrorBody {
        let error = match self {
            FeedError::MissingAuthor | FeedError::ArticlesUnavailable { .. } => self.to_string(),
            FeedError::InternalError { .. } => INTERNAL_ERROR_MESSAGE.to_string(),
        };

        ErrorBody { error }
    }

    /// Create articles unavailable error
    pub fn articles_unavailable<S: Into<String>>(author: S) -> Self {
        Self::ArticlesUnavailable {
            author: author.into(),
        }
    }

    /// Create internal error
    pub fn internal_error<S: Into<String>>(message: S) -> Self {
        Self::InternalError {
            message: message.into(),
        }
    }
}

/// Result type for feed operations
pub type FeedResult<T> = Result<T, FeedError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_author_maps_to_bad_request() {
        let error = FeedError::MissingAuthor;

        assert_eq!(error.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(error.to_error_body().error, "missing author");
    }

    #[test]
    fn test_unavailable_names_the_author() {
        let error = FeedError::articles_unavailable("waynezhang");

        assert_eq!(error.status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(
            error.to_error_body().error,
            "Can not get articles of author waynezhang"
        );
    }

    #[test]
    fn test_internal_errors_hide_details() {
        let error = FeedError::internal_error("store at /var/lib/secret exploded");

        assert_eq!(error.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(error.to_error_body().error, "internal server error");
        assert!(error.to_string().contains("/var/lib/secret"));
    }

    #[test]
    fn test_error_body_serialization() {
        let body = FeedError::MissingAuthor.to_error_body();
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json, serde_json::json!({"error": "missing author"}));
    }
}
