//! Error types for the retrieval engine

use std::time::Duration;

use thiserror::Error;

/// Result type alias for retrieval operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the retrieval engine
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// On-disk index missing, unreadable or inconsistent
    #[error("index unavailable: {0}")]
    IndexUnavailable(String),

    /// Knowledge record rejected during normalization
    #[error("malformed record: {0}")]
    MalformedRecord(String),

    /// Embedding service did not answer in time
    #[error("embedding request timed out after {0:?}")]
    EmbeddingTimeout(Duration),

    /// Embedding service answered with a non-success status
    #[error("embedding service returned {status}: {body}")]
    EmbeddingStatus {
        /// HTTP status code
        status: u16,
        /// Response body, possibly truncated
        body: String,
    },

    /// Embedding service answered with an unexpected payload
    #[error("invalid embedding response: {0}")]
    EmbeddingResponse(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP transport error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl Error {
    /// Whether the failed operation may succeed when retried
    ///
    /// Only embedding failures caused by the remote side (timeouts, transport
    /// errors, throttling, server errors) are retryable
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::EmbeddingTimeout(_) | Self::Http(_) => true,
            Self::EmbeddingStatus { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// Whether this error originated from the embedding service
    #[must_use]
    pub const fn is_embedding(&self) -> bool {
        matches!(
            self,
            Self::EmbeddingTimeout(_)
                | Self::EmbeddingStatus { .. }
                | Self::EmbeddingResponse(_)
                | Self::Http(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(Error::EmbeddingTimeout(Duration::from_secs(1)).is_retryable());
        assert!(
            Error::EmbeddingStatus {
                status: 503,
                body: String::new()
            }
            .is_retryable()
        );
        assert!(
            Error::EmbeddingStatus {
                status: 429,
                body: String::new()
            }
            .is_retryable()
        );
        assert!(
            !Error::EmbeddingStatus {
                status: 400,
                body: String::new()
            }
            .is_retryable()
        );
        assert!(!Error::EmbeddingResponse("no vector".to_string()).is_retryable());
        assert!(!Error::Config("x".to_string()).is_retryable());
    }

    #[test]
    fn test_embedding_origin() {
        assert!(Error::EmbeddingResponse("bad".to_string()).is_embedding());
        assert!(!Error::IndexUnavailable("gone".to_string()).is_embedding());
    }
}
