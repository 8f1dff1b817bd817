//! Activity feed error types
//!
//! All upstream fetch errors are wrapped in FeedError which
//! implements thiserror for consistent error handling.

use thiserror::Error;

/// Errors raised while fetching trades or positions from the data API
#[derive(Error, Debug)]
pub enum FeedError {
    /// Transport-level failure (DNS, connect, TLS, timeout)
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Upstream answered with a non-success status code
    #[error("Unexpected status {status} from {endpoint}: {body}")]
    Status {
        endpoint: String,
        status: u16,
        body: String,
    },

    /// Body could not be read as JSON at all
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl FeedError {
    /// True when the failure came from the transport rather than the server
    pub fn is_transport(&self) -> bool {
        matches!(self, FeedError::Http(_))
    }
}

/// Result type alias for feed operations
pub type FeedResult<T> = std::result::Result<T, FeedError>;
