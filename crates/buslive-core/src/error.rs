//! Error types for buslive-core.

use thiserror::Error;

/// Core error type
#[derive(Debug, Error)]
pub enum Error {
    /// Requested id is not in the registry
    #[error("unknown bus id: {0}")]
    UnknownBus(String),

    /// Upstream answered with a non-success status
    #[error("upstream returned status {status}")]
    UpstreamStatus {
        /// HTTP status code from the upstream store
        status: u16,
    },

    /// Connection, DNS or timeout failure talking to the upstream store
    #[error("upstream request failed: {0}")]
    UpstreamTransport(#[from] reqwest::Error),
}

impl Error {
    /// Whether this is a failed poll of the upstream store.
    ///
    /// Fetch failures are retried silently on the next refresh tick; anything
    /// else coming out of a refresh indicates a programming error and is
    /// logged at error level instead.
    #[must_use]
    pub fn is_fetch_failure(&self) -> bool {
        matches!(
            self,
            Self::UpstreamStatus { .. } | Self::UpstreamTransport(_)
        )
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
