//! Animated-image search with a local call budget.
//!
//! [`GiphyClient`] is the production [`MediaSearch`] implementation. Every
//! search is sanitized (see [`sanitize_query`]) and counted against a
//! [`RateLimitState`] before any request leaves the process.

mod giphy;
mod query;
pub mod rate_limit;

use std::time::Duration;

use async_trait::async_trait;
use sticker_protocol::FailureKind;
use sticker_protocol::media::MediaCandidate;

pub use giphy::GiphyClient;
pub use query::MAX_QUERY_CHARS;
pub use query::sanitize_query;
pub use query::strip_links;
pub use rate_limit::RateLimitState;

pub const DEFAULT_BASE_URL: &str = "https://api.giphy.com";
/// Number of candidates shown in the suggestion panel.
pub const DEFAULT_RESULT_LIMIT: usize = 2;
pub const DEFAULT_MAX_CALLS_PER_WINDOW: u32 = 50;
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60 * 60);
/// Upper bound on one search round trip, body included.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("rate limit exceeded: {max_calls} searches per {window_secs}s")]
    RateLimited { max_calls: u32, window_secs: u64 },

    #[error("image search returned HTTP {status}")]
    Upstream { status: u16 },

    #[error("image search timed out after {}s", .after.as_secs())]
    Timeout { after: Duration },

    #[error("image search request failed: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("image search response was malformed: {0}")]
    Decode(#[source] reqwest::Error),
}

impl SearchError {
    pub fn kind(&self) -> FailureKind {
        match self {
            SearchError::RateLimited { .. } => FailureKind::RateLimited,
            SearchError::Timeout { .. } => FailureKind::Timeout,
            SearchError::Upstream { .. } | SearchError::Transport(_) | SearchError::Decode(_) => {
                FailureKind::UpstreamUnavailable
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchConfig {
    pub api_key: String,
    pub base_url: String,
    pub limit: usize,
    /// Content rating filter; `g` keeps results general-audience.
    pub rating: String,
    pub max_calls_per_window: u32,
    pub window: Duration,
    pub request_timeout: Duration,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            limit: DEFAULT_RESULT_LIMIT,
            rating: "g".to_string(),
            max_calls_per_window: DEFAULT_MAX_CALLS_PER_WINDOW,
            window: DEFAULT_WINDOW,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

/// Seam between the suggestion pipeline and the search backend.
#[async_trait]
pub trait MediaSearch: Send + Sync {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<MediaCandidate>, SearchError>;
}
