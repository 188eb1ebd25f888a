use std::sync::Mutex;
use std::sync::MutexGuard;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use sticker_protocol::media::MediaCandidate;
use tokio::time::Instant;

use crate::MediaSearch;
use crate::SearchConfig;
use crate::SearchError;
use crate::rate_limit::RateLimitState;
use crate::sanitize_query;

const SEARCH_PATH: &str = "/v1/gifs/search";

pub struct GiphyClient {
    http: reqwest::Client,
    config: SearchConfig,
    rate_limit: Mutex<RateLimitState>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    data: Vec<GifItem>,
}

#[derive(Debug, Deserialize)]
struct GifItem {
    #[serde(default)]
    title: String,
    #[serde(default)]
    images: GifImages,
}

#[derive(Debug, Default, Deserialize)]
struct GifImages {
    original: Option<Rendition>,
    preview_gif: Option<Rendition>,
}

#[derive(Debug, Deserialize)]
struct Rendition {
    url: String,
}

impl GifItem {
    /// `None` when either rendition is missing; such items cannot be shown
    /// and inserted.
    fn into_candidate(self) -> Option<MediaCandidate> {
        let GifImages {
            original: Some(original),
            preview_gif: Some(preview),
        } = self.images
        else {
            return None;
        };
        Some(MediaCandidate {
            full_url: original.url,
            preview_url: preview.url,
            title: self.title,
        })
    }
}

impl GiphyClient {
    pub fn new(config: SearchConfig) -> Result<Self, SearchError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("smart-sticker/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(SearchError::Transport)?;
        Ok(Self::with_http_client(http, config))
    }

    pub fn with_http_client(http: reqwest::Client, config: SearchConfig) -> Self {
        let rate_limit = RateLimitState::new(config.max_calls_per_window, config.window);
        Self {
            http,
            config,
            rate_limit: Mutex::new(rate_limit),
        }
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    fn rate_limit(&self) -> MutexGuard<'_, RateLimitState> {
        match self.rate_limit.lock() {
            Ok(guard) => guard,
            Err(err) => err.into_inner(),
        }
    }

    pub async fn search(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<MediaCandidate>, SearchError> {
        let query = sanitize_query(query);
        let reservation = self.rate_limit().reserve(Instant::now())?;

        match self.fetch(&query, limit).await {
            Ok(candidates) => {
                tracing::debug!(
                    query = %query,
                    results = candidates.len(),
                    "image search completed"
                );
                Ok(candidates)
            }
            Err(err) => {
                self.rate_limit().release(reservation);
                Err(err)
            }
        }
    }

    async fn fetch(&self, query: &str, limit: usize) -> Result<Vec<MediaCandidate>, SearchError> {
        let url = format!("{}{SEARCH_PATH}", self.config.base_url.trim_end_matches('/'));
        let limit = limit.to_string();
        let timeout = self.config.request_timeout;
        let response = self
            .http
            .get(url)
            .query(&[
                ("api_key", self.config.api_key.as_str()),
                ("q", query),
                ("limit", limit.as_str()),
                ("rating", self.config.rating.as_str()),
            ])
            .timeout(timeout)
            .send()
            .await
            .map_err(|err| transport_error(err, timeout))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SearchError::Upstream {
                status: status.as_u16(),
            });
        }

        let body = response.json::<SearchResponse>().await.map_err(|err| {
            if err.is_timeout() {
                SearchError::Timeout { after: timeout }
            } else {
                SearchError::Decode(err)
            }
        })?;

        let total = body.data.len();
        let candidates: Vec<MediaCandidate> = body
            .data
            .into_iter()
            .filter_map(GifItem::into_candidate)
            .collect();
        if candidates.len() < total {
            tracing::debug!(
                skipped = total - candidates.len(),
                "skipped results without both renditions"
            );
        }
        Ok(candidates)
    }
}

fn transport_error(err: reqwest::Error, timeout: Duration) -> SearchError {
    if err.is_timeout() {
        SearchError::Timeout { after: timeout }
    } else {
        SearchError::Transport(err)
    }
}

#[async_trait]
impl MediaSearch for GiphyClient {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<MediaCandidate>, SearchError> {
        GiphyClient::search(self, query, limit).await
    }
}
