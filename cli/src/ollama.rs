use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;
use sticker_protocol::FailureKind;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:11434";
pub const DEFAULT_MODEL: &str = "mistral:7b-instruct";
pub const DEFAULT_GENERATE_TIMEOUT: Duration = Duration::from_secs(30);
/// Budget for the `/api/tags` liveness probe.
pub const TAGS_TIMEOUT: Duration = Duration::from_secs(5);

// Sampling tuned for short, repeatable phrase lists.
const TEMPERATURE: f32 = 0.3;
const TOP_P: f32 = 0.9;
const TOP_K: u32 = 40;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OllamaConfig {
    pub base_url: String,
    pub model: String,
    pub generate_timeout: Duration,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            generate_timeout: DEFAULT_GENERATE_TIMEOUT,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum OllamaError {
    #[error("Ollama API not accessible: {endpoint} returned HTTP {status}")]
    Status { endpoint: &'static str, status: u16 },

    #[error("Ollama request to {endpoint} timed out after {}s", .after.as_secs())]
    Timeout {
        endpoint: &'static str,
        after: Duration,
    },

    #[error("Ollama request to {endpoint} failed: {source}")]
    Transport {
        endpoint: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("Invalid response from Ollama API: {0}")]
    Decode(#[source] reqwest::Error),

    #[error("Invalid response from Ollama API: no generated text")]
    MissingResponse,
}

impl OllamaError {
    pub fn kind(&self) -> FailureKind {
        match self {
            OllamaError::Timeout { .. } => FailureKind::Timeout,
            OllamaError::Status { .. }
            | OllamaError::Transport { .. }
            | OllamaError::Decode(_)
            | OllamaError::MissingResponse => FailureKind::UpstreamUnavailable,
        }
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: SamplingOptions,
}

#[derive(Debug, Serialize)]
struct SamplingOptions {
    temperature: f32,
    top_p: f32,
    top_k: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelTag>,
}

#[derive(Debug, Deserialize)]
struct ModelTag {
    name: String,
}

/// Minimal client for a local Ollama server.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    http: reqwest::Client,
    config: OllamaConfig,
}

impl OllamaClient {
    pub fn new(config: OllamaConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("smart-sticker/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &OllamaConfig {
        &self.config
    }

    /// Names of the locally installed models.
    pub async fn list_models(&self) -> Result<Vec<String>, OllamaError> {
        const ENDPOINT: &str = "/api/tags";
        let response = self
            .http
            .get(self.url(ENDPOINT))
            .header(reqwest::header::ACCEPT, "application/json")
            .timeout(TAGS_TIMEOUT)
            .send()
            .await
            .map_err(|err| request_error(ENDPOINT, TAGS_TIMEOUT, err))?;
        check_status(ENDPOINT, response.status())?;

        let tags = response
            .json::<TagsResponse>()
            .await
            .map_err(OllamaError::Decode)?;
        Ok(tags.models.into_iter().map(|model| model.name).collect())
    }

    /// Runs a single non-streaming completion and returns the generated text.
    pub async fn generate(&self, prompt: &str) -> Result<String, OllamaError> {
        const ENDPOINT: &str = "/api/generate";
        let timeout = self.config.generate_timeout;
        let body = GenerateRequest {
            model: &self.config.model,
            prompt,
            stream: false,
            options: SamplingOptions {
                temperature: TEMPERATURE,
                top_p: TOP_P,
                top_k: TOP_K,
            },
        };
        let response = self
            .http
            .post(self.url(ENDPOINT))
            .json(&body)
            .timeout(timeout)
            .send()
            .await
            .map_err(|err| request_error(ENDPOINT, timeout, err))?;
        check_status(ENDPOINT, response.status())?;

        let generated = response
            .json::<GenerateResponse>()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    OllamaError::Timeout {
                        endpoint: ENDPOINT,
                        after: timeout,
                    }
                } else {
                    OllamaError::Decode(err)
                }
            })?;
        match generated.response {
            Some(text) if !text.is_empty() => Ok(text),
            _ => Err(OllamaError::MissingResponse),
        }
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{endpoint}", self.config.base_url.trim_end_matches('/'))
    }
}

fn request_error(endpoint: &'static str, after: Duration, err: reqwest::Error) -> OllamaError {
    if err.is_timeout() {
        OllamaError::Timeout { endpoint, after }
    } else {
        OllamaError::Transport {
            endpoint,
            source: err,
        }
    }
}

fn check_status(endpoint: &'static str, status: reqwest::StatusCode) -> Result<(), OllamaError> {
    if status.is_success() {
        Ok(())
    } else {
        Err(OllamaError::Status {
            endpoint,
            status: status.as_u16(),
        })
    }
}
