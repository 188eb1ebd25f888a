//! Messages exchanged between the content pipeline and the background host.
//!
//! Requests are internally tagged on `type` (`PING`, `ANALYZE_WITH_OLLAMA`).
//! Both directions may carry an optional numeric `id` so responses can be
//! matched to requests when several are in flight on the same port.

use serde::Deserialize;
use serde::Serialize;

use crate::analysis::AnalysisResponse;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RuntimeRequest {
    /// Liveness probe sent once when the content pipeline starts.
    #[serde(rename = "PING")]
    Ping,
    #[serde(rename = "ANALYZE_WITH_OLLAMA")]
    AnalyzeWithOllama { text: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestEnvelope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    #[serde(flatten)]
    pub request: RuntimeRequest,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PongResponse {
    pub success: bool,
    pub message: String,
}

impl PongResponse {
    pub fn pong() -> Self {
        Self {
            success: true,
            message: "PONG".to_string(),
        }
    }
}

/// Sent back when a request could not be decoded or handled at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
        }
    }
}

/// Variant order matters for decoding: an analysis response is the only
/// shape with `data`, a pong the only one with `message`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RuntimeResponse {
    Analysis(AnalysisResponse),
    Pong(PongResponse),
    Error(ErrorResponse),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    #[serde(flatten)]
    pub response: RuntimeResponse,
}
