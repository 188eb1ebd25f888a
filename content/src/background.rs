//! Client side of the runtime message channel to the privileged background
//! service.

use async_trait::async_trait;
use sticker_protocol::analysis::AnalysisResponse;
use sticker_protocol::message::RuntimeRequest;
use sticker_protocol::message::RuntimeResponse;

#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("background service is not reachable: {0}")]
    Disconnected(String),
    #[error("background service answered {request} with an unexpected response")]
    UnexpectedResponse { request: &'static str },
}

#[async_trait]
pub trait BackgroundChannel: Send + Sync {
    async fn send(&self, request: RuntimeRequest) -> Result<RuntimeResponse, ChannelError>;
}

/// Liveness probe sent once at startup.
pub async fn ping(channel: &dyn BackgroundChannel) -> Result<String, ChannelError> {
    match channel.send(RuntimeRequest::Ping).await? {
        RuntimeResponse::Pong(pong) => Ok(pong.message),
        _ => Err(ChannelError::UnexpectedResponse { request: "PING" }),
    }
}

/// Requests an analysis. Never fails: channel problems resolve to the
/// keyword fallback for `text`.
pub async fn analyze(channel: &dyn BackgroundChannel, text: &str) -> AnalysisResponse {
    let request = RuntimeRequest::AnalyzeWithOllama {
        text: text.to_string(),
    };
    let err = match channel.send(request).await {
        Ok(RuntimeResponse::Analysis(response)) => return response,
        Ok(RuntimeResponse::Error(err)) => err.error,
        Ok(_) => ChannelError::UnexpectedResponse {
            request: "ANALYZE_WITH_OLLAMA",
        }
        .to_string(),
        Err(err) => err.to_string(),
    };
    tracing::warn!("analysis request failed; using keyword fallback: {err}");
    AnalysisResponse::fallback(text, err)
}
