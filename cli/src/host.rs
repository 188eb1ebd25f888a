//! Native-messaging host: answers the extension's runtime messages over
//! stdio.
//!
//! Requests are read sequentially; each analysis runs on its own task so a
//! slow model never blocks a `PING`. Responses funnel through one writer task
//! because frames must not interleave on stdout.

use std::sync::Arc;
use std::time::Duration;

use sticker_protocol::analysis::AnalysisResponse;
use sticker_protocol::message::ErrorResponse;
use sticker_protocol::message::PongResponse;
use sticker_protocol::message::RequestEnvelope;
use sticker_protocol::message::ResponseEnvelope;
use sticker_protocol::message::RuntimeRequest;
use sticker_protocol::message::RuntimeResponse;
use tokio::io::AsyncRead;
use tokio::io::AsyncWrite;
use tokio::sync::mpsc;

use crate::analyzer::Analyze;
use crate::native_messaging::FrameError;
use crate::native_messaging::read_frame;
use crate::native_messaging::write_message;

/// Deadline for answering an analysis request. Shorter than the model's own
/// timeout, so the extension always hears back promptly.
pub const ANALYSIS_DEADLINE: Duration = Duration::from_secs(10);
pub const ANALYSIS_TIMEOUT_MESSAGE: &str = "Analysis timed out";

const CHANNEL_CAPACITY: usize = 32;

/// Serves requests from `reader` until it reaches EOF, then waits for every
/// in-flight response to be written.
pub async fn serve<R, W>(mut reader: R, mut writer: W, analyzer: Arc<dyn Analyze>) -> anyhow::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (response_tx, mut response_rx) = mpsc::channel::<ResponseEnvelope>(CHANNEL_CAPACITY);

    let writer_handle = tokio::spawn(async move {
        while let Some(envelope) = response_rx.recv().await {
            if let Err(err) = write_message(&mut writer, &envelope).await {
                tracing::error!("failed to write response: {err}");
                if matches!(err, FrameError::Io(_)) {
                    break;
                }
            }
        }
        tracing::debug!("response writer exited");
    });

    let read_result = loop {
        let payload = match read_frame(&mut reader).await {
            Ok(Some(payload)) => payload,
            Ok(None) => break Ok(()),
            Err(err) => break Err(anyhow::Error::new(err).context("read request")),
        };

        let envelope = match serde_json::from_slice::<RequestEnvelope>(&payload) {
            Ok(envelope) => envelope,
            Err(err) => {
                tracing::warn!("undecodable request: {err}");
                let id = request_id(&payload);
                let response =
                    RuntimeResponse::Error(ErrorResponse::new(format!("invalid request: {err}")));
                if response_tx.send(ResponseEnvelope { id, response }).await.is_err() {
                    break Ok(());
                }
                continue;
            }
        };

        let id = envelope.id;
        match envelope.request {
            RuntimeRequest::Ping => {
                let response = RuntimeResponse::Pong(PongResponse::pong());
                if response_tx.send(ResponseEnvelope { id, response }).await.is_err() {
                    break Ok(());
                }
            }
            RuntimeRequest::AnalyzeWithOllama { text } => {
                let analyzer = Arc::clone(&analyzer);
                let response_tx = response_tx.clone();
                tokio::spawn(async move {
                    let response = analyze_with_deadline(analyzer.as_ref(), &text).await;
                    let envelope = ResponseEnvelope {
                        id,
                        response: RuntimeResponse::Analysis(response),
                    };
                    if response_tx.send(envelope).await.is_err() {
                        tracing::debug!("response writer gone; dropping analysis");
                    }
                });
            }
        }
    };

    // Spawned analyses hold their own senders; the writer drains until the
    // last of them finishes.
    drop(response_tx);
    if let Err(err) = writer_handle.await {
        tracing::error!("response writer panicked: {err}");
    }
    read_result
}

/// Bounds the analysis by [`ANALYSIS_DEADLINE`]. On expiry the in-flight
/// analysis is dropped and the keyword fallback answers instead.
pub async fn analyze_with_deadline(analyzer: &dyn Analyze, text: &str) -> AnalysisResponse {
    match tokio::time::timeout(ANALYSIS_DEADLINE, analyzer.analyze(text)).await {
        Ok(response) => response,
        Err(_) => {
            tracing::warn!(
                "analysis exceeded {}s; answering with keyword fallback",
                ANALYSIS_DEADLINE.as_secs()
            );
            AnalysisResponse::fallback(text, ANALYSIS_TIMEOUT_MESSAGE)
        }
    }
}

/// Best-effort `id` recovery from a request that failed to decode.
fn request_id(payload: &[u8]) -> Option<u64> {
    serde_json::from_slice::<serde_json::Value>(payload)
        .ok()?
        .get("id")?
        .as_u64()
}
