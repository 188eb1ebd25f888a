//! Browser native-messaging framing: each message is UTF-8 JSON preceded by
//! its byte length as a native-endian (little-endian on every supported
//! platform) `u32`.

use std::io::ErrorKind;

use serde::Serialize;
use tokio::io::AsyncRead;
use tokio::io::AsyncReadExt;
use tokio::io::AsyncWrite;
use tokio::io::AsyncWriteExt;

/// Largest message the browser will send to a host.
pub const MAX_INBOUND_BYTES: usize = 4 * 1024 * 1024;
/// Largest message the browser accepts from a host.
pub const MAX_OUTBOUND_BYTES: usize = 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("native messaging I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("message of {len} bytes exceeds the {limit}-byte limit")]
    TooLarge { len: usize, limit: usize },
    #[error("failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Reads one frame. Returns `None` when the stream ends before a new frame
/// starts.
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<Vec<u8>>, FrameError>
where
    R: AsyncRead + Unpin,
{
    let len = match reader.read_u32_le().await {
        Ok(len) => len as usize,
        Err(err) if err.kind() == ErrorKind::UnexpectedEof => return Ok(None),
        Err(err) => return Err(err.into()),
    };
    if len > MAX_INBOUND_BYTES {
        return Err(FrameError::TooLarge {
            len,
            limit: MAX_INBOUND_BYTES,
        });
    }

    let mut payload = vec![0; len];
    reader.read_exact(&mut payload).await?;
    Ok(Some(payload))
}

pub async fn write_message<W, T>(writer: &mut W, message: &T) -> Result<(), FrameError>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let payload = serde_json::to_vec(message)?;
    let len = u32::try_from(payload.len())
        .ok()
        .filter(|len| *len as usize <= MAX_OUTBOUND_BYTES)
        .ok_or(FrameError::TooLarge {
            len: payload.len(),
            limit: MAX_OUTBOUND_BYTES,
        })?;

    writer.write_u32_le(len).await?;
    writer.write_all(&payload).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[tokio::test]
    async fn writes_length_prefixed_json() {
        let mut out = Vec::new();
        write_message(&mut out, &json!({"type": "PING"}))
            .await
            .expect("write");

        let body = br#"{"type":"PING"}"#;
        assert_eq!(&out[..4], &(body.len() as u32).to_le_bytes());
        assert_eq!(&out[4..], body);
    }

    #[tokio::test]
    async fn reads_consecutive_frames_then_eof() {
        let mut stream = Vec::new();
        for body in [&b"{\"a\":1}"[..], &b"[]"[..]] {
            stream.extend_from_slice(&(body.len() as u32).to_le_bytes());
            stream.extend_from_slice(body);
        }
        let mut reader = stream.as_slice();

        assert_eq!(
            read_frame(&mut reader).await.expect("first"),
            Some(b"{\"a\":1}".to_vec())
        );
        assert_eq!(read_frame(&mut reader).await.expect("second"), Some(b"[]".to_vec()));
        assert_eq!(read_frame(&mut reader).await.expect("eof"), None);
    }

    #[tokio::test]
    async fn rejects_oversized_inbound_frame() {
        let header = ((MAX_INBOUND_BYTES + 1) as u32).to_le_bytes();
        let mut reader = &header[..];

        let err = read_frame(&mut reader).await.expect_err("too large");
        assert!(matches!(err, FrameError::TooLarge { limit, .. } if limit == MAX_INBOUND_BYTES));
    }

    #[tokio::test]
    async fn truncated_payload_is_an_error() {
        let mut stream = 10u32.to_le_bytes().to_vec();
        stream.extend_from_slice(b"{}");
        let mut reader = stream.as_slice();

        assert!(matches!(
            read_frame(&mut reader).await,
            Err(FrameError::Io(_))
        ));
    }

    #[tokio::test]
    async fn refuses_oversized_outbound_message() {
        let mut out = Vec::new();
        let big = "x".repeat(MAX_OUTBOUND_BYTES);

        let err = write_message(&mut out, &big).await.expect_err("too large");
        assert!(matches!(err, FrameError::TooLarge { .. }));
        assert!(out.is_empty());
    }
}
