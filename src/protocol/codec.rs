//! Newline-delimited JSON framing for the worker pipes.
//!
//! Each message is a single JSON document followed by `\n`. serde_json never
//! emits a raw newline inside a document, so the newline is an unambiguous
//! frame boundary.

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, Lines};
use uuid::Uuid;

use crate::error::GatewayError;

/// Encode one message as a frame, including the trailing newline.
pub fn encode<T: Serialize>(message: &T) -> Result<Vec<u8>, GatewayError> {
    let mut frame =
        serde_json::to_vec(message).map_err(|e| GatewayError::Protocol(e.to_string()))?;
    frame.push(b'\n');
    Ok(frame)
}

/// Decode one frame (without its newline).
pub fn decode<T: DeserializeOwned>(line: &str) -> Result<T, GatewayError> {
    serde_json::from_str(line).map_err(|e| GatewayError::Protocol(e.to_string()))
}

/// Best-effort extraction of the correlation id from a frame that failed to
/// decode, so the peer can still be answered.
pub fn recover_id(line: &str) -> Option<Uuid> {
    let value: serde_json::Value = serde_json::from_str(line).ok()?;
    value.get("id")?.as_str()?.parse().ok()
}

/// Write one message and flush it.
pub async fn write_frame<W, T>(writer: &mut W, message: &T) -> Result<(), GatewayError>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let frame = encode(message)?;
    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}

/// Reads frames from a pipe, skipping blank lines.
pub struct FrameReader<R> {
    lines: Lines<BufReader<R>>,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: BufReader::new(reader).lines(),
        }
    }

    /// Next raw frame, or `None` once the peer closed the pipe.
    pub async fn next_frame(&mut self) -> std::io::Result<Option<String>> {
        loop {
            match self.lines.next_line().await? {
                Some(line) if line.trim().is_empty() => continue,
                other => return Ok(other),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::messages::{DispatchMessage, ReplyEnvelope, ReplyMessage};
    use std::collections::BTreeMap;

    #[test]
    fn frame_ends_with_single_newline() {
        let mut headers = BTreeMap::new();
        headers.insert("x-note".to_string(), "line1\nline2".to_string());
        let frame = encode(&DispatchMessage::new("/", headers)).unwrap();

        assert_eq!(frame.last(), Some(&b'\n'));
        assert_eq!(frame.iter().filter(|b| **b == b'\n').count(), 1);
    }

    #[test]
    fn recovers_id_from_invalid_dispatch() {
        let id = Uuid::new_v4();
        let line = format!(r#"{{"id":"{}","requestType":"FTP"}}"#, id);

        assert!(decode::<DispatchMessage>(&line).is_err());
        assert_eq!(recover_id(&line), Some(id));
        assert_eq!(recover_id("not json"), None);
    }

    #[tokio::test]
    async fn frames_cross_a_pipe() {
        let (mut client, server) = tokio::io::duplex(1024);
        let id = Uuid::new_v4();

        write_frame(&mut client, &ReplyEnvelope::new(id, ReplyMessage::success("a")))
            .await
            .unwrap();
        client.write_all(b"\n").await.unwrap();
        write_frame(&mut client, &ReplyEnvelope::new(id, ReplyMessage::success("b")))
            .await
            .unwrap();
        drop(client);

        let mut reader = FrameReader::new(server);
        let first: ReplyEnvelope = decode(&reader.next_frame().await.unwrap().unwrap()).unwrap();
        let second: ReplyEnvelope = decode(&reader.next_frame().await.unwrap().unwrap()).unwrap();
        assert_eq!(first.reply.body(), "a");
        assert_eq!(second.reply.body(), "b");
        assert!(reader.next_frame().await.unwrap().is_none());
    }
}
