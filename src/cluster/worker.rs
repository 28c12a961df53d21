//! The worker side of the dispatch channel.
//!
//! # Data Flow
//! ```text
//! stdin frame → DispatchMessage → spawned task → request handler
//!     → ReplyEnvelope → reply queue → stdout frame
//! ```
//!
//! Each dispatch runs in its own task, so one slow upstream never holds up
//! the rest of the pipe.

use std::sync::Arc;

use axum::http::StatusCode;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{broadcast, mpsc};

use crate::error::GatewayError;
use crate::health::HealthChecker;
use crate::protocol::codec::{self, FrameReader};
use crate::protocol::{write_frame, DispatchMessage, ReplyEnvelope, ReplyMessage};
use crate::proxy::{ProxyClient, RequestHandler};

const REPLY_QUEUE: usize = 1024;

/// Serve dispatches from `reader` until it closes or `shutdown` fires.
pub async fn serve<H, P, R, W>(
    handler: Arc<RequestHandler<H, P>>,
    reader: R,
    writer: W,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<(), GatewayError>
where
    H: HealthChecker,
    P: ProxyClient,
    R: AsyncRead + Unpin,
    W: AsyncWrite + Send + Unpin + 'static,
{
    let (replies, rx) = mpsc::channel(REPLY_QUEUE);
    let writer_task = tokio::spawn(reply_pump(writer, rx));
    let mut frames = FrameReader::new(reader);

    loop {
        let line = tokio::select! {
            frame = frames.next_frame() => match frame? {
                Some(line) => line,
                None => {
                    tracing::info!("Dispatch channel closed, worker exiting");
                    break;
                }
            },
            _ = shutdown.recv() => {
                tracing::info!("Worker received shutdown signal");
                break;
            }
        };

        match codec::decode::<DispatchMessage>(&line) {
            Ok(message) => spawn_dispatch(handler.clone(), message, replies.clone()),
            Err(e) => {
                tracing::warn!(error = %e, "Malformed dispatch");
                if let Some(id) = codec::recover_id(&line) {
                    let reply = ReplyMessage::from(&e);
                    let _ = replies.send(ReplyEnvelope::new(id, reply)).await;
                }
            }
        }
    }

    drop(replies);
    writer_task.abort();
    Ok(())
}

fn spawn_dispatch<H, P>(
    handler: Arc<RequestHandler<H, P>>,
    message: DispatchMessage,
    replies: mpsc::Sender<ReplyEnvelope>,
) where
    H: HealthChecker,
    P: ProxyClient,
{
    let id = message.id;
    let task = tokio::spawn(async move { handler.handle_request(&message).await });

    tokio::spawn(async move {
        let reply = match task.await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::error!(request_id = %id, error = %e, "Request handling panicked");
                ReplyMessage::failure(StatusCode::INTERNAL_SERVER_ERROR, "Internal worker error")
            }
        };

        if replies.send(ReplyEnvelope::new(id, reply)).await.is_err() {
            tracing::debug!(request_id = %id, "Reply channel closed, dropping reply");
        }
    });
}

async fn reply_pump<W: AsyncWrite + Unpin>(mut writer: W, mut rx: mpsc::Receiver<ReplyEnvelope>) {
    while let Some(envelope) = rx.recv().await {
        if let Err(e) = write_frame(&mut writer, &envelope).await {
            tracing::error!(error = %e, "Failed to write reply");
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use tokio::io::{AsyncWriteExt, DuplexStream};
    use uuid::Uuid;

    use super::*;
    use crate::config::{HealthCheckConfig, Rule, ServerConfig, UpstreamTarget};
    use crate::health::HttpHealthChecker;
    use crate::lifecycle::Shutdown;
    use crate::load_balancer::RoundRobin;
    use crate::routing::PrefixRuleEngine;

    struct PanickingClient;

    impl ProxyClient for PanickingClient {
        async fn make_request(
            &self,
            upstream: &UpstreamTarget,
            _path: &str,
        ) -> Result<String, GatewayError> {
            panic!("client failed hard calling {}", upstream.id)
        }
    }

    fn panicking_handler() -> Arc<RequestHandler<HttpHealthChecker, PanickingClient>> {
        let config = ServerConfig {
            upstreams: vec![UpstreamTarget::new("a", "localhost:1")],
            rules: vec![Rule::new("/api", ["a"])],
            ..ServerConfig::default()
        };
        let health = Arc::new(HttpHealthChecker::new(HealthCheckConfig::default()).unwrap());
        health.mark_active("a");

        Arc::new(RequestHandler::new(
            Arc::new(config),
            health,
            PanickingClient,
            Box::new(RoundRobin::new()),
            Box::new(PrefixRuleEngine::new()),
        ))
    }

    async fn next_reply(frames: &mut FrameReader<DuplexStream>) -> ReplyEnvelope {
        let line = frames.next_frame().await.unwrap().expect("worker closed stdout");
        codec::decode(&line).unwrap()
    }

    #[tokio::test]
    async fn failures_become_500_replies_and_worker_keeps_serving() {
        let (mut stdin, worker_reader) = tokio::io::duplex(64 * 1024);
        let (worker_writer, primary_reader) = tokio::io::duplex(64 * 1024);
        let shutdown = Shutdown::new();
        let worker = tokio::spawn(serve(
            panicking_handler(),
            worker_reader,
            worker_writer,
            shutdown.subscribe(),
        ));
        let mut replies = FrameReader::new(primary_reader);

        let dispatch = DispatchMessage::new("/api/x", BTreeMap::new());
        write_frame(&mut stdin, &dispatch).await.unwrap();
        let reply = next_reply(&mut replies).await;
        assert_eq!(reply.id, dispatch.id);
        assert_eq!(
            reply.reply,
            ReplyMessage::failure(StatusCode::INTERNAL_SERVER_ERROR, "Internal worker error")
        );

        let id = Uuid::new_v4();
        let malformed = format!("{{\"id\":\"{}\",\"requestType\":\"SMTP\"}}\n", id);
        stdin.write_all(malformed.as_bytes()).await.unwrap();
        let reply = next_reply(&mut replies).await;
        assert_eq!(reply.id, id);
        assert_eq!(reply.reply.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let wire = serde_json::to_value(&reply).unwrap();
        assert_eq!(wire["errorCode"], "500");

        // No id to answer; the frame is dropped.
        stdin.write_all(b"not json at all\n").await.unwrap();

        let unmatched = DispatchMessage::new("/nowhere", BTreeMap::new());
        write_frame(&mut stdin, &unmatched).await.unwrap();
        let reply = next_reply(&mut replies).await;
        assert_eq!(reply.id, unmatched.id);
        assert_eq!(reply.reply.status(), StatusCode::NOT_FOUND);

        assert!(!worker.is_finished());
        shutdown.trigger();
        worker.await.unwrap().unwrap();
    }
}
