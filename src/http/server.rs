//! Front server setup.
//!
//! # Responsibilities
//! - Build the axum router every inbound request goes through
//! - Bind the HTTP listener and, when enabled, the TLS listener
//! - Hand each request to a random live worker and await its reply
//! - Drain both listeners on shutdown

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::response::Response;
use axum::routing::any;
use axum::Router;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;

use crate::cluster::WorkerManager;
use crate::config::ServerConfig;
use crate::error::GatewayError;
use crate::http::response::{error_response, reply_response};
use crate::lifecycle::Shutdown;
use crate::net::tls::{self, CertificateSource};
use crate::observability::metrics;
use crate::protocol::DispatchMessage;

const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// State injected into the proxy handler.
#[derive(Clone)]
struct FrontState {
    workers: Arc<WorkerManager>,
    dispatch_timeout: Duration,
    scheme: &'static str,
}

/// The client-facing side of the primary.
pub struct FrontServer {
    config: Arc<ServerConfig>,
    workers: Arc<WorkerManager>,
}

/// Listeners that are accepting connections.
pub struct RunningServer {
    pub http_addr: SocketAddr,
    pub https_addr: Option<SocketAddr>,
    tasks: Vec<JoinHandle<std::io::Result<()>>>,
}

impl RunningServer {
    /// Wait for every listener to finish draining.
    pub async fn wait(self) {
        for task in self.tasks {
            match task.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::error!(error = %e, "Listener failed"),
                Err(e) => tracing::error!(error = %e, "Listener task failed"),
            }
        }
        tracing::info!("Front server stopped");
    }
}

impl FrontServer {
    pub fn new(config: Arc<ServerConfig>, workers: Arc<WorkerManager>) -> Self {
        Self { config, workers }
    }

    /// Router for one listener; `scheme` is reported to workers as
    /// `x-forwarded-proto`.
    pub fn router(&self, scheme: &'static str) -> Router {
        let state = FrontState {
            workers: self.workers.clone(),
            dispatch_timeout: self.config.dispatch_timeout(),
            scheme,
        };

        Router::new()
            .route("/{*path}", any(proxy_request))
            .route("/", any(proxy_request))
            .with_state(state)
            .layer(TraceLayer::new_for_http())
    }

    /// Bind the listeners and start serving. Bind failures are returned;
    /// TLS setup failures only disable the TLS listener.
    pub async fn start(&self, shutdown: &Shutdown) -> Result<RunningServer, GatewayError> {
        let listener = TcpListener::bind(("0.0.0.0", self.config.listen)).await?;
        let http_addr = listener.local_addr()?;

        let app = self.router("http");
        let mut rx = shutdown.subscribe();
        let mut tasks = vec![tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = rx.recv().await;
                })
                .await
        })];

        let https_addr = match self.config.tls() {
            Some(tls_config) => match tls::load_tls_config(tls_config).await {
                Ok((rustls_config, source)) => {
                    let std_listener = std::net::TcpListener::bind(("0.0.0.0", tls_config.port()))?;
                    std_listener.set_nonblocking(true)?;
                    let addr = std_listener.local_addr()?;

                    let handle = axum_server::Handle::new();
                    let drain = handle.clone();
                    let mut rx = shutdown.subscribe();
                    tokio::spawn(async move {
                        let _ = rx.recv().await;
                        drain.graceful_shutdown(Some(DRAIN_TIMEOUT));
                    });

                    let app = self.router("https");
                    tasks.push(tokio::spawn(async move {
                        axum_server::from_tcp_rustls(std_listener, rustls_config)
                            .handle(handle)
                            .serve(app.into_make_service())
                            .await
                    }));

                    match source {
                        CertificateSource::Files { cert, key } => {
                            tracing::info!(cert = %cert, key = %key, "Using configured certificate")
                        }
                        CertificateSource::SelfSigned => {
                            tracing::warn!("Using generated self-signed certificate (development only)")
                        }
                    }
                    Some(addr)
                }
                Err(e) => {
                    tracing::warn!(error = %e, "TLS setup failed, serving HTTP only");
                    None
                }
            },
            None => None,
        };

        tracing::info!(
            http = %format!("http://{}", http_addr),
            https = %https_addr.map(|a| format!("https://{}", a)).unwrap_or_else(|| "disabled".to_string()),
            workers = self.workers.worker_count(),
            "Gateway listening"
        );

        Ok(RunningServer {
            http_addr,
            https_addr,
            tasks,
        })
    }
}

/// Forward one request to a worker and translate its reply.
async fn proxy_request(State(state): State<FrontState>, request: Request) -> Response {
    let start = Instant::now();
    let url = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| "/".to_string());

    let mut headers = collect_headers(request.headers());
    headers.insert("x-forwarded-proto".to_string(), state.scheme.to_string());
    let message = DispatchMessage::new(url, headers);

    let response = match state.workers.random_worker() {
        Ok(worker) => {
            tracing::debug!(worker = worker.id(), request_id = %message.id, url = %message.url, "Dispatching request");
            match worker.dispatch(message, state.dispatch_timeout).await {
                Ok(reply) => reply_response(reply, worker.id()),
                Err(e) => error_response(&e),
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "No worker to dispatch to");
            error_response(&e)
        }
    };

    metrics::record_request(response.status().as_u16(), start);
    response
}

/// Header map flattened to name → value; repeated names are comma-joined and
/// non-UTF-8 values skipped.
fn collect_headers(map: &HeaderMap) -> BTreeMap<String, String> {
    let mut headers: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in map {
        let Ok(value) = value.to_str() else { continue };
        headers
            .entry(name.as_str().to_string())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(value);
            })
            .or_insert_with(|| value.to_string());
    }
    headers
}
