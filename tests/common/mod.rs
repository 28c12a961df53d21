//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use cluster_gateway::cluster::worker;
use cluster_gateway::cluster::{LaunchedWorker, WorkerLauncher};
use cluster_gateway::config::{Rule, ServerConfig, UpstreamTarget};
use cluster_gateway::error::GatewayError;
use cluster_gateway::lifecycle::Shutdown;
use cluster_gateway::protocol::FrameReader;
use cluster_gateway::proxy::RequestHandler;
use dashmap::DashMap;
use futures_util::FutureExt;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::AbortHandle;

/// Read one request head and return its path.
async fn read_path(socket: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                buf.extend_from_slice(&chunk[..n]);
                if buf.windows(4).any(|w| w == b"\r\n\r\n") {
                    break;
                }
            }
        }
    }

    let head = String::from_utf8_lossy(&buf);
    head.lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .unwrap_or("/")
        .to_string()
}

async fn write_response(socket: &mut TcpStream, status: u16, body: &str) {
    let reason = match status {
        200 => "OK",
        404 => "Not Found",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Unknown",
    };
    let response = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        reason,
        body.len(),
        body
    );
    let _ = socket.write_all(response.as_bytes()).await;
    let _ = socket.shutdown().await;
}

/// Start a programmable mock upstream on an ephemeral port.
pub async fn start_programmable_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let f = f.clone();
            tokio::spawn(async move {
                let path = read_path(&mut socket).await;
                let (status, body) = f(path).await;
                write_response(&mut socket, status, &body).await;
            });
        }
    });

    addr
}

/// Mock upstream: `/health-check` answers 200 `OK`, anything else answers
/// 200 with `<name> <path>`.
pub async fn start_mock_backend(name: &'static str) -> SocketAddr {
    start_programmable_backend(move |path| async move {
        if path == "/health-check" {
            (200, "OK".to_string())
        } else {
            (200, format!("{} {}", name, path))
        }
    })
    .await
}

/// An address nothing listens on.
pub async fn dead_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

/// Config with one `/api` rule over the given upstreams.
pub fn server_config(upstreams: &[(&str, SocketAddr)]) -> ServerConfig {
    ServerConfig {
        listen: 0,
        upstreams: upstreams
            .iter()
            .map(|(id, addr)| UpstreamTarget::new(*id, addr.to_string()))
            .collect(),
        rules: vec![Rule::new("/api", upstreams.iter().map(|(id, _)| id.to_string()))],
        ..ServerConfig::default()
    }
}

/// Poll `cond` until it holds or `timeout` passes.
pub async fn wait_until<F: Fn() -> bool>(cond: F, timeout: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    cond()
}

/// Runs workers as tasks in this process, wired over in-memory pipes.
pub struct InProcessLauncher {
    config: Arc<ServerConfig>,
    shutdown: Shutdown,
    running: DashMap<u64, AbortHandle>,
    launches: AtomicUsize,
}

impl InProcessLauncher {
    pub fn new(config: ServerConfig) -> Arc<Self> {
        Arc::new(Self {
            config: Arc::new(config),
            shutdown: Shutdown::new(),
            running: DashMap::new(),
            launches: AtomicUsize::new(0),
        })
    }

    /// Abort a worker as if its process had crashed.
    pub fn kill(&self, worker_id: u64) -> bool {
        match self.running.remove(&worker_id) {
            Some((_, handle)) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }
}

impl WorkerLauncher for InProcessLauncher {
    fn launch(&self, worker_id: u64) -> Result<LaunchedWorker, GatewayError> {
        let (primary_writer, worker_reader) = tokio::io::duplex(64 * 1024);
        let (worker_writer, primary_reader) = tokio::io::duplex(64 * 1024);

        let (handler, _monitor) =
            RequestHandler::from_config(self.config.clone(), self.shutdown.subscribe())?;
        let task = tokio::spawn(worker::serve(
            Arc::new(handler),
            worker_reader,
            worker_writer,
            self.shutdown.subscribe(),
        ));

        self.running.insert(worker_id, task.abort_handle());
        self.launches.fetch_add(1, Ordering::SeqCst);

        Ok(LaunchedWorker {
            pid: None,
            writer: Box::new(primary_writer),
            reader: Box::new(primary_reader),
            exited: async move {
                match task.await {
                    Ok(Ok(())) => "exited".to_string(),
                    Ok(Err(e)) => format!("failed: {}", e),
                    Err(e) => format!("aborted: {}", e),
                }
            }
            .boxed(),
        })
    }
}

/// Workers that read dispatches and never answer.
pub struct SilentLauncher;

impl WorkerLauncher for SilentLauncher {
    fn launch(&self, _worker_id: u64) -> Result<LaunchedWorker, GatewayError> {
        let (primary_writer, worker_reader) = tokio::io::duplex(64 * 1024);
        let (worker_writer, primary_reader) = tokio::io::duplex(64 * 1024);

        let task = tokio::spawn(async move {
            let _keep_open = worker_writer;
            let mut frames = FrameReader::new(worker_reader);
            while let Ok(Some(_)) = frames.next_frame().await {}
        });

        Ok(LaunchedWorker {
            pid: None,
            writer: Box::new(primary_writer),
            reader: Box::new(primary_reader),
            exited: async move {
                let _ = task.await;
                "exited".to_string()
            }
            .boxed(),
        })
    }
}

/// Every launch fails.
pub struct FailingLauncher;

impl WorkerLauncher for FailingLauncher {
    fn launch(&self, _worker_id: u64) -> Result<LaunchedWorker, GatewayError> {
        Err(GatewayError::WorkerLaunch(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "no such executable",
        )))
    }
}

/// Workers that never read their stdin, so the pipe backs up.
pub struct StalledLauncher;

impl WorkerLauncher for StalledLauncher {
    fn launch(&self, _worker_id: u64) -> Result<LaunchedWorker, GatewayError> {
        let (primary_writer, worker_reader) = tokio::io::duplex(1024);
        let (worker_writer, primary_reader) = tokio::io::duplex(1024);

        Ok(LaunchedWorker {
            pid: None,
            writer: Box::new(primary_writer),
            reader: Box::new(primary_reader),
            exited: async move {
                let _pipes = (worker_reader, worker_writer);
                futures_util::future::pending::<()>().await;
                "exited".to_string()
            }
            .boxed(),
        })
    }
}

/// The first worker writes bytes that are not UTF-8 to stdout and then
/// stays running; later workers are silent.
#[derive(Default)]
pub struct GarbledLauncher {
    launches: AtomicUsize,
    first_released: Arc<AtomicBool>,
}

impl GarbledLauncher {
    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    /// Whether the first worker's exit future was dropped, which kills a
    /// real child process.
    pub fn first_released(&self) -> bool {
        self.first_released.load(Ordering::SeqCst)
    }
}

struct SetOnDrop(Arc<AtomicBool>);

impl Drop for SetOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

impl WorkerLauncher for GarbledLauncher {
    fn launch(&self, _worker_id: u64) -> Result<LaunchedWorker, GatewayError> {
        let first = self.launches.fetch_add(1, Ordering::SeqCst) == 0;
        let (primary_writer, worker_reader) = tokio::io::duplex(64 * 1024);
        let (mut worker_writer, primary_reader) = tokio::io::duplex(64 * 1024);
        let guard = first.then(|| SetOnDrop(self.first_released.clone()));

        Ok(LaunchedWorker {
            pid: None,
            writer: Box::new(primary_writer),
            reader: Box::new(primary_reader),
            exited: async move {
                let _guard = guard;
                if first {
                    let _ = worker_writer.write_all(b"\xff\xfe\n").await;
                }
                let _pipes = (worker_reader, worker_writer);
                futures_util::future::pending::<()>().await;
                "exited".to_string()
            }
            .boxed(),
        })
    }
}
