//! Worker pool management in the primary.
//!
//! # Responsibilities
//! - Start the configured number of workers
//! - Correlate replies with dispatches by id
//! - Replace workers that exit, backing off when a relaunch fails
//! - Pick a live worker for each request
//!
//! # State Transitions
//! ```text
//! launched → live (in pool) → exited (removed, pending dispatches fail)
//!                                 → replacement launched in the same slot
//! ```

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use dashmap::DashMap;
use futures_util::future::{self, BoxFuture};
use futures_util::FutureExt;
use rand::seq::SliceRandom;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::{broadcast, mpsc, oneshot, Notify};
use tokio::task::JoinHandle;
use tokio::time;
use uuid::Uuid;

use crate::cluster::launcher::{LaunchedWorker, WorkerLauncher};
use crate::error::GatewayError;
use crate::lifecycle::Shutdown;
use crate::observability::metrics;
use crate::protocol::codec::{self, FrameReader};
use crate::protocol::{DispatchMessage, ReplyEnvelope, ReplyMessage};
use crate::resilience::calculate_backoff;

const RESPAWN_BACKOFF_BASE_MS: u64 = 100;
const RESPAWN_BACKOFF_MAX_MS: u64 = 5_000;
const OUTBOUND_QUEUE: usize = 1024;

/// The primary's view of one worker.
#[derive(Debug)]
pub struct WorkerHandle {
    id: u64,
    pid: Option<u32>,
    alive: AtomicBool,
    outbound: mpsc::Sender<Vec<u8>>,
    pending: DashMap<Uuid, oneshot::Sender<ReplyMessage>>,
    /// Signalled when either pipe dies, even if the process lives on.
    closed: Notify,
}

impl WorkerHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// Dispatches awaiting a reply.
    pub fn in_flight(&self) -> usize {
        self.pending.len()
    }

    /// Send a dispatch and wait up to `timeout` for its reply.
    ///
    /// The deadline covers queueing the frame as well as the reply, so a worker
    /// that stops reading stdin cannot hold callers past `timeout`. A timed-out
    /// dispatch is forgotten; a reply arriving later is dropped.
    pub async fn dispatch(
        &self,
        message: DispatchMessage,
        timeout: Duration,
    ) -> Result<ReplyMessage, GatewayError> {
        let id = message.id;
        let frame = codec::encode(&message)?;

        let (tx, rx) = oneshot::channel();
        self.pending.insert(id, tx);

        let exchange = async {
            if !self.is_alive() || self.outbound.send(frame).await.is_err() {
                return Err(GatewayError::WorkerUnavailable(self.id));
            }
            rx.await.map_err(|_| GatewayError::WorkerUnavailable(self.id))
        };

        let result = match time::timeout(timeout, exchange).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(worker = self.id, request_id = %id, "Dispatch timed out");
                Err(GatewayError::GatewayTimeout)
            }
        };
        if result.is_err() {
            self.pending.remove(&id);
        }
        result
    }

    fn mark_dead(&self) {
        self.alive.store(false, Ordering::Release);
        // Dropping the senders fails every waiting dispatch.
        self.pending.clear();
        self.closed.notify_one();
    }
}

/// Attach pumps to a launched worker and return its handle.
fn attach(
    id: u64,
    pid: Option<u32>,
    writer: Box<dyn AsyncWrite + Send + Unpin>,
    reader: Box<dyn AsyncRead + Send + Unpin>,
) -> Arc<WorkerHandle> {
    let (outbound, rx) = mpsc::channel(OUTBOUND_QUEUE);
    let handle = Arc::new(WorkerHandle {
        id,
        pid,
        alive: AtomicBool::new(true),
        outbound,
        pending: DashMap::new(),
        closed: Notify::new(),
    });

    tokio::spawn(write_pump(Arc::downgrade(&handle), writer, rx));
    tokio::spawn(read_pump(handle.clone(), reader));
    handle
}

/// Ends once the handle is dropped (its sender goes with it) or a write fails.
async fn write_pump(
    handle: Weak<WorkerHandle>,
    mut writer: Box<dyn AsyncWrite + Send + Unpin>,
    mut rx: mpsc::Receiver<Vec<u8>>,
) {
    while let Some(frame) = rx.recv().await {
        let result = async {
            writer.write_all(&frame).await?;
            writer.flush().await
        }
        .await;

        if let Err(e) = result {
            if let Some(handle) = handle.upgrade() {
                tracing::warn!(worker = handle.id, error = %e, "Worker stdin closed");
                handle.mark_dead();
            }
            return;
        }
    }
}

async fn read_pump(handle: Arc<WorkerHandle>, reader: Box<dyn AsyncRead + Send + Unpin>) {
    let mut frames = FrameReader::new(reader);

    loop {
        match frames.next_frame().await {
            Ok(Some(line)) => match codec::decode::<ReplyEnvelope>(&line) {
                Ok(envelope) => match handle.pending.remove(&envelope.id) {
                    Some((_, tx)) => {
                        let _ = tx.send(envelope.reply);
                    }
                    None => {
                        tracing::debug!(worker = handle.id, request_id = %envelope.id, "Dropping reply with no pending dispatch");
                    }
                },
                Err(e) => {
                    tracing::warn!(worker = handle.id, error = %e, "Discarding malformed reply");
                }
            },
            Ok(None) => break,
            Err(e) => {
                tracing::warn!(worker = handle.id, error = %e, "Failed reading worker stdout");
                break;
            }
        }
    }

    handle.mark_dead();
}

/// Owns the worker pool of the primary.
pub struct WorkerManager {
    launcher: Arc<dyn WorkerLauncher>,
    size: usize,
    workers: DashMap<u64, Arc<WorkerHandle>>,
    next_id: AtomicU64,
    shutdown: Shutdown,
    supervisors: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerManager {
    pub fn new(launcher: Arc<dyn WorkerLauncher>, size: usize, shutdown: Shutdown) -> Arc<Self> {
        Arc::new(Self {
            launcher,
            size,
            workers: DashMap::new(),
            next_id: AtomicU64::new(1),
            shutdown,
            supervisors: Mutex::new(Vec::new()),
        })
    }

    /// Start every slot. Any launch failure here is returned to the caller.
    pub fn initialize_workers(self: &Arc<Self>) -> Result<(), GatewayError> {
        for slot in 0..self.size {
            let (handle, exited) = self.start_worker()?;
            let supervisor = tokio::spawn(self.clone().supervise(slot, handle, exited, self.shutdown.subscribe()));
            self.supervisors
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .push(supervisor);
        }

        tracing::info!(workers = self.size, "Worker pool started");
        Ok(())
    }

    /// Uniform pick over live workers.
    pub fn random_worker(&self) -> Result<Arc<WorkerHandle>, GatewayError> {
        let live: Vec<Arc<WorkerHandle>> = self
            .workers
            .iter()
            .filter(|entry| entry.value().is_alive())
            .map(|entry| entry.value().clone())
            .collect();

        live.choose(&mut rand::thread_rng())
            .cloned()
            .ok_or(GatewayError::NoWorkersAvailable)
    }

    /// Live workers in the pool.
    pub fn worker_count(&self) -> usize {
        self.workers.iter().filter(|entry| entry.value().is_alive()).count()
    }

    pub fn worker_ids(&self) -> Vec<u64> {
        let mut ids: Vec<u64> = self.workers.iter().map(|entry| *entry.key()).collect();
        ids.sort_unstable();
        ids
    }

    /// Wait for every supervisor to stop. Call after triggering shutdown.
    pub async fn stop(&self) {
        let supervisors: Vec<_> = self
            .supervisors
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .drain(..)
            .collect();

        for supervisor in supervisors {
            if let Err(e) = supervisor.await {
                tracing::error!(error = %e, "Worker supervisor failed");
            }
        }
        tracing::info!("All workers stopped");
    }

    fn start_worker(&self) -> Result<(Arc<WorkerHandle>, BoxFuture<'static, String>), GatewayError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let LaunchedWorker {
            pid,
            writer,
            reader,
            exited,
        } = self.launcher.launch(id)?;

        let handle = attach(id, pid, writer, reader);
        self.workers.insert(id, handle.clone());
        metrics::record_workers_live(self.workers.len());
        tracing::info!(worker = id, pid = ?pid, "Worker started");
        Ok((handle, exited))
    }

    fn remove_worker(&self, id: u64) {
        if let Some((_, handle)) = self.workers.remove(&id) {
            handle.mark_dead();
        }
        metrics::record_workers_live(self.workers.len());
    }

    /// Watch one slot: when its worker exits or its pipes die, launch a
    /// replacement.
    async fn supervise(
        self: Arc<Self>,
        slot: usize,
        mut current: Arc<WorkerHandle>,
        mut exited: BoxFuture<'static, String>,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        loop {
            tokio::select! {
                reason = &mut exited => {
                    self.remove_worker(current.id);
                    tracing::warn!(slot, worker = current.id, reason = %reason, "Worker exited, starting replacement");
                }
                _ = current.closed.notified() => {
                    self.remove_worker(current.id);
                    tracing::warn!(slot, worker = current.id, "Worker pipes closed, starting replacement");
                    // Dropping the exit future kills a process that is still running.
                    drop(std::mem::replace(&mut exited, future::pending().boxed()));
                }
                _ = shutdown.recv() => {
                    self.remove_worker(current.id);
                    tracing::debug!(slot, worker = current.id, "Stopping worker");
                    return;
                }
            }

            let mut attempt = 0u32;
            (current, exited) = loop {
                if attempt > 0 {
                    let delay = calculate_backoff(attempt, RESPAWN_BACKOFF_BASE_MS, RESPAWN_BACKOFF_MAX_MS);
                    tokio::select! {
                        _ = time::sleep(delay) => {}
                        _ = shutdown.recv() => return,
                    }
                }

                match self.start_worker() {
                    Ok(started) => {
                        metrics::record_worker_restart();
                        break started;
                    }
                    Err(e) => {
                        attempt += 1;
                        tracing::error!(slot, attempt, error = %e, "Failed to start replacement worker");
                    }
                }
            };
        }
    }
}
