//! Starting worker processes.
//!
//! # Responsibilities
//! - Re-execute the current binary in the worker role
//! - Hand the serialized config over through the environment
//! - Expose the worker's stdin/stdout as the dispatch channel
//!
//! Logs from workers go to the inherited stderr.

use std::path::PathBuf;
use std::process::Stdio;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::process::Command;

use crate::cluster::manager::{ROLE_ENV, WORKER_ID_ENV, WORKER_ROLE};
use crate::config::loader::{encode_for_worker, CONFIG_ENV};
use crate::config::GatewayConfig;
use crate::error::GatewayError;

/// A started worker, as seen from the primary.
pub struct LaunchedWorker {
    pub pid: Option<u32>,
    /// Dispatches go here (worker stdin).
    pub writer: Box<dyn AsyncWrite + Send + Unpin>,
    /// Replies come from here (worker stdout).
    pub reader: Box<dyn AsyncRead + Send + Unpin>,
    /// Resolves with a description once the worker has exited. Dropping it
    /// stops the worker.
    pub exited: BoxFuture<'static, String>,
}

/// Starts one worker for a pool slot.
pub trait WorkerLauncher: Send + Sync + 'static {
    fn launch(&self, worker_id: u64) -> Result<LaunchedWorker, GatewayError>;
}

/// Launches workers as child processes of the current executable.
#[derive(Debug, Clone)]
pub struct ProcessLauncher {
    program: PathBuf,
    config_json: String,
}

impl ProcessLauncher {
    pub fn new(program: PathBuf, config: &GatewayConfig) -> Result<Self, GatewayError> {
        Ok(Self {
            program,
            config_json: encode_for_worker(config)?,
        })
    }

    /// Re-execute this binary.
    pub fn current_exe(config: &GatewayConfig) -> Result<Self, GatewayError> {
        let program = std::env::current_exe().map_err(GatewayError::WorkerLaunch)?;
        Self::new(program, config)
    }
}

impl WorkerLauncher for ProcessLauncher {
    fn launch(&self, worker_id: u64) -> Result<LaunchedWorker, GatewayError> {
        let mut child = Command::new(&self.program)
            .env(ROLE_ENV, WORKER_ROLE)
            .env(WORKER_ID_ENV, worker_id.to_string())
            .env(CONFIG_ENV, &self.config_json)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(GatewayError::WorkerLaunch)?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| GatewayError::WorkerLaunch(std::io::Error::other("worker stdin not captured")))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| GatewayError::WorkerLaunch(std::io::Error::other("worker stdout not captured")))?;

        let pid = child.id();
        let exited = async move {
            match child.wait().await {
                Ok(status) => status.to_string(),
                Err(e) => format!("wait failed: {}", e),
            }
        }
        .boxed();

        Ok(LaunchedWorker {
            pid,
            writer: Box::new(stdin),
            reader: Box::new(stdout),
            exited,
        })
    }
}
