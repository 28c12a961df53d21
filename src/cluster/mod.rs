//! Multi-process runtime.
//!
//! # Data Flow
//! ```text
//! primary                                       worker process (× N)
//!   front request → WorkerManager::random_worker
//!     → WorkerHandle::dispatch ──stdin frame──▶ worker::serve
//!                                                 → RequestHandler
//!     pending[id] ◀───────────stdout frame──── ReplyEnvelope
//!
//! worker exit → supervisor → replacement in the same slot
//! ```
//!
//! # Design Decisions
//! - Workers are real OS processes (this binary re-executed)
//! - Launching goes through `WorkerLauncher`, so the pool can also drive
//!   in-process workers over in-memory pipes
//! - Role is fixed at spawn time by an environment flag

pub mod launcher;
pub mod manager;
pub mod worker;
pub mod workers;

pub use launcher::{LaunchedWorker, ProcessLauncher, WorkerLauncher};
pub use manager::{run_worker, ClusterManager, Role};
pub use workers::{WorkerHandle, WorkerManager};
