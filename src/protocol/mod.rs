//! Primary ↔ worker dispatch protocol.
//!
//! # Data Flow
//! ```text
//! primary                                   worker
//!   DispatchMessage {id, headers, url} ──stdin──▶ request handler
//!   pending[id] ◀──stdout── ReplyEnvelope {id, data | errorCode+error}
//! ```
//!
//! # Design Decisions
//! - Every dispatch carries a UUID and every reply echoes it, so a worker may
//!   have any number of requests in flight
//! - Messages are typed and validated at the pipe boundary
//! - Worker logs never touch stdout

pub mod codec;
pub mod messages;

pub use codec::{FrameReader, write_frame};
pub use messages::{DispatchMessage, ReplyEnvelope, ReplyMessage, RequestType};
