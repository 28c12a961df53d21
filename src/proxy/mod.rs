//! Data path inside a worker: rule resolution, upstream selection, and the
//! outbound request with its single retry.

pub mod client;
pub mod handler;
pub mod upstream;

pub use client::{HttpProxyClient, ProxyClient};
pub use handler::RequestHandler;
pub use upstream::UpstreamAddress;
