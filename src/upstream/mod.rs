//! Upstream side: protocol seam and per-stream session supervision

pub mod manager;
pub mod source;

pub use manager::SessionManager;
pub use source::{UpstreamConnector, UpstreamSession};
