//! # rtsp-fanout
//!
//! Live stream registry that relays one upstream RTSP source to many
//! downstream viewers, repackaging H.264 access units on the way.
//!
//! ```text
//!   UpstreamConnector ──dial──► SessionManager (one task per stream)
//!                                    │ read_unit()
//!                                    ▼
//!                          StreamRegistry::broadcast()
//!                         ┌──────────┼──────────┐
//!                         ▼          ▼          ▼
//!                      [queue]    [queue]    [queue]     (bounded, lossy)
//!                         │          │          │
//!                   ViewerPipeline (one task per viewer)
//!                         │  keyframe gating, Annex-B, sample counts
//!                         ▼
//!                     SampleSink (negotiated downstream connection)
//! ```
//!
//! The upstream protocol and the downstream transport are supplied by the
//! caller through the [`upstream::UpstreamConnector`] and
//! [`delivery::SampleSink`] traits.

pub mod delivery;
pub mod error;
pub mod media;
pub mod registry;
pub mod upstream;

#[cfg(test)]
pub(crate) mod testing;

pub use delivery::{PipelineConfig, PipelineExit, SampleSink, ViewerControl, ViewerPipeline};
pub use error::{Error, Result};
pub use media::{AvcConfig, CodecDescriptor};
pub use registry::{MediaUnit, RegistryConfig, StreamKey, StreamRegistry, ViewerId};
pub use upstream::{UpstreamConnector, UpstreamSession};
