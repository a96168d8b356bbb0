//! Downstream side: one delivery pipeline per viewer
//!
//! A pipeline drains its viewer's queue, holds everything back until the
//! first keyframe, converts AVCC units to Annex-B (keyframes get SPS/PPS
//! in front), turns presentation timestamps into sample counts and writes
//! the result to a [`SampleSink`]. It also watches a keep-alive timer and
//! hangs up on peers that went quiet without disconnecting.

pub mod config;
mod lease;
pub mod pipeline;
pub mod sink;
pub mod timing;

pub use config::PipelineConfig;
pub use pipeline::{PipelineExit, ViewerControl, ViewerPipeline, ViewerReport};
pub use sink::SampleSink;
pub use timing::{SampleClock, VIDEO_CLOCK_RATE};
