//! Stream keys and media units
//!
//! This module defines the key type identifying an upstream source and the
//! unit of media fanned out to viewers.

use std::time::Duration;

use bytes::Bytes;

/// Identifier for one upstream source (its connection URL)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StreamKey(String);

impl StreamKey {
    /// Create a new stream key
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    /// The source URL
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for StreamKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StreamKey {
    fn from(url: &str) -> Self {
        Self::new(url)
    }
}

impl From<String> for StreamKey {
    fn from(url: String) -> Self {
        Self(url)
    }
}

/// Index of the video elementary stream
pub const VIDEO_STREAM_INDEX: u8 = 0;

/// One access unit read from an upstream session
///
/// Cheap to clone: every viewer shares the payload allocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaUnit {
    /// Coded data, AVCC length-prefixed
    pub payload: Bytes,
    /// Presentation time, non-decreasing per stream
    pub timestamp: Duration,
    /// Whether decoding can start at this unit
    pub is_keyframe: bool,
    /// Elementary stream index (video = 0)
    pub stream_index: u8,
}

impl MediaUnit {
    /// Create a video unit
    pub fn video(payload: Bytes, timestamp: Duration, is_keyframe: bool) -> Self {
        Self {
            payload,
            timestamp,
            is_keyframe,
            stream_index: VIDEO_STREAM_INDEX,
        }
    }

    /// Whether this unit belongs to the video stream
    pub fn is_video(&self) -> bool {
        self.stream_index == VIDEO_STREAM_INDEX
    }
}
