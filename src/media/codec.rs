//! Codec descriptors
//!
//! One descriptor per elementary stream, in the order the upstream session
//! reported them. Index 0 is the video stream.

use std::fmt;

use super::h264::AvcConfig;

/// Codec parameters for one elementary stream of an upstream source
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodecDescriptor {
    /// H.264 video with its parameter sets
    H264(AvcConfig),
    /// Stream the relay carries but does not repackage (audio, metadata)
    Unsupported {
        /// Codec name as reported upstream (e.g. "PCM_ALAW")
        name: String,
    },
}

impl CodecDescriptor {
    /// Codec name for logs and stats
    pub fn name(&self) -> &str {
        match self {
            CodecDescriptor::H264(_) => "H264",
            CodecDescriptor::Unsupported { name } => name,
        }
    }

    /// H.264 configuration, if this is a video descriptor
    pub fn as_h264(&self) -> Option<&AvcConfig> {
        match self {
            CodecDescriptor::H264(config) => Some(config),
            CodecDescriptor::Unsupported { .. } => None,
        }
    }

    /// First H.264 descriptor in a negotiated set
    pub fn find_h264(codecs: &[CodecDescriptor]) -> Option<&AvcConfig> {
        codecs.iter().find_map(CodecDescriptor::as_h264)
    }
}

impl fmt::Display for CodecDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodecDescriptor::H264(config) => write!(
                f,
                "H264 {} {}",
                config.profile_name(),
                config.level_string()
            ),
            CodecDescriptor::Unsupported { name } => write!(f, "{}", name),
        }
    }
}
