//! Error types
//!
//! Each layer has its own error enum; [`Error`] wraps them for callers that
//! drive several layers at once.

use std::fmt;

use crate::registry::{RegistryError, StreamKey};

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type
#[derive(Debug, Clone)]
pub enum Error {
    /// Registry operation failed
    Registry(RegistryError),
    /// Upstream session failed
    Upstream(UpstreamError),
    /// Downstream delivery failed
    Delivery(DeliveryError),
    /// Media payload could not be handled
    Media(MediaError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Registry(e) => write!(f, "Registry error: {}", e),
            Error::Upstream(e) => write!(f, "Upstream error: {}", e),
            Error::Delivery(e) => write!(f, "Delivery error: {}", e),
            Error::Media(e) => write!(f, "Media error: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Registry(e) => Some(e),
            Error::Upstream(e) => Some(e),
            Error::Delivery(e) => Some(e),
            Error::Media(e) => Some(e),
        }
    }
}

impl From<RegistryError> for Error {
    fn from(e: RegistryError) -> Self {
        Error::Registry(e)
    }
}

impl From<UpstreamError> for Error {
    fn from(e: UpstreamError) -> Self {
        Error::Upstream(e)
    }
}

impl From<DeliveryError> for Error {
    fn from(e: DeliveryError) -> Self {
        Error::Delivery(e)
    }
}

impl From<MediaError> for Error {
    fn from(e: MediaError) -> Self {
        Error::Media(e)
    }
}

/// Errors reported by an upstream protocol implementation
///
/// These never reach registry callers; the session manager recovers from all
/// of them by reconnecting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpstreamError {
    /// Source unreachable or handshake failed
    Connect(String),
    /// Codec parameters could not be obtained
    Negotiate(String),
    /// I/O failure mid-stream
    Read(String),
    /// Source ended the stream
    EndOfStream,
}

impl fmt::Display for UpstreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpstreamError::Connect(msg) => write!(f, "Connect failed: {}", msg),
            UpstreamError::Negotiate(msg) => write!(f, "Codec negotiation failed: {}", msg),
            UpstreamError::Read(msg) => write!(f, "Read failed: {}", msg),
            UpstreamError::EndOfStream => write!(f, "End of stream"),
        }
    }
}

impl std::error::Error for UpstreamError {}

/// Errors on the downstream side of a viewer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    /// The downstream transport rejected a sample
    Sink(String),
    /// Stream has no usable H.264 parameters to prefix keyframes with
    NoVideoCodec(StreamKey),
}

impl fmt::Display for DeliveryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeliveryError::Sink(msg) => write!(f, "Sink write failed: {}", msg),
            DeliveryError::NoVideoCodec(key) => {
                write!(f, "No H.264 video codec for stream: {}", key)
            }
        }
    }
}

impl std::error::Error for DeliveryError {}

/// Media parsing errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaError {
    /// Malformed AVCDecoderConfigurationRecord
    InvalidAvcPacket,
    /// Unit shorter than its length prefix
    TruncatedUnit(usize),
}

impl fmt::Display for MediaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaError::InvalidAvcPacket => write!(f, "Invalid AVC packet"),
            MediaError::TruncatedUnit(len) => {
                write!(f, "Truncated unit: {} bytes, need at least 4", len)
            }
        }
    }
}

impl std::error::Error for MediaError {}
