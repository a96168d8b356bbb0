//! Registry error types
//!
//! Error types for stream registry operations.

use super::frame::StreamKey;

/// Error type for registry operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// Stream not found (never ensured, or torn down concurrently)
    StreamNotFound(StreamKey),
    /// Codec parameters did not arrive within the caller's deadline
    ReadyTimeout(StreamKey),
}

impl std::fmt::Display for RegistryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistryError::StreamNotFound(key) => write!(f, "Stream not found: {}", key),
            RegistryError::ReadyTimeout(key) => {
                write!(f, "Timed out waiting for stream codecs: {}", key)
            }
        }
    }
}

impl std::error::Error for RegistryError {}
