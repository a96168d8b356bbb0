//! Upstream protocol seam
//!
//! The relay does not speak RTSP itself. A protocol implementation plugs in
//! by implementing these two traits; the session manager drives them.

use std::future::Future;

use crate::error::UpstreamError;
use crate::media::CodecDescriptor;
use crate::registry::{MediaUnit, StreamKey};

/// Opens sessions against upstream sources
///
/// # Example
/// ```no_run
/// use rtsp_fanout::error::UpstreamError;
/// use rtsp_fanout::{CodecDescriptor, MediaUnit, StreamKey, UpstreamConnector, UpstreamSession};
///
/// struct Camera;
///
/// impl UpstreamSession for Camera {
///     async fn codec_descriptors(&mut self) -> Result<Vec<CodecDescriptor>, UpstreamError> {
///         Err(UpstreamError::Negotiate("no SDP".into()))
///     }
///     async fn read_unit(&mut self) -> Result<MediaUnit, UpstreamError> {
///         Err(UpstreamError::EndOfStream)
///     }
///     async fn close(&mut self) {}
/// }
///
/// struct Dialer;
///
/// impl UpstreamConnector for Dialer {
///     type Session = Camera;
///     async fn dial(&self, _key: &StreamKey) -> Result<Camera, UpstreamError> {
///         Ok(Camera)
///     }
/// }
/// ```
pub trait UpstreamConnector: Send + Sync + 'static {
    /// Session type produced by a successful dial
    type Session: UpstreamSession;

    /// Connect to the source named by `key`
    fn dial(
        &self,
        key: &StreamKey,
    ) -> impl Future<Output = Result<Self::Session, UpstreamError>> + Send;
}

/// An open upstream session
pub trait UpstreamSession: Send + 'static {
    /// Codec parameters, one per elementary stream
    fn codec_descriptors(
        &mut self,
    ) -> impl Future<Output = Result<Vec<CodecDescriptor>, UpstreamError>> + Send;

    /// Next access unit; errors end the session
    fn read_unit(&mut self) -> impl Future<Output = Result<MediaUnit, UpstreamError>> + Send;

    /// Release the session
    fn close(&mut self) -> impl Future<Output = ()> + Send;
}
