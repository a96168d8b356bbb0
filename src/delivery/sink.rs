//! Downstream transport seam
//!
//! The pipeline is handed a connection whose negotiation already happened
//! elsewhere; all it needs is to write samples and to hang up.

use std::future::Future;

use bytes::Bytes;

use crate::error::DeliveryError;

/// Write side of a negotiated downstream connection
pub trait SampleSink: Send + 'static {
    /// Send one Annex-B access unit lasting `samples` clock ticks
    fn send_sample(
        &mut self,
        payload: Bytes,
        samples: u32,
    ) -> impl Future<Output = Result<(), DeliveryError>> + Send;

    /// Tear the connection down. Must tolerate being called on a connection
    /// the peer already closed.
    fn close(&mut self) -> impl Future<Output = ()> + Send;
}
