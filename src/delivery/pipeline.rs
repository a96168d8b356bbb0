//! Per-viewer delivery pipeline

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::error::{DeliveryError, Result};
use crate::media::h264;
use crate::media::CodecDescriptor;
use crate::registry::{MediaUnit, StreamKey, StreamRegistry, ViewerId};
use crate::upstream::UpstreamConnector;

use super::config::PipelineConfig;
use super::lease::ViewerLease;
use super::sink::SampleSink;
use super::timing::SampleClock;

/// Signals from the downstream transport's control channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ViewerSignal {
    Keepalive,
    Disconnect,
}

/// Handle the transport layer uses to poke a running pipeline
///
/// Cheap to clone; hand one to each transport callback.
#[derive(Debug, Clone)]
pub struct ViewerControl {
    tx: mpsc::UnboundedSender<ViewerSignal>,
}

impl ViewerControl {
    /// Reset the keep-alive timer. Returns false once the pipeline is gone.
    pub fn keepalive(&self) -> bool {
        self.tx.send(ViewerSignal::Keepalive).is_ok()
    }

    /// Report that the downstream connection closed
    pub fn disconnect(&self) -> bool {
        self.tx.send(ViewerSignal::Disconnect).is_ok()
    }
}

/// Why a pipeline stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineExit {
    /// Transport reported the peer gone
    Disconnected,
    /// No keep-alive within the window; the pipeline hung up
    KeepaliveExpired,
    /// Stream was torn down under the viewer
    QueueClosed,
    /// Writing to the transport failed
    SinkFailed(DeliveryError),
}

/// Summary returned when a pipeline finishes
#[derive(Debug, Clone)]
pub struct ViewerReport {
    pub viewer_id: ViewerId,
    pub exit: PipelineExit,
    /// Samples written downstream
    pub forwarded: u64,
    /// Units discarded before the first keyframe or as malformed
    pub skipped: u64,
}

/// Drains one viewer's queue into its downstream connection
pub struct ViewerPipeline<C: UpstreamConnector, S: SampleSink> {
    lease: ViewerLease<C>,
    key: StreamKey,
    viewer_id: ViewerId,
    queue: mpsc::Receiver<MediaUnit>,
    control_rx: mpsc::UnboundedReceiver<ViewerSignal>,
    sink: S,
    sps: Bytes,
    pps: Bytes,
    clock: SampleClock,
    keepalive_timeout: Duration,
    started: bool,
    forwarded: u64,
    skipped: u64,
}

impl<C: UpstreamConnector, S: SampleSink> ViewerPipeline<C, S> {
    /// Attach a new viewer to a ready stream
    ///
    /// Fails with `NoVideoCodec` if the stream has no H.264 parameter sets
    /// (including when it is not ready yet), and with `StreamNotFound` if it
    /// is not registered.
    ///
    /// The SPS/PPS taken here are refreshed from the registry on every
    /// keyframe, so a reconnect with new parameter sets is picked up at the
    /// next keyframe. Dropping the pipeline without running it detaches the
    /// viewer.
    pub async fn attach(
        registry: Arc<StreamRegistry<C>>,
        key: StreamKey,
        sink: S,
        config: PipelineConfig,
    ) -> Result<(Self, ViewerControl)> {
        let codecs = registry.codecs_of(&key).await?;
        let (sps, pps) = CodecDescriptor::find_h264(&codecs)
            .and_then(|avc| Some((avc.first_sps()?.clone(), avc.first_pps()?.clone())))
            .ok_or_else(|| DeliveryError::NoVideoCodec(key.clone()))?;

        let (viewer_id, queue) = registry.attach_viewer(&key).await?;
        let (tx, control_rx) = mpsc::unbounded_channel();

        let pipeline = Self {
            lease: ViewerLease::new(registry, key.clone(), viewer_id),
            key,
            viewer_id,
            queue,
            control_rx,
            sink,
            sps,
            pps,
            clock: SampleClock::new(config.video_clock_rate),
            keepalive_timeout: config.keepalive_timeout,
            started: false,
            forwarded: 0,
            skipped: 0,
        };

        Ok((pipeline, ViewerControl { tx }))
    }

    pub fn viewer_id(&self) -> ViewerId {
        self.viewer_id
    }

    /// Deliver until the viewer goes away, then detach it
    pub async fn run(mut self) -> ViewerReport {
        tracing::info!(stream = %self.key, viewer = %self.viewer_id, "Viewer pipeline started");

        let exit = self.deliver().await;

        // On disconnect the transport has already hung up
        if exit != PipelineExit::Disconnected {
            self.sink.close().await;
        }

        match self.lease.release().await {
            Ok(torn_down) => tracing::info!(
                stream = %self.key,
                viewer = %self.viewer_id,
                exit = ?exit,
                forwarded = self.forwarded,
                stream_closed = torn_down,
                "Viewer pipeline stopped"
            ),
            Err(e) => tracing::debug!(
                viewer = %self.viewer_id,
                exit = ?exit,
                error = %e,
                "Viewer pipeline stopped after stream teardown"
            ),
        }

        ViewerReport {
            viewer_id: self.viewer_id,
            exit,
            forwarded: self.forwarded,
            skipped: self.skipped,
        }
    }

    async fn deliver(&mut self) -> PipelineExit {
        let keepalive = tokio::time::sleep(self.keepalive_timeout);
        tokio::pin!(keepalive);
        let mut control_open = true;

        loop {
            tokio::select! {
                biased;

                signal = self.control_rx.recv(), if control_open => match signal {
                    Some(ViewerSignal::Keepalive) => {
                        keepalive.as_mut().reset(Instant::now() + self.keepalive_timeout);
                    }
                    Some(ViewerSignal::Disconnect) => return PipelineExit::Disconnected,
                    // No transport callbacks left; only the timer can end us now
                    None => control_open = false,
                },

                _ = &mut keepalive => {
                    tracing::info!(
                        stream = %self.key,
                        viewer = %self.viewer_id,
                        timeout_secs = self.keepalive_timeout.as_secs(),
                        "Keep-alive expired, closing viewer"
                    );
                    return PipelineExit::KeepaliveExpired;
                }

                unit = self.queue.recv() => match unit {
                    Some(unit) => {
                        if let Err(e) = self.forward(unit).await {
                            tracing::debug!(viewer = %self.viewer_id, error = %e, "Sample write failed");
                            return PipelineExit::SinkFailed(e);
                        }
                    }
                    None => return PipelineExit::QueueClosed,
                },
            }
        }
    }

    async fn forward(&mut self, unit: MediaUnit) -> std::result::Result<(), DeliveryError> {
        // Audio is carried upstream but not relayed
        if !unit.is_video() {
            return Ok(());
        }

        if !self.started {
            if !unit.is_keyframe {
                self.skipped += 1;
                return Ok(());
            }
            self.started = true;
            tracing::debug!(viewer = %self.viewer_id, "First keyframe, delivery started");
        }

        if unit.is_keyframe {
            self.refresh_parameter_sets().await;
        }

        let payload = if unit.is_keyframe {
            h264::keyframe_annexb(&self.sps, &self.pps, &unit.payload)
        } else {
            h264::strip_length_prefix(&unit.payload)
        };
        let payload = match payload {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(stream = %self.key, viewer = %self.viewer_id, error = %e, "Dropping malformed unit");
                self.skipped += 1;
                return Ok(());
            }
        };

        let samples = self.clock.advance(unit.timestamp);
        self.sink.send_sample(payload, samples).await?;
        self.forwarded += 1;
        Ok(())
    }

    /// Pick up parameter sets from a reconnected upstream
    ///
    /// Keeps the current ones while the stream is not ready or gone.
    async fn refresh_parameter_sets(&mut self) {
        let Ok(codecs) = self.lease.registry().codecs_of(&self.key).await else {
            return;
        };
        let Some(avc) = CodecDescriptor::find_h264(&codecs) else {
            return;
        };

        if let (Some(sps), Some(pps)) = (avc.first_sps(), avc.first_pps()) {
            if *sps != self.sps || *pps != self.pps {
                tracing::debug!(stream = %self.key, viewer = %self.viewer_id, "Parameter sets changed");
                self.sps = sps.clone();
                self.pps = pps.clone();
            }
        }
    }
}
