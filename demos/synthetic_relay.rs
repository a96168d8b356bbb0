//! Relay a synthetic camera to a few simulated viewers
//!
//! Run with: cargo run --example synthetic_relay
//!
//! The camera produces 25 fps H.264-shaped units with a keyframe every
//! second and drops its connection every 200 units, so the reconnect path
//! shows up in the logs. Three viewers attach:
//!
//! - `steady` sends keep-alives every 2s and stays until the end
//! - `silent` never sends a keep-alive and is dropped after 5s
//! - `leaver` disconnects after 8s
//!
//! Set `RUST_LOG=rtsp_fanout=debug` for per-phase logging.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::{BufMut, Bytes, BytesMut};
use rtsp_fanout::error::{DeliveryError, UpstreamError};
use rtsp_fanout::{
    AvcConfig, CodecDescriptor, MediaUnit, PipelineConfig, SampleSink, StreamKey,
    StreamRegistry, UpstreamConnector, UpstreamSession, ViewerPipeline,
};

const FRAME_INTERVAL: Duration = Duration::from_millis(40);
const UNITS_PER_CONNECTION: u64 = 200;

struct SyntheticCamera;

struct SyntheticSession {
    ticker: tokio::time::Interval,
    produced: u64,
}

impl UpstreamConnector for SyntheticCamera {
    type Session = SyntheticSession;

    async fn dial(&self, key: &StreamKey) -> Result<SyntheticSession, UpstreamError> {
        if !key.as_str().starts_with("rtsp://") {
            return Err(UpstreamError::Connect(format!("unsupported url {}", key)));
        }
        Ok(SyntheticSession {
            ticker: tokio::time::interval(FRAME_INTERVAL),
            produced: 0,
        })
    }
}

impl UpstreamSession for SyntheticSession {
    async fn codec_descriptors(&mut self) -> Result<Vec<CodecDescriptor>, UpstreamError> {
        let avc = AvcConfig::from_parameter_sets(
            Bytes::from_static(&[0x67, 0x42, 0xC0, 0x1F, 0xDA, 0x01, 0x40]),
            Bytes::from_static(&[0x68, 0xCE, 0x3C, 0x80]),
        )
        .map_err(|e| UpstreamError::Negotiate(e.to_string()))?;

        Ok(vec![
            CodecDescriptor::H264(avc),
            CodecDescriptor::Unsupported {
                name: "PCM_ALAW".into(),
            },
        ])
    }

    async fn read_unit(&mut self) -> Result<MediaUnit, UpstreamError> {
        if self.produced == UNITS_PER_CONNECTION {
            return Err(UpstreamError::EndOfStream);
        }
        self.ticker.tick().await;

        let keyframe = self.produced % 25 == 0;
        let slice: &[u8] = if keyframe {
            &[0x65, 0x88, 0x84, 0x00, 0x33]
        } else {
            &[0x41, 0x9A, 0x02, 0x10]
        };
        let mut payload = BytesMut::with_capacity(4 + slice.len());
        payload.put_u32(slice.len() as u32);
        payload.put_slice(slice);

        let timestamp = FRAME_INTERVAL * self.produced as u32;
        self.produced += 1;
        Ok(MediaUnit::video(payload.freeze(), timestamp, keyframe))
    }

    async fn close(&mut self) {}
}

/// Sink that only counts what it would have sent
struct CountingSink {
    name: &'static str,
    bytes: Arc<AtomicU64>,
}

impl SampleSink for CountingSink {
    async fn send_sample(&mut self, payload: Bytes, samples: u32) -> Result<(), DeliveryError> {
        self.bytes.fetch_add(payload.len() as u64, Ordering::Relaxed);
        tracing::trace!(viewer = self.name, len = payload.len(), samples = samples, "sample");
        Ok(())
    }

    async fn close(&mut self) {
        println!("[{}] connection closed", self.name);
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("rtsp_fanout=info".parse()?)
                .add_directive("synthetic_relay=info".parse()?),
        )
        .init();

    let registry = Arc::new(StreamRegistry::new(SyntheticCamera));
    let key = StreamKey::new("rtsp://127.0.0.1:554/synthetic");

    let codecs = registry.ensure_ready(&key).await?;
    for codec in &codecs {
        println!("Negotiated: {}", codec);
    }

    let mut handles = Vec::new();
    for name in ["steady", "silent", "leaver"] {
        let bytes = Arc::new(AtomicU64::new(0));
        let sink = CountingSink {
            name,
            bytes: Arc::clone(&bytes),
        };
        let (pipeline, control) = ViewerPipeline::attach(
            Arc::clone(&registry),
            key.clone(),
            sink,
            PipelineConfig::default(),
        )
        .await?;
        println!("[{}] attached as {}", name, pipeline.viewer_id());

        match name {
            "steady" => {
                let control = control.clone();
                tokio::spawn(async move {
                    let mut ticker = tokio::time::interval(Duration::from_secs(2));
                    loop {
                        ticker.tick().await;
                        if !control.keepalive() {
                            break;
                        }
                    }
                });
            }
            "leaver" => {
                let control = control.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(Duration::from_secs(8)).await;
                    control.disconnect();
                });
            }
            _ => {}
        }

        handles.push(tokio::spawn(async move {
            let report = pipeline.run().await;
            println!(
                "[{}] finished: {:?}, forwarded={} skipped={} bytes={}",
                name,
                report.exit,
                report.forwarded,
                report.skipped,
                bytes.load(Ordering::Relaxed)
            );
        }));
    }

    tokio::select! {
        _ = tokio::time::sleep(Duration::from_secs(15)) => {}
        _ = tokio::signal::ctrl_c() => println!("\nShutting down..."),
    }

    if let Some(stats) = registry.stream_stats(&key).await {
        println!("Stream stats: {:?}", stats);
    }
    registry.remove(&key).await;

    for handle in handles {
        handle.await?;
    }

    Ok(())
}
