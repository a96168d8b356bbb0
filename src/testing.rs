//! Test doubles for the upstream and downstream seams

use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::{BufMut, Bytes, BytesMut};
use tokio::sync::watch;

use crate::delivery::SampleSink;
use crate::error::{DeliveryError, UpstreamError};
use crate::media::{AvcConfig, CodecDescriptor};
use crate::registry::{MediaUnit, StreamKey};
use crate::upstream::{UpstreamConnector, UpstreamSession};

pub(crate) const SPS: &[u8] = &[0x67, 0x42, 0x00, 0x1E];
pub(crate) const PPS: &[u8] = &[0x68, 0xCE, 0x3C, 0x80];

pub(crate) fn test_codecs() -> Vec<CodecDescriptor> {
    vec![CodecDescriptor::H264(
        AvcConfig::from_parameter_sets(Bytes::from_static(SPS), Bytes::from_static(PPS))
            .expect("valid parameter sets"),
    )]
}

/// Length-prefix raw slice data the way upstream sessions deliver it
pub(crate) fn avcc(slice: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(4 + slice.len());
    buf.put_u32(slice.len() as u32);
    buf.put_slice(slice);
    buf.freeze()
}

pub(crate) fn key_unit(ms: u64) -> MediaUnit {
    MediaUnit::video(avcc(&[0x65, 0x88]), Duration::from_millis(ms), true)
}

pub(crate) fn delta_unit(ms: u64) -> MediaUnit {
    MediaUnit::video(avcc(&[0x41, 0x9A]), Duration::from_millis(ms), false)
}

/// Poll `check` every 10ms for up to 5s
pub(crate) async fn eventually<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..500 {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

/// Connector whose dial never completes
pub(crate) struct IdleConnector;

pub(crate) struct NeverSession;

impl UpstreamSession for NeverSession {
    async fn codec_descriptors(&mut self) -> Result<Vec<CodecDescriptor>, UpstreamError> {
        std::future::pending().await
    }

    async fn read_unit(&mut self) -> Result<MediaUnit, UpstreamError> {
        std::future::pending().await
    }

    async fn close(&mut self) {}
}

impl UpstreamConnector for IdleConnector {
    type Session = NeverSession;

    async fn dial(&self, _key: &StreamKey) -> Result<NeverSession, UpstreamError> {
        std::future::pending().await
    }
}

/// Shared state behind a [`ScriptedConnector`]
pub(crate) struct Script {
    dial_failures: AtomicUsize,
    dial_times: Mutex<Vec<tokio::time::Instant>>,
    units: Mutex<VecDeque<MediaUnit>>,
    fail_after_units: bool,
    gate: watch::Sender<bool>,
    pub(crate) negotiations: AtomicUsize,
    pub(crate) reads: AtomicUsize,
    pub(crate) closes: AtomicUsize,
}

impl Script {
    pub(crate) fn dial_times(&self) -> Vec<tokio::time::Instant> {
        self.dial_times.lock().unwrap().clone()
    }

    /// Let sessions start returning queued units
    pub(crate) fn release_units(&self) {
        self.gate.send_replace(true);
    }
}

/// Connector driven by a script: failing dials, queued units, read failure
pub(crate) struct ScriptedConnector {
    script: Arc<Script>,
}

impl ScriptedConnector {
    pub(crate) fn new() -> Self {
        let (gate, _) = watch::channel(true);
        Self {
            script: Arc::new(Script {
                dial_failures: AtomicUsize::new(0),
                dial_times: Mutex::new(Vec::new()),
                units: Mutex::new(VecDeque::new()),
                fail_after_units: false,
                gate,
                negotiations: AtomicUsize::new(0),
                reads: AtomicUsize::new(0),
                closes: AtomicUsize::new(0),
            }),
        }
    }

    fn script_mut(&mut self) -> &mut Script {
        Arc::get_mut(&mut self.script).expect("configure before sharing")
    }

    /// Fail the first `n` dials
    pub(crate) fn fail_dials(mut self, n: usize) -> Self {
        self.script_mut().dial_failures = AtomicUsize::new(n);
        self
    }

    /// Units handed out across sessions, in order
    pub(crate) fn with_units(mut self, units: Vec<MediaUnit>) -> Self {
        self.script_mut().units = Mutex::new(units.into());
        self
    }

    /// After the queued units run out, the next read fails once
    pub(crate) fn fail_first_session_after_units(mut self) -> Self {
        self.script_mut().fail_after_units = true;
        self
    }

    /// Hold units back until [`Script::release_units`]
    pub(crate) fn gated(self) -> Self {
        self.script.gate.send_replace(false);
        self
    }

    pub(crate) fn script(&self) -> Arc<Script> {
        Arc::clone(&self.script)
    }
}

pub(crate) struct ScriptedSession {
    script: Arc<Script>,
    first: bool,
}

impl UpstreamSession for ScriptedSession {
    async fn codec_descriptors(&mut self) -> Result<Vec<CodecDescriptor>, UpstreamError> {
        self.script.negotiations.fetch_add(1, Ordering::SeqCst);
        Ok(test_codecs())
    }

    async fn read_unit(&mut self) -> Result<MediaUnit, UpstreamError> {
        let mut gate = self.script.gate.subscribe();
        let _ = gate.wait_for(|open| *open).await;

        let next = self.script.units.lock().unwrap().pop_front();
        match next {
            Some(unit) => {
                self.script.reads.fetch_add(1, Ordering::SeqCst);
                Ok(unit)
            }
            None if self.first && self.script.fail_after_units => {
                Err(UpstreamError::Read("connection reset".into()))
            }
            None => std::future::pending().await,
        }
    }

    async fn close(&mut self) {
        self.script.closes.fetch_add(1, Ordering::SeqCst);
    }
}

impl UpstreamConnector for ScriptedConnector {
    type Session = ScriptedSession;

    async fn dial(&self, _key: &StreamKey) -> Result<ScriptedSession, UpstreamError> {
        let first = {
            let mut times = self.script.dial_times.lock().unwrap();
            times.push(tokio::time::Instant::now());
            times.len() == 1
        };

        let failed = self
            .script
            .dial_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            return Err(UpstreamError::Connect("connection refused".into()));
        }

        Ok(ScriptedSession {
            script: Arc::clone(&self.script),
            first,
        })
    }
}

/// Everything a [`RecordingSink`] saw
#[derive(Default)]
pub(crate) struct SinkLog {
    pub(crate) samples: Mutex<Vec<(Bytes, u32)>>,
    pub(crate) closes: AtomicUsize,
}

impl SinkLog {
    pub(crate) fn samples(&self) -> Vec<(Bytes, u32)> {
        self.samples.lock().unwrap().clone()
    }
}

/// Sink that records samples; optionally fails after `fail_after` writes
pub(crate) struct RecordingSink {
    log: Arc<SinkLog>,
    fail_after: Option<usize>,
}

impl RecordingSink {
    pub(crate) fn new() -> (Self, Arc<SinkLog>) {
        let log = Arc::new(SinkLog::default());
        let sink = Self {
            log: Arc::clone(&log),
            fail_after: None,
        };
        (sink, log)
    }

    pub(crate) fn failing_after(writes: usize) -> (Self, Arc<SinkLog>) {
        let (mut sink, log) = Self::new();
        sink.fail_after = Some(writes);
        (sink, log)
    }
}

impl SampleSink for RecordingSink {
    async fn send_sample(&mut self, payload: Bytes, samples: u32) -> Result<(), DeliveryError> {
        let mut log = self.log.samples.lock().unwrap();
        if self.fail_after.is_some_and(|n| log.len() >= n) {
            return Err(DeliveryError::Sink("peer gone".into()));
        }
        log.push((payload, samples));
        Ok(())
    }

    async fn close(&mut self) {
        self.log.closes.fetch_add(1, Ordering::SeqCst);
    }
}
