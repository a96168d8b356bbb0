//! Upstream session manager
//!
//! One task per registered stream. It owns the connection to the source and
//! keeps it alive for as long as the stream is registered:
//!
//! ```text
//!   Connecting ──dial ok──► Negotiating ──codecs──► Streaming
//!       ▲   │                   │                      │
//!       │   └─fail─┐   ┌──fail──┘                      │ read error
//!       │          ▼   ▼                               │
//!       └──────── backoff ◄────────────────────────────┘
//!
//!   any phase ──stop signal──► Stopped
//! ```
//!
//! Retries are unbounded with a fixed backoff. The stop signal is polled
//! before every dial, during every backoff and around every read.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::sync::oneshot::error::TryRecvError;

use crate::error::UpstreamError;
use crate::registry::entry::StreamCounters;
use crate::registry::{StreamKey, StreamRegistry};

use super::source::{UpstreamConnector, UpstreamSession};

/// Lifecycle phase of a session manager
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SessionPhase {
    /// Dialing the source
    Connecting,
    /// Connected, fetching codec parameters
    Negotiating,
    /// Reading and fanning out media units
    Streaming,
    /// Stop signal observed; terminal
    Stopped,
}

/// How a streaming run ended
enum StreamEnd {
    Stopped,
    Lost(UpstreamError),
}

/// Supervises the upstream connection of one stream entry
pub struct SessionManager<C: UpstreamConnector> {
    registry: Arc<StreamRegistry<C>>,
    key: StreamKey,
    generation: u64,
    stop_rx: oneshot::Receiver<()>,
    stop_seen: bool,
    counters: Arc<StreamCounters>,
    phase: SessionPhase,
}

impl<C: UpstreamConnector> SessionManager<C> {
    pub(crate) fn new(
        registry: Arc<StreamRegistry<C>>,
        key: StreamKey,
        generation: u64,
        stop_rx: oneshot::Receiver<()>,
        counters: Arc<StreamCounters>,
    ) -> Self {
        Self {
            registry,
            key,
            generation,
            stop_rx,
            stop_seen: false,
            counters,
            phase: SessionPhase::Connecting,
        }
    }

    /// Run until the registry signals stop
    pub async fn run(mut self) {
        let connector = Arc::clone(self.registry.connector());
        let backoff = self.registry.config().reconnect_backoff;
        let mut attempt: u32 = 0;

        loop {
            if self.stop_requested() {
                break;
            }

            attempt += 1;
            self.enter(SessionPhase::Connecting);
            StreamCounters::incr(&self.counters.connect_attempts);
            tracing::info!(stream = %self.key, attempt = attempt, "Connecting to upstream");

            let mut session = match connector.dial(&self.key).await {
                Ok(session) => session,
                Err(e) => {
                    tracing::warn!(stream = %self.key, attempt = attempt, error = %e, "Upstream dial failed");
                    if self.backoff(backoff).await {
                        break;
                    }
                    continue;
                }
            };

            self.enter(SessionPhase::Negotiating);
            let codecs = match session.codec_descriptors().await {
                Ok(codecs) => codecs,
                Err(e) => {
                    tracing::warn!(stream = %self.key, attempt = attempt, error = %e, "Codec negotiation failed");
                    session.close().await;
                    if self.backoff(backoff).await {
                        break;
                    }
                    continue;
                }
            };

            if self.stop_requested()
                || !self.registry.set_ready(&self.key, self.generation, codecs).await
            {
                session.close().await;
                break;
            }

            attempt = 0;
            self.enter(SessionPhase::Streaming);

            match self.stream(&mut session).await {
                StreamEnd::Stopped => {
                    session.close().await;
                    break;
                }
                StreamEnd::Lost(e) => {
                    tracing::warn!(stream = %self.key, error = %e, "Upstream lost, reconnecting");
                    session.close().await;

                    if self.stop_requested()
                        || !self.registry.clear_ready(&self.key, self.generation).await
                    {
                        break;
                    }
                    tracing::info!(
                        stream = %self.key,
                        backoff_secs = backoff.as_secs_f32(),
                        "Reconnect scheduled"
                    );
                    if self.backoff(backoff).await {
                        break;
                    }
                }
            }
        }

        self.enter(SessionPhase::Stopped);
        tracing::info!(stream = %self.key, generation = self.generation, "Upstream session stopped");
    }

    fn enter(&mut self, phase: SessionPhase) {
        if self.phase != phase {
            tracing::debug!(stream = %self.key, from = ?self.phase, to = ?phase, "Session phase change");
            self.phase = phase;
        }
    }

    async fn stream(&mut self, session: &mut C::Session) -> StreamEnd {
        loop {
            if self.stop_requested() {
                return StreamEnd::Stopped;
            }

            let read = tokio::select! {
                biased;
                _ = &mut self.stop_rx => None,
                unit = session.read_unit() => Some(unit),
            };

            match read {
                None => {
                    self.stop_seen = true;
                    return StreamEnd::Stopped;
                }
                Some(Ok(unit)) => {
                    self.registry
                        .fan_out(&self.key, Some(self.generation), unit)
                        .await;
                }
                Some(Err(e)) => return StreamEnd::Lost(e),
            }
        }
    }

    /// Sleep for the backoff interval; true if stop arrived meanwhile
    async fn backoff(&mut self, delay: Duration) -> bool {
        let stopped = tokio::select! {
            biased;
            _ = &mut self.stop_rx => true,
            _ = tokio::time::sleep(delay) => false,
        };
        if stopped {
            self.stop_seen = true;
        }
        stopped
    }

    /// Non-blocking stop check. A dropped sender counts as stop.
    fn stop_requested(&mut self) -> bool {
        if self.stop_seen {
            return true;
        }
        match self.stop_rx.try_recv() {
            Err(TryRecvError::Empty) => false,
            Ok(()) | Err(TryRecvError::Closed) => {
                self.stop_seen = true;
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::registry::RegistryConfig;
    use crate::testing::{eventually, key_unit, test_codecs, ScriptedConnector};

    #[tokio::test(start_paused = true)]
    async fn test_retries_until_dial_succeeds() {
        let connector = ScriptedConnector::new().fail_dials(2);
        let script = connector.script();
        let registry = Arc::new(StreamRegistry::new(connector));
        let key = StreamKey::new("rtsp://cam1/stream");

        registry.ensure(&key).await;
        let codecs = registry
            .wait_ready(&key, Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(codecs, test_codecs());

        let dials = script.dial_times();
        assert_eq!(dials.len(), 3);
        for pair in dials.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_secs(3));
        }
        assert_eq!(script.negotiations.load(Ordering::SeqCst), 1);

        let stats = registry.stream_stats(&key).await.unwrap();
        assert_eq!(stats.connect_attempts, 3);
        assert!(stats.ready);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnects_after_read_failure() {
        let connector = ScriptedConnector::new()
            .with_units(vec![key_unit(0), key_unit(40)])
            .fail_first_session_after_units();
        let script = connector.script();
        let registry = Arc::new(StreamRegistry::new(connector));
        let key = StreamKey::new("rtsp://cam1/stream");

        registry.ensure(&key).await;

        let (r, k) = (&registry, &key);
        let reconnected = eventually(move || async move {
            let stats = r.stream_stats(k).await.unwrap();
            stats.reconnects == 1 && stats.ready
        })
        .await;
        assert!(reconnected);

        assert_eq!(script.dial_times().len(), 2);
        assert_eq!(script.closes.load(Ordering::SeqCst), 1);
        assert_eq!(script.negotiations.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_remove_stops_session() {
        let connector = ScriptedConnector::new();
        let script = connector.script();
        let registry = Arc::new(StreamRegistry::new(connector));
        let key = StreamKey::new("rtsp://cam1/stream");

        registry.ensure(&key).await;
        registry.wait_ready(&key, Duration::from_secs(5)).await.unwrap();
        assert!(registry.remove(&key).await);

        let s = &script;
        let closed = eventually(move || async move { s.closes.load(Ordering::SeqCst) == 1 }).await;
        assert!(closed);
        assert_eq!(script.dial_times().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_during_backoff() {
        let connector = ScriptedConnector::new().fail_dials(usize::MAX);
        let script = connector.script();
        let registry = Arc::new(StreamRegistry::new(connector));
        let key = StreamKey::new("rtsp://cam1/stream");

        registry.ensure(&key).await;
        tokio::time::sleep(Duration::from_secs(1)).await;
        registry.remove(&key).await;

        // Well past several backoff intervals: no more dials
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(script.dial_times().len(), 1);
    }

    #[tokio::test]
    async fn test_read_loop_not_blocked_by_stalled_viewer() {
        let units: Vec<_> = (0..500).map(|i| key_unit(i * 40)).collect();
        let connector = ScriptedConnector::new().with_units(units).gated();
        let script = connector.script();
        let registry = Arc::new(StreamRegistry::new(connector));
        let key = StreamKey::new("rtsp://cam1/stream");

        // Attach a viewer that never drains before media starts flowing
        registry.ensure(&key).await;
        let (_id, _stalled_rx) = registry.attach_viewer(&key).await.unwrap();
        script.release_units();

        let (r, k) = (&registry, &key);
        let drained = eventually(move || async move {
            r.stream_stats(k).await.unwrap().units_received == 500
        })
        .await;
        assert!(drained);

        let stats = registry.stream_stats(&key).await.unwrap();
        assert_eq!(
            stats.units_dropped,
            500 - RegistryConfig::default().viewer_queue_capacity as u64
        );
        assert_eq!(script.reads.load(Ordering::SeqCst), 500);
    }
}
