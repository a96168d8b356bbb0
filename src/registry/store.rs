//! Stream registry implementation
//!
//! The central registry that tracks every live upstream source, its codec
//! parameters and its attached viewers, and fans media out to them.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, RwLock};

use crate::media::CodecDescriptor;
use crate::upstream::{SessionManager, UpstreamConnector};

use super::config::RegistryConfig;
use super::entry::{StreamCounters, StreamEntry, StreamStats, ViewerHandle};
use super::error::RegistryError;
use super::frame::{MediaUnit, StreamKey};
use super::id::ViewerId;

/// Central registry for all active streams
///
/// The whole map sits behind one `RwLock`. Every mutation takes the write
/// guard, so "last viewer leaves, stream is torn down" is a single critical
/// section and no attach can slip in between. Fan-out only takes the read
/// guard long enough to snapshot the viewer queues.
pub struct StreamRegistry<C: UpstreamConnector> {
    /// Map of stream key to stream entry
    streams: RwLock<HashMap<StreamKey, StreamEntry>>,

    /// Opens upstream sessions for the session managers
    connector: Arc<C>,

    /// Configuration
    config: RegistryConfig,

    next_generation: AtomicU64,
}

impl<C: UpstreamConnector> StreamRegistry<C> {
    /// Create a new stream registry with default configuration
    pub fn new(connector: C) -> Self {
        Self::with_config(connector, RegistryConfig::default())
    }

    /// Create a new stream registry with custom configuration
    pub fn with_config(connector: C, config: RegistryConfig) -> Self {
        Self {
            streams: RwLock::new(HashMap::new()),
            connector: Arc::new(connector),
            config,
            next_generation: AtomicU64::new(1),
        }
    }

    /// Get the registry configuration
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    pub(crate) fn connector(&self) -> &Arc<C> {
        &self.connector
    }

    /// Check if a stream exists
    pub async fn exists(&self, key: &StreamKey) -> bool {
        self.streams.read().await.contains_key(key)
    }

    /// Make sure a stream exists, starting its upstream session if needed
    ///
    /// Idempotent: a second call for a live key does nothing.
    pub async fn ensure(self: &Arc<Self>, key: &StreamKey) {
        let mut streams = self.streams.write().await;

        if streams.contains_key(key) {
            return;
        }

        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let (entry, stop_rx) = StreamEntry::new(generation);
        let counters = Arc::clone(&entry.counters);
        streams.insert(key.clone(), entry);

        let manager = SessionManager::new(
            Arc::clone(self),
            key.clone(),
            generation,
            stop_rx,
            counters,
        );
        tokio::spawn(manager.run());

        tracing::info!(stream = %key, generation = generation, "Stream created");
    }

    /// Stop a stream's upstream session and forget the stream
    ///
    /// Attached viewers see their queue close. Returns false if the key was
    /// not registered.
    pub async fn remove(&self, key: &StreamKey) -> bool {
        let mut streams = self.streams.write().await;
        Self::remove_locked(&mut streams, key)
    }

    /// Remove a stream only if nobody is watching it
    pub async fn remove_if_idle(&self, key: &StreamKey) -> bool {
        let mut streams = self.streams.write().await;

        match streams.get(key) {
            Some(entry) if entry.viewers.is_empty() => Self::remove_locked(&mut streams, key),
            _ => false,
        }
    }

    fn remove_locked(streams: &mut HashMap<StreamKey, StreamEntry>, key: &StreamKey) -> bool {
        match streams.remove(key) {
            Some(mut entry) => {
                entry.signal_stop();
                tracing::info!(
                    stream = %key,
                    generation = entry.generation,
                    viewers = entry.viewers.len(),
                    "Stream removed"
                );
                true
            }
            None => false,
        }
    }

    /// Publish codec parameters for the session task's current connection
    ///
    /// Returns false if the entry is gone or now belongs to another session
    /// task; the caller should stop.
    pub async fn set_ready(
        &self,
        key: &StreamKey,
        generation: u64,
        codecs: Vec<CodecDescriptor>,
    ) -> bool {
        let mut streams = self.streams.write().await;

        match streams.get_mut(key) {
            Some(entry) if entry.generation == generation => {
                tracing::info!(
                    stream = %key,
                    codecs = ?codecs.iter().map(|c| c.to_string()).collect::<Vec<_>>(),
                    "Stream ready"
                );
                entry.set_ready(codecs);
                true
            }
            _ => false,
        }
    }

    /// Mark the session task's connection as lost
    ///
    /// Codecs belong to one connection; readers must not see them after it
    /// dropped. Returns false if the entry is gone or was replaced.
    pub async fn clear_ready(&self, key: &StreamKey, generation: u64) -> bool {
        let mut streams = self.streams.write().await;

        match streams.get_mut(key) {
            Some(entry) if entry.generation == generation => {
                if entry.is_ready() {
                    StreamCounters::incr(&entry.counters.reconnects);
                }
                entry.clear_ready();
                true
            }
            _ => false,
        }
    }

    /// Whether codec parameters are known for the stream's current connection
    pub async fn is_ready(&self, key: &StreamKey) -> bool {
        let streams = self.streams.read().await;
        streams.get(key).map(StreamEntry::is_ready).unwrap_or(false)
    }

    /// Codec parameters of the stream's current connection
    ///
    /// Empty while the stream is not ready.
    pub async fn codecs_of(&self, key: &StreamKey) -> Result<Vec<CodecDescriptor>, RegistryError> {
        let streams = self.streams.read().await;

        streams
            .get(key)
            .map(|entry| entry.codecs.clone())
            .ok_or_else(|| RegistryError::StreamNotFound(key.clone()))
    }

    /// Wait until the stream is ready and return its codecs
    ///
    /// Fails with `StreamNotFound` if the stream is missing or removed while
    /// waiting, and with `ReadyTimeout` once `timeout` elapses. A stream that
    /// is removed and re-created under the same key keeps the wait going on
    /// the new entry.
    pub async fn wait_ready(
        &self,
        key: &StreamKey,
        timeout: Duration,
    ) -> Result<Vec<CodecDescriptor>, RegistryError> {
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            let mut ready_rx = {
                let streams = self.streams.read().await;
                let entry = streams
                    .get(key)
                    .ok_or_else(|| RegistryError::StreamNotFound(key.clone()))?;

                if entry.is_ready() {
                    return Ok(entry.codecs.clone());
                }
                entry.ready_tx.subscribe()
            };

            // Either way, re-read under the lock: the connection may have
            // dropped again, or the entry was removed and possibly re-created
            let woke = tokio::time::timeout_at(deadline, ready_rx.wait_for(|ready| *ready)).await;
            if woke.is_err() {
                return Err(RegistryError::ReadyTimeout(key.clone()));
            }
        }
    }

    /// Ensure a stream and wait for its codecs using the configured timeout
    ///
    /// On timeout the stream is removed unless viewers are already attached.
    pub async fn ensure_ready(
        self: &Arc<Self>,
        key: &StreamKey,
    ) -> Result<Vec<CodecDescriptor>, RegistryError> {
        self.ensure(key).await;

        let result = self.wait_ready(key, self.config.ready_timeout).await;
        if let Err(RegistryError::ReadyTimeout(_)) = result {
            tracing::warn!(
                stream = %key,
                timeout_secs = self.config.ready_timeout.as_secs(),
                "Upstream not ready in time"
            );
            self.remove_if_idle(key).await;
        }
        result
    }

    /// Attach a new viewer to a stream
    ///
    /// Returns the viewer's id and the receiving half of its queue.
    pub async fn attach_viewer(
        &self,
        key: &StreamKey,
    ) -> Result<(ViewerId, mpsc::Receiver<MediaUnit>), RegistryError> {
        let mut streams = self.streams.write().await;

        let entry = streams
            .get_mut(key)
            .ok_or_else(|| RegistryError::StreamNotFound(key.clone()))?;

        let id = ViewerId::generate();
        let (tx, rx) = mpsc::channel(self.config.viewer_queue_capacity);
        entry.viewers.insert(
            id,
            ViewerHandle {
                tx,
                attached_at: std::time::Instant::now(),
            },
        );

        tracing::info!(
            stream = %key,
            viewer = %id,
            viewers = entry.viewers.len(),
            "Viewer attached"
        );

        Ok((id, rx))
    }

    /// Detach a viewer; the last one out tears the stream down
    ///
    /// Returns true if the stream was removed as a result.
    pub async fn detach_viewer(&self, key: &StreamKey, id: ViewerId) -> Result<bool, RegistryError> {
        let mut streams = self.streams.write().await;

        let entry = streams
            .get_mut(key)
            .ok_or_else(|| RegistryError::StreamNotFound(key.clone()))?;

        if entry.viewers.remove(&id).is_none() {
            tracing::warn!(stream = %key, viewer = %id, "Detach of unknown viewer");
            return Ok(false);
        }

        tracing::info!(
            stream = %key,
            viewer = %id,
            viewers = entry.viewers.len(),
            "Viewer detached"
        );

        if entry.viewers.is_empty() {
            return Ok(Self::remove_locked(&mut streams, key));
        }
        Ok(false)
    }

    /// Deliver a unit to every viewer of a stream
    ///
    /// Never blocks: a viewer whose queue is full misses this unit. Returns
    /// the number of viewers that received it.
    pub async fn broadcast(&self, key: &StreamKey, unit: MediaUnit) -> usize {
        self.fan_out(key, None, unit).await
    }

    /// Fan-out used by session tasks; ignores entries of other generations
    pub(crate) async fn fan_out(
        &self,
        key: &StreamKey,
        generation: Option<u64>,
        unit: MediaUnit,
    ) -> usize {
        let (senders, counters) = {
            let streams = self.streams.read().await;

            match streams.get(key) {
                Some(entry) if generation.map_or(true, |g| g == entry.generation) => {
                    (entry.viewer_senders(), Arc::clone(&entry.counters))
                }
                _ => return 0,
            }
        };

        StreamCounters::incr(&counters.units_received);

        let mut delivered = 0;
        for tx in senders {
            match tx.try_send(unit.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    StreamCounters::incr(&counters.units_dropped);
                    tracing::trace!(stream = %key, "Viewer queue full, unit dropped");
                }
                // Pipeline already finished; its detach is on the way
                Err(TrySendError::Closed(_)) => {}
            }
        }
        delivered
    }

    /// All registered stream keys, sorted
    pub async fn list_streams(&self) -> Vec<StreamKey> {
        let streams = self.streams.read().await;
        let mut keys: Vec<StreamKey> = streams.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Get stream statistics
    pub async fn stream_stats(&self, key: &StreamKey) -> Option<StreamStats> {
        let streams = self.streams.read().await;
        streams.get(key).map(StreamEntry::stats)
    }

    /// Number of viewers attached to a stream (0 if missing)
    pub async fn viewer_count(&self, key: &StreamKey) -> usize {
        let streams = self.streams.read().await;
        streams.get(key).map(|e| e.viewers.len()).unwrap_or(0)
    }

    /// Get total number of streams
    pub async fn stream_count(&self) -> usize {
        self.streams.read().await.len()
    }

    #[cfg(test)]
    pub(crate) async fn generation_of(&self, key: &StreamKey) -> Option<u64> {
        self.streams.read().await.get(key).map(|e| e.generation)
    }
}
