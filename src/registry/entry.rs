//! Stream entry and state types
//!
//! This module defines the per-stream state stored in the registry.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, oneshot, watch};

use crate::media::CodecDescriptor;

use super::frame::MediaUnit;
use super::id::ViewerId;

/// Sending half of one viewer's queue
pub(super) struct ViewerHandle {
    pub(super) tx: mpsc::Sender<MediaUnit>,
    pub(super) attached_at: Instant,
}

/// Counters updated outside the registry lock
#[derive(Debug, Default)]
pub(crate) struct StreamCounters {
    /// Units read from upstream
    pub(crate) units_received: AtomicU64,
    /// Per-viewer deliveries dropped on a full queue
    pub(crate) units_dropped: AtomicU64,
    /// Dial attempts, successful or not
    pub(crate) connect_attempts: AtomicU64,
    /// Established connections lost mid-stream
    pub(crate) reconnects: AtomicU64,
}

impl StreamCounters {
    pub(crate) fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Entry for a single stream in the registry
pub(super) struct StreamEntry {
    /// Codec parameters of the current upstream connection
    pub(super) codecs: Vec<CodecDescriptor>,

    /// Readiness flag; receivers wake when codecs arrive
    pub(super) ready_tx: watch::Sender<bool>,

    /// Attached viewers
    pub(super) viewers: HashMap<ViewerId, ViewerHandle>,

    /// Stop signal for the session task; consumed by the send
    control: Option<oneshot::Sender<()>>,

    /// Identifies the session task bound to this entry
    pub(super) generation: u64,

    pub(super) counters: Arc<StreamCounters>,

    /// When the stream was created
    pub(super) created_at: Instant,
}

impl StreamEntry {
    /// Create a new entry and the stop receiver for its session task
    pub(super) fn new(generation: u64) -> (Self, oneshot::Receiver<()>) {
        let (control, stop_rx) = oneshot::channel();
        let (ready_tx, _) = watch::channel(false);

        let entry = Self {
            codecs: Vec::new(),
            ready_tx,
            viewers: HashMap::new(),
            control: Some(control),
            generation,
            counters: Arc::new(StreamCounters::default()),
            created_at: Instant::now(),
        };

        (entry, stop_rx)
    }

    pub(super) fn is_ready(&self) -> bool {
        *self.ready_tx.borrow()
    }

    pub(super) fn set_ready(&mut self, codecs: Vec<CodecDescriptor>) {
        self.codecs = codecs;
        self.ready_tx.send_replace(true);
    }

    pub(super) fn clear_ready(&mut self) {
        self.codecs.clear();
        self.ready_tx.send_replace(false);
    }

    /// Ask the session task to stop. Only the first call sends.
    pub(super) fn signal_stop(&mut self) {
        if let Some(control) = self.control.take() {
            // The task may already have exited; nothing to do then
            let _ = control.send(());
        }
    }

    pub(super) fn viewer_senders(&self) -> Vec<mpsc::Sender<MediaUnit>> {
        self.viewers.values().map(|v| v.tx.clone()).collect()
    }

    pub(super) fn stats(&self) -> StreamStats {
        StreamStats {
            ready: self.is_ready(),
            codecs: self.codecs.iter().map(|c| c.to_string()).collect(),
            viewer_count: self.viewers.len(),
            oldest_viewer_age: self
                .viewers
                .values()
                .map(|v| v.attached_at.elapsed())
                .max(),
            units_received: self.counters.units_received.load(Ordering::Relaxed),
            units_dropped: self.counters.units_dropped.load(Ordering::Relaxed),
            connect_attempts: self.counters.connect_attempts.load(Ordering::Relaxed),
            reconnects: self.counters.reconnects.load(Ordering::Relaxed),
            uptime: self.created_at.elapsed(),
        }
    }
}

/// Statistics for a stream
#[derive(Debug, Clone)]
pub struct StreamStats {
    /// Whether codec parameters are known for the current connection
    pub ready: bool,
    /// Negotiated codecs, human readable
    pub codecs: Vec<String>,
    /// Number of attached viewers
    pub viewer_count: usize,
    /// How long the longest-attached viewer has been watching
    pub oldest_viewer_age: Option<Duration>,
    /// Units read from upstream
    pub units_received: u64,
    /// Deliveries dropped because a viewer queue was full
    pub units_dropped: u64,
    /// Dial attempts
    pub connect_attempts: u64,
    /// Connections lost mid-stream
    pub reconnects: u64,
    /// Time since the stream was first ensured
    pub uptime: Duration,
}
