//! Registry configuration

use std::time::Duration;

/// Default per-viewer queue depth
pub const DEFAULT_VIEWER_QUEUE_CAPACITY: usize = 100;

/// Registry and upstream session options
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Units buffered per viewer before fan-out starts dropping
    pub viewer_queue_capacity: usize,

    /// Fixed delay between failed connect/read attempts
    pub reconnect_backoff: Duration,

    /// How long `ensure_ready` waits for codec parameters
    pub ready_timeout: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            viewer_queue_capacity: DEFAULT_VIEWER_QUEUE_CAPACITY,
            reconnect_backoff: Duration::from_secs(3),
            ready_timeout: Duration::from_secs(10),
        }
    }
}

impl RegistryConfig {
    /// Set the per-viewer queue capacity (minimum 1)
    pub fn viewer_queue_capacity(mut self, capacity: usize) -> Self {
        self.viewer_queue_capacity = capacity.max(1);
        self
    }

    /// Set the reconnect backoff
    pub fn reconnect_backoff(mut self, backoff: Duration) -> Self {
        self.reconnect_backoff = backoff;
        self
    }

    /// Set the readiness timeout
    pub fn ready_timeout(mut self, timeout: Duration) -> Self {
        self.ready_timeout = timeout;
        self
    }
}
