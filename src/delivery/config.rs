//! Viewer pipeline configuration

use std::time::Duration;

use super::timing::VIDEO_CLOCK_RATE;

/// Per-viewer delivery options
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Hang up if no keep-alive arrives for this long
    pub keepalive_timeout: Duration,

    /// Clock rate used to turn timestamp gaps into sample counts
    pub video_clock_rate: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            keepalive_timeout: Duration::from_secs(5),
            video_clock_rate: VIDEO_CLOCK_RATE,
        }
    }
}

impl PipelineConfig {
    /// Set the keep-alive window
    pub fn keepalive_timeout(mut self, timeout: Duration) -> Self {
        self.keepalive_timeout = timeout;
        self
    }

    /// Set the video clock rate
    pub fn video_clock_rate(mut self, rate: u32) -> Self {
        self.video_clock_rate = rate;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();

        assert_eq!(config.keepalive_timeout, Duration::from_secs(5));
        assert_eq!(config.video_clock_rate, 90_000);
    }

    #[test]
    fn test_builder_chaining() {
        let config = PipelineConfig::default()
            .keepalive_timeout(Duration::from_secs(2))
            .video_clock_rate(48_000);

        assert_eq!(config.keepalive_timeout, Duration::from_secs(2));
        assert_eq!(config.video_clock_rate, 48_000);
    }
}
