//! Presentation time to RTP-style sample counts
//!
//! Downstream samples carry a duration in clock ticks rather than an
//! absolute timestamp. The duration of a unit is taken as the gap between
//! its presentation time and the previous forwarded unit's, truncated to
//! whole milliseconds.

use std::time::Duration;

/// Clock rate of H.264 over RTP
pub const VIDEO_CLOCK_RATE: u32 = 90_000;

/// Tracks the previous forwarded timestamp of one viewer
#[derive(Debug, Clone)]
pub struct SampleClock {
    clock_rate: u32,
    previous: Option<Duration>,
}

impl SampleClock {
    pub fn new(clock_rate: u32) -> Self {
        Self {
            clock_rate,
            previous: None,
        }
    }

    /// Sample count for a unit at `timestamp`; the first unit gets 0
    pub fn advance(&mut self, timestamp: Duration) -> u32 {
        let delta = match self.previous {
            Some(previous) => timestamp.saturating_sub(previous),
            None => Duration::ZERO,
        };
        self.previous = Some(timestamp);
        samples_for(self.clock_rate, delta)
    }
}

/// Convert a duration to clock ticks at millisecond resolution
pub fn samples_for(clock_rate: u32, delta: Duration) -> u32 {
    let per_ms = u128::from(clock_rate / 1000);
    (per_ms * delta.as_millis()).min(u128::from(u32::MAX)) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_unit_is_zero() {
        let mut clock = SampleClock::new(VIDEO_CLOCK_RATE);
        assert_eq!(clock.advance(Duration::from_millis(1234)), 0);
    }

    #[test]
    fn test_33ms_at_90khz() {
        let mut clock = SampleClock::new(VIDEO_CLOCK_RATE);
        clock.advance(Duration::from_millis(100));
        assert_eq!(clock.advance(Duration::from_millis(133)), 2970);
        assert_eq!(clock.advance(Duration::from_millis(173)), 3600);
    }

    #[test]
    fn test_sub_millisecond_truncated() {
        assert_eq!(samples_for(VIDEO_CLOCK_RATE, Duration::from_micros(33_900)), 2970);
        assert_eq!(samples_for(VIDEO_CLOCK_RATE, Duration::from_micros(900)), 0);
    }

    #[test]
    fn test_backwards_timestamp_saturates() {
        let mut clock = SampleClock::new(VIDEO_CLOCK_RATE);
        clock.advance(Duration::from_millis(500));
        assert_eq!(clock.advance(Duration::from_millis(400)), 0);
        // The regressed timestamp becomes the new reference
        assert_eq!(clock.advance(Duration::from_millis(440)), 3600);
    }

    #[test]
    fn test_huge_gap_clamped() {
        assert_eq!(samples_for(VIDEO_CLOCK_RATE, Duration::from_secs(u64::MAX / 1000)), u32::MAX);
    }
}
