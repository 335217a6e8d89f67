//! Clock and timing utilities for the capture loops.
//!
//! A recording session anchors its elapsed-time readout to a monotonic
//! epoch captured when screen capture launches. This module provides:
//! - The session clock
//! - A rate controller used to pace screen grabs
//! - Elapsed-time formatting for display

use std::time::{Duration, Instant};

/// A recording clock that provides monotonic timestamps relative to
/// a fixed epoch (the moment screen capture started).
#[derive(Debug, Clone)]
pub struct RecordingClock {
    /// The instant recording started.
    epoch: Instant,

    /// Wall-clock time at epoch (ISO 8601 string).
    epoch_wall: String,
}

impl RecordingClock {
    /// Create a new recording clock anchored to now.
    pub fn start() -> Self {
        Self {
            epoch: Instant::now(),
            epoch_wall: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Get nanoseconds elapsed since recording start.
    pub fn elapsed_ns(&self) -> u64 {
        self.epoch.elapsed().as_nanos() as u64
    }

    /// Get seconds elapsed since recording start.
    pub fn elapsed_secs(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64()
    }

    /// Whole seconds elapsed, as shown by the once-per-second readout.
    pub fn elapsed_whole_secs(&self) -> u64 {
        self.epoch.elapsed().as_secs()
    }

    /// Wall-clock time at recording start.
    pub fn epoch_wall(&self) -> &str {
        &self.epoch_wall
    }
}

/// Frame rate controller for screen grabs.
#[derive(Debug)]
pub struct RateController {
    target_interval_ns: u64,
    last_tick_ns: Option<u64>,
}

impl RateController {
    /// Create a controller targeting the given Hz rate.
    pub fn new(target_hz: u32) -> Self {
        Self {
            target_interval_ns: 1_000_000_000 / target_hz.max(1) as u64,
            last_tick_ns: None,
        }
    }

    /// Check if enough time has passed for the next tick.
    /// Returns true and updates internal state if ready.
    /// The first call always returns true.
    pub fn should_tick(&mut self, current_ns: u64) -> bool {
        match self.last_tick_ns {
            None => {
                self.last_tick_ns = Some(current_ns);
                true
            }
            Some(last) if current_ns >= last + self.target_interval_ns => {
                self.last_tick_ns = Some(current_ns);
                true
            }
            _ => false,
        }
    }

    /// Time left until the next tick is due. Zero when a tick is due now.
    pub fn until_next_tick(&self, current_ns: u64) -> Duration {
        match self.last_tick_ns {
            None => Duration::ZERO,
            Some(last) => {
                let due = last + self.target_interval_ns;
                Duration::from_nanos(due.saturating_sub(current_ns))
            }
        }
    }

    /// Target interval in nanoseconds.
    pub fn interval_ns(&self) -> u64 {
        self.target_interval_ns
    }
}

/// Format whole seconds as `MM:SS`.
pub fn format_elapsed(secs: u64) -> String {
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_elapsed() {
        let clock = RecordingClock::start();
        // Should be very small but non-negative
        assert!(clock.elapsed_ns() < 1_000_000_000); // less than 1 second
        assert_eq!(clock.elapsed_whole_secs(), 0);
    }

    #[test]
    fn test_rate_controller() {
        let mut ctrl = RateController::new(20);
        assert!(ctrl.should_tick(0)); // first tick always fires
        assert!(!ctrl.should_tick(10_000_000)); // 10ms later, too soon
        assert!(ctrl.should_tick(50_000_000)); // 20Hz = 50ms
    }

    #[test]
    fn test_until_next_tick() {
        let mut ctrl = RateController::new(20);
        assert_eq!(ctrl.until_next_tick(0), Duration::ZERO);
        ctrl.should_tick(0);
        assert_eq!(ctrl.until_next_tick(20_000_000), Duration::from_millis(30));
        assert_eq!(ctrl.until_next_tick(80_000_000), Duration::ZERO);
    }

    #[test]
    fn test_format_elapsed() {
        assert_eq!(format_elapsed(0), "00:00");
        assert_eq!(format_elapsed(65), "01:05");
        assert_eq!(format_elapsed(3600), "60:00");
    }
}
