//! Transfer speed watchdog.
//!
//! Throughput is averaged over the whole attempt (bytes received since the
//! attempt started divided by elapsed time), not a sliding window. A transfer
//! that starts fast and then stalls is caught only once the average drops
//! under the threshold.

use std::time::Duration;

use crate::config::FetchConfig;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpeedWatchdog {
    grace: Duration,
    min_bytes_per_sec: f64,
}

impl SpeedWatchdog {
    pub fn new(grace: Duration, min_bytes_per_sec: f64) -> Self {
        Self {
            grace,
            min_bytes_per_sec,
        }
    }

    pub fn from_config(config: &FetchConfig) -> Self {
        Self::new(config.watchdog_grace, config.min_bytes_per_sec)
    }

    /// Returns the measured throughput when it is too slow.
    ///
    /// Always `None` until `elapsed` exceeds the grace period.
    pub fn check(&self, received: u64, elapsed: Duration) -> Option<f64> {
        if elapsed <= self.grace {
            return None;
        }
        let bytes_per_sec = received as f64 / elapsed.as_secs_f64();
        (bytes_per_sec < self.min_bytes_per_sec).then_some(bytes_per_sec)
    }
}

impl Default for SpeedWatchdog {
    fn default() -> Self {
        Self::from_config(&FetchConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_verdict_during_grace() {
        let watchdog = SpeedWatchdog::default();
        assert_eq!(watchdog.check(0, Duration::from_millis(1999)), None);
        assert_eq!(watchdog.check(0, Duration::from_secs(2)), None);
    }

    #[test]
    fn test_slow_after_grace() {
        let watchdog = SpeedWatchdog::default();
        let rate = watchdog.check(3000, Duration::from_secs(3)).unwrap();
        assert!((rate - 1000.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_fast_enough_after_grace() {
        let watchdog = SpeedWatchdog::default();
        assert_eq!(watchdog.check(4096, Duration::from_secs(3)), None);
    }

    #[test]
    fn test_average_hides_late_stall() {
        // 1MB in the first second, nothing after: still above 1KB/s at 10s
        let watchdog = SpeedWatchdog::default();
        assert_eq!(watchdog.check(1024 * 1024, Duration::from_secs(10)), None);
    }

    #[test]
    fn test_custom_thresholds() {
        let watchdog = SpeedWatchdog::new(Duration::from_millis(10), 100.0);
        assert_eq!(watchdog.check(5, Duration::from_millis(5)), None);
        assert!(watchdog.check(0, Duration::from_millis(20)).is_some());
    }
}
