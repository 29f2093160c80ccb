//! Clock and timing utilities.
//!
//! Two notions of time matter during a capture:
//! - a monotonic epoch anchored at Recording entry, used to measure how long
//!   the encoder actually ran
//! - local wall-clock time, used to stamp exported filenames

use std::time::Instant;

use chrono::NaiveDateTime;

/// Source of local wall-clock time.
///
/// Injected into exporters so filenames can be checked against a known time.
pub trait WallClock: Send + Sync {
    /// Current local date and time.
    fn now(&self) -> NaiveDateTime;
}

/// Wall clock backed by the system's local time zone.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl WallClock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        chrono::Local::now().naive_local()
    }
}

/// A monotonic clock anchored to the moment recording started.
#[derive(Debug, Clone)]
pub struct RecordingClock {
    epoch: Instant,
}

impl RecordingClock {
    /// Create a new recording clock anchored to now.
    pub fn start() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }

    /// Seconds elapsed since recording start.
    pub fn elapsed_secs(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64()
    }
}

/// Format whole seconds as `mm:ss` for the recording timer display.
///
/// Minutes are not wrapped into hours.
pub fn format_elapsed(seconds: u64) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

/// Format a timestamp as `YYYY-MM-DD_HH-mm` for download filenames.
pub fn filename_timestamp(at: NaiveDateTime) -> String {
    at.format("%Y-%m-%d_%H-%M").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_format_elapsed() {
        assert_eq!(format_elapsed(0), "00:00");
        assert_eq!(format_elapsed(9), "00:09");
        assert_eq!(format_elapsed(75), "01:15");
        assert_eq!(format_elapsed(3600), "60:00");
    }

    #[test]
    fn test_filename_timestamp_is_zero_padded() {
        let at = NaiveDate::from_ymd_opt(2024, 3, 7)
            .unwrap()
            .and_hms_opt(9, 5, 59)
            .unwrap();
        assert_eq!(filename_timestamp(at), "2024-03-07_09-05");
    }

    #[test]
    fn test_clock_elapsed() {
        let clock = RecordingClock::start();
        assert!(clock.elapsed_secs() < 1.0);
    }
}
