//! Progress tracking for file uploads

use std::fmt;
use std::time::{Duration, Instant};

pub mod format;

pub use format::{format_size, format_speed};

/// Default reporting step, in percent.
pub const DEFAULT_INTERVAL_PERCENT: u8 = 10;

/// One progress announcement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressUpdate {
    /// Whole percent complete, never above 100
    pub percent: u8,
    pub transferred: u64,
    pub total: u64,
    /// Average speed since the transfer started, e.g. `1.2 MB/s`
    pub speed: String,
}

impl fmt::Display for ProgressUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}% complete ({}/{}) at {}",
            self.percent,
            format_size(self.transferred),
            format_size(self.total),
            self.speed
        )
    }
}

/// Decides when a transfer has crossed the next reporting threshold.
///
/// Thresholds sit on a fixed grid of `interval` percent. When a single chunk
/// jumps over several grid lines only one update is produced, and the
/// remembered threshold snaps down to the grid line just below the current
/// percentage rather than to the percentage itself.
#[derive(Debug)]
pub struct ProgressReporter {
    total: u64,
    interval: u8,
    last_threshold: u8,
    started: Instant,
}

impl ProgressReporter {
    /// Create a reporter for `total` bytes. `interval` is clamped to 1..=100.
    pub fn new(total: u64, interval: u8) -> Self {
        Self {
            total,
            interval: interval.clamp(1, 100),
            last_threshold: 0,
            started: Instant::now(),
        }
    }

    /// Feed the cumulative byte count, measuring speed from creation time.
    pub fn record(&mut self, transferred: u64) -> Option<ProgressUpdate> {
        let elapsed = self.started.elapsed();
        self.record_at(transferred, elapsed)
    }

    /// Like [`record`](Self::record) with an explicit elapsed time.
    pub fn record_at(&mut self, transferred: u64, elapsed: Duration) -> Option<ProgressUpdate> {
        if self.total == 0 {
            return None;
        }

        let percent = percent_of(transferred, self.total);
        if u16::from(percent) < u16::from(self.last_threshold) + u16::from(self.interval) {
            return None;
        }

        self.last_threshold = (percent / self.interval) * self.interval;

        Some(ProgressUpdate {
            percent,
            transferred,
            total: self.total,
            speed: format_speed(transferred, elapsed),
        })
    }

    /// Highest grid line announced so far.
    pub fn last_threshold(&self) -> u8 {
        self.last_threshold
    }
}

/// Floor of `transferred * 100 / total`, capped at 100.
fn percent_of(transferred: u64, total: u64) -> u8 {
    let percent = u128::from(transferred) * 100 / u128::from(total);
    percent.min(100) as u8
}

/// Result of a finished upload
#[derive(Debug, Clone)]
pub struct UploadSummary {
    pub bytes_transferred: u64,
    pub duration: Duration,
    pub remote_path: String,
}

impl UploadSummary {
    /// Get human-readable average throughput
    pub fn throughput_human(&self) -> String {
        format_speed(self.bytes_transferred, self.duration)
    }
}
