//! Human-readable sizes and transfer rates (1024-based units)

use std::time::Duration;

const KB: f64 = 1024.0;
const MB: f64 = KB * 1024.0;
const GB: f64 = MB * 1024.0;

/// Format an absolute byte count, e.g. `512 B`, `1.5 KB`, `3.2 GB`.
pub fn format_size(bytes: u64) -> String {
    let value = bytes as f64;
    if value < KB {
        format!("{} B", bytes)
    } else if value < MB {
        format!("{:.1} KB", value / KB)
    } else if value < GB {
        format!("{:.1} MB", value / MB)
    } else {
        format!("{:.1} GB", value / GB)
    }
}

/// Format the average rate of `bytes` moved over `elapsed`.
///
/// Anything under one millisecond reports `0 B/s` instead of dividing by zero.
pub fn format_speed(bytes: u64, elapsed: Duration) -> String {
    let millis = elapsed.as_millis();
    if millis == 0 {
        return "0 B/s".to_string();
    }

    let per_second = bytes as f64 / (millis as f64 / 1000.0);
    if per_second < KB {
        format!("{:.0} B/s", per_second)
    } else if per_second < MB {
        format!("{:.1} KB/s", per_second / KB)
    } else if per_second < GB {
        format!("{:.1} MB/s", per_second / MB)
    } else {
        format!("{:.1} GB/s", per_second / GB)
    }
}
