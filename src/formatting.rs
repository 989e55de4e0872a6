//! Formatting helpers for rates and byte counts
//!
//! Rates are always carried around as bytes per second. These helpers only
//! exist for log lines, CLI output and the human-readable result fields.

/// Formats a byte rate with binary units (B/s, KB/s, MB/s, GB/s)
///
/// ```
/// use speedwatch::formatting::format_speed;
///
/// assert_eq!(format_speed(512.0), "512.00 B/s");
/// assert_eq!(format_speed(1048576.0), "1.00 MB/s");
/// ```
pub fn format_speed(speed_bps: f64) -> String {
    if speed_bps < 1024.0 {
        format!("{:.2} B/s", speed_bps)
    } else if speed_bps < 1024.0 * 1024.0 {
        format!("{:.2} KB/s", speed_bps / 1024.0)
    } else if speed_bps < 1024.0 * 1024.0 * 1024.0 {
        format!("{:.2} MB/s", speed_bps / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB/s", speed_bps / (1024.0 * 1024.0 * 1024.0))
    }
}

/// Formats a byte rate as a decimal bit rate, the way speedtest tools report it
///
/// ```
/// use speedwatch::formatting::format_bitrate;
///
/// assert_eq!(format_bitrate(125_000.0), "1.00 Mbps");
/// assert_eq!(format_bitrate(125_000_000.0), "1.00 Gbps");
/// ```
pub fn format_bitrate(bytes_per_second: f64) -> String {
    let bits = bytes_per_second * 8.0;
    if bits >= 1_000_000_000.0 {
        format!("{:.2} Gbps", bits / 1_000_000_000.0)
    } else if bits >= 1_000_000.0 {
        format!("{:.2} Mbps", bits / 1_000_000.0)
    } else if bits >= 1_000.0 {
        format!("{:.2} Kbps", bits / 1_000.0)
    } else {
        format!("{:.2} bps", bits)
    }
}

/// Formats a byte count with binary units (B, KB, MB, GB, TB)
pub fn format_bytes(bytes: f64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut value = bytes;
    let mut unit_index = 0;

    while value >= 1024.0 && unit_index < UNITS.len() - 1 {
        value /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{:.0} {}", value, UNITS[unit_index])
    } else {
        format!("{:.2} {}", value, UNITS[unit_index])
    }
}
