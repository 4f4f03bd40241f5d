//! Presentation-free conversions consumed by progress sinks.

use crate::OperationKind;

const KIB: f64 = 1024.0;
const BYTE_UNITS: [&str; 4] = ["KB", "MB", "GB", "TB"];

/// `"{m}m {s}s"` from one minute up, `"{s}s"` below.
pub fn format_duration(seconds: u64) -> String {
    if seconds >= 60 {
        format!("{}m {}s", seconds / 60, seconds % 60)
    } else {
        format!("{seconds}s")
    }
}

/// Unknown ETAs render as `"unknown"`, never as `"0s"`.
pub fn format_eta(eta_seconds: Option<u64>) -> String {
    match eta_seconds {
        Some(seconds) => format_duration(seconds),
        None => "unknown".to_string(),
    }
}

pub fn format_bytes(bytes: u64) -> String {
    if (bytes as f64) < KIB {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64 / KIB;
    let mut unit = BYTE_UNITS[0];
    for next in &BYTE_UNITS[1..] {
        if value < KIB {
            break;
        }
        value /= KIB;
        unit = next;
    }
    format!("{value:.1} {unit}")
}

pub fn format_rate(rate: f64, kind: OperationKind) -> String {
    let rate = rate.max(0.0);
    match kind {
        OperationKind::Crawl => format!("{rate:.1} {}/s", kind.unit_label()),
        OperationKind::Download => format!("{}/s", format_bytes(rate as u64)),
    }
}

pub fn format_percentage(percentage: f64) -> String {
    format!("{:.1}%", percentage.clamp(0.0, 100.0))
}
