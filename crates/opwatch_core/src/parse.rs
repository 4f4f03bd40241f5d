use std::sync::LazyLock;

use regex::Regex;

use crate::{ProgressEvent, UnitCount};

/// Literal tag that prefixes every progress marker line.
pub const PROGRESS_TAG: &str = "[PROGRESS]";

static PROGRESS_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\[PROGRESS\]\s+(\d+)/(\d+)\s+([^|]*?)\s*\|\s*(\d+)/(\d+)\s+([^|]*?)\s*\|\s*Elapsed:\s*(\d+)s\s*$",
    )
    .expect("progress line pattern is valid")
});

/// Returns the most recent well-formed progress marker in `log_text`, if any.
///
/// Lines that do not match the marker grammar are skipped, as are markers
/// whose counts are inconsistent (`current > total`).
pub fn parse_progress(log_text: &str) -> Option<ProgressEvent> {
    log_text.lines().rev().find_map(parse_line)
}

fn parse_line(line: &str) -> Option<ProgressEvent> {
    let line = line.trim();
    if !line.starts_with(PROGRESS_TAG) {
        return None;
    }
    let caps = PROGRESS_LINE.captures(line)?;

    let primary = unit_count(&caps[1], &caps[2], &caps[3])?;
    let secondary = unit_count(&caps[4], &caps[5], &caps[6])?;
    let elapsed_seconds = caps[7].parse().ok()?;

    let message = format!(
        "{}/{} {} | {}/{} {}",
        primary.current,
        primary.total,
        primary.label,
        secondary.current,
        secondary.total,
        secondary.label
    );

    Some(ProgressEvent {
        current_units: primary.current,
        total_units: primary.total,
        elapsed_seconds,
        message: Some(message),
        secondary: Some(secondary),
    })
}

fn unit_count(current: &str, total: &str, label: &str) -> Option<UnitCount> {
    // Digit runs too long for u64 fail here and count as a non-match.
    let current: u64 = current.parse().ok()?;
    let total: u64 = total.parse().ok()?;
    if current > total || label.is_empty() {
        return None;
    }
    Some(UnitCount {
        current,
        total,
        label: label.to_string(),
    })
}
