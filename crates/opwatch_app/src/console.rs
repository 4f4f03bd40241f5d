//! Line-oriented terminal rendering of progress updates.

use std::io::{self, Write};

use chrono::Local;
use opwatch_core::{
    format_bytes, format_eta, format_percentage, format_rate, OperationKind, ProgressSnapshot,
    TerminalStatus,
};
use opwatch_engine::ProgressSink;

pub struct ConsoleSink {
    kind: OperationKind,
}

impl ConsoleSink {
    pub fn new(kind: OperationKind) -> Self {
        Self { kind }
    }

    fn emit(&self, line: &str) {
        let stamp = Local::now().format("%H:%M:%S");
        // Broken pipes are not worth failing a run over.
        let _ = writeln!(io::stdout().lock(), "{stamp} {line}");
    }
}

impl ProgressSink for ConsoleSink {
    fn on_progress(&self, snapshot: &ProgressSnapshot) {
        self.emit(&render_progress(self.kind, snapshot));
    }

    fn on_terminal(&self, status: TerminalStatus, message: Option<&str>) {
        self.emit(&render_terminal(self.kind, status, message));
    }
}

/// `[crawl] 42.0% | 42/100 datasets | 3.2 datasets/s (peak 4.0 datasets/s) | ETA 18s | message`
pub fn render_progress(kind: OperationKind, snapshot: &ProgressSnapshot) -> String {
    let mut parts = vec![format_percentage(snapshot.percentage)];

    if let (Some(current), Some(total)) = (snapshot.current_units, snapshot.total_units) {
        parts.push(match kind {
            OperationKind::Crawl => format!("{current}/{total} {}", kind.unit_label()),
            OperationKind::Download => {
                format!("{} / {}", format_bytes(current), format_bytes(total))
            }
        });
    }

    if snapshot.smoothed_rate > 0.0 {
        parts.push(format!(
            "{} (peak {})",
            format_rate(snapshot.smoothed_rate, kind),
            format_rate(snapshot.max_rate, kind)
        ));
    }

    parts.push(format!("ETA {}", format_eta(snapshot.eta_seconds)));

    if let Some(message) = snapshot.message.as_deref().filter(|m| !m.is_empty()) {
        parts.push(message.to_string());
    }

    format!("[{kind}] {}", parts.join(" | "))
}

pub fn render_terminal(kind: OperationKind, status: TerminalStatus, message: Option<&str>) -> String {
    match message {
        Some(message) => format!("[{kind}] {status}: {message}"),
        None => format!("[{kind}] {status}"),
    }
}
