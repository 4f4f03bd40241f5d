use std::time::Instant;

use crate::parse::parse_progress;
use crate::{
    OperationKind, PollReport, ProgressEvent, ProgressSnapshot, SessionId, SessionStatus,
    SnapshotTerminal, TerminalStatus, ThroughputEstimator,
};

/// State of the single run slot for one operation kind.
///
/// Owned by whoever drives the operation and advanced only through [`crate::update`].
#[derive(Debug, Clone, PartialEq)]
pub struct OperationSession {
    kind: OperationKind,
    id: Option<SessionId>,
    runs: u64,
    status: SessionStatus,
    started_at: Option<Instant>,
    last_message: Option<String>,
    error: Option<String>,
    estimator: ThroughputEstimator,
    last_event: Option<ProgressEvent>,
    last_percentage: f64,
}

impl OperationSession {
    pub fn new(kind: OperationKind) -> Self {
        Self::with_window_capacity(kind, kind.window_capacity())
    }

    pub fn with_window_capacity(kind: OperationKind, capacity: usize) -> Self {
        Self {
            kind,
            id: None,
            runs: 0,
            status: SessionStatus::Idle,
            started_at: None,
            last_message: None,
            error: None,
            estimator: ThroughputEstimator::new(capacity),
            last_event: None,
            last_percentage: 0.0,
        }
    }

    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    pub fn id(&self) -> Option<SessionId> {
        self.id
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn is_running(&self) -> bool {
        self.status == SessionStatus::Running
    }

    pub fn started_at(&self) -> Option<Instant> {
        self.started_at
    }

    pub fn last_message(&self) -> Option<&str> {
        self.last_message.as_deref()
    }

    /// Present only while the status is `Failed`.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn estimator(&self) -> &ThroughputEstimator {
        &self.estimator
    }

    pub fn last_event(&self) -> Option<&ProgressEvent> {
        self.last_event.as_ref()
    }

    pub fn last_percentage(&self) -> f64 {
        self.last_percentage
    }

    pub(crate) fn is_current(&self, id: SessionId) -> bool {
        self.is_running() && self.id == Some(id)
    }

    pub(crate) fn begin_run(&mut self, now: Instant) -> SessionId {
        self.runs += 1;
        let id = SessionId {
            kind: self.kind,
            run: self.runs,
        };
        self.id = Some(id);
        self.status = SessionStatus::Running;
        self.started_at = Some(now);
        self.last_message = None;
        self.error = None;
        self.estimator.clear();
        self.last_event = None;
        self.last_percentage = 0.0;
        id
    }

    pub(crate) fn set_message(&mut self, message: String) {
        self.last_message = Some(message);
    }

    pub(crate) fn finish(&mut self, status: TerminalStatus, message: Option<String>) {
        self.status = status.as_status();
        if status == TerminalStatus::Failed {
            self.error = Some(message.clone().unwrap_or_else(|| "unknown error".to_string()));
        }
        if let Some(message) = message {
            self.last_message = Some(message);
        }
    }

    pub(crate) fn reset(&mut self) {
        self.id = None;
        self.status = SessionStatus::Idle;
        self.started_at = None;
        self.error = None;
    }

    /// Folds one tick's report into the session and builds the snapshot for the sink.
    pub(crate) fn apply_report(&mut self, report: PollReport, now: Instant) -> ProgressSnapshot {
        let PollReport {
            backend_error,
            completed,
            percentage,
            message,
            event,
            log_text,
        } = report;

        let event = event.or_else(|| log_text.as_deref().and_then(parse_progress));
        let reported = percentage.filter(|p| p.is_finite()).map(clamp_percentage);

        if let Some(event) = event {
            self.estimator.observe(&event, now);
            if event.total_units > 0 {
                let computed = 100.0 * event.current_units as f64 / event.total_units as f64;
                self.last_percentage = clamp_percentage(computed);
            } else if let Some(reported) = reported {
                self.last_percentage = reported;
            }
            self.last_event = Some(event);
        } else if let Some(reported) = reported {
            self.last_percentage = reported;
        }

        let terminal = if backend_error.is_some() {
            SnapshotTerminal::Failed
        } else if completed {
            self.last_percentage = 100.0;
            SnapshotTerminal::Completed
        } else {
            SnapshotTerminal::None
        };

        let message = backend_error
            .or(message)
            .or_else(|| self.last_event.as_ref().and_then(|e| e.message.clone()));
        if let Some(message) = message {
            self.last_message = Some(message);
        }

        let eta_seconds = match terminal {
            SnapshotTerminal::None => self
                .last_event
                .as_ref()
                .and_then(|e| self.estimator.eta(e.total_units, e.current_units)),
            SnapshotTerminal::Completed | SnapshotTerminal::Failed => None,
        };

        ProgressSnapshot {
            percentage: self.last_percentage,
            message: self.last_message.clone(),
            eta_seconds,
            smoothed_rate: self.estimator.smoothed_rate(),
            max_rate: self.estimator.max_rate_in_window(),
            current_units: self.last_event.as_ref().map(|e| e.current_units),
            total_units: self.last_event.as_ref().map(|e| e.total_units),
            terminal,
        }
    }
}

fn clamp_percentage(value: f64) -> f64 {
    value.clamp(0.0, 100.0)
}
