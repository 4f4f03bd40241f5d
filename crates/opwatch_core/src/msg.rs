use std::time::Instant;

use crate::{ProgressEvent, SessionId};

/// Everything a single poll tick learned from the backend.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PollReport {
    /// Backend-reported failure (a reply with error status or an `error` field).
    pub backend_error: Option<String>,
    pub completed: bool,
    /// Percentage as reported by the backend; used when no unit counts are known.
    pub percentage: Option<f64>,
    pub message: Option<String>,
    /// Progress carried by the structured reply, if it had unit counts.
    pub event: Option<ProgressEvent>,
    /// Raw log tail, parsed when the structured reply had no unit counts.
    pub log_text: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Msg {
    /// Caller asked to start a new run.
    Start { now: Instant },
    /// The backend accepted the start request.
    BackendStarted {
        id: SessionId,
        message: Option<String>,
    },
    /// The backend refused to start, or the start call itself failed.
    BackendStartFailed { id: SessionId, message: String },
    /// One poll tick completed.
    Polled {
        id: SessionId,
        report: PollReport,
        now: Instant,
    },
    /// The progress query itself failed (transport, not a backend-reported error).
    PollFailed { id: SessionId, error: String },
    /// Caller cancelled the running operation.
    Cancel,
    /// Return a finished session to `Idle`.
    Reset,
}
