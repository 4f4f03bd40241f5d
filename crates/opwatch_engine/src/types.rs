use opwatch_core::{
    OperationKind, PollReport, ProgressEvent, ProgressSnapshot, SessionId, TerminalStatus,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplyStatus {
    Success,
    Started,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartReply {
    pub status: ReplyStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Progress payload as the backend reports it. Every field is optional.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BackendProgress {
    #[serde(default, alias = "percent", skip_serializing_if = "Option::is_none")]
    pub percentage: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datasets_found: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub satellites_found: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bytes_downloaded: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_bytes: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elapsed_time: Option<f64>,
}

impl BackendProgress {
    /// Byte counts become a progress event; inconsistent counts are dropped.
    fn transfer_event(&self) -> Option<ProgressEvent> {
        let current = self.bytes_downloaded?;
        let total = self.total_bytes?;
        let elapsed = self.elapsed_time.filter(|e| e.is_finite() && *e >= 0.0)?;
        if current > total {
            return None;
        }
        Some(ProgressEvent::new(current, total, elapsed.floor() as u64))
    }

    fn discovery_message(&self) -> Option<String> {
        match (self.datasets_found, self.satellites_found) {
            (Some(datasets), Some(satellites)) => Some(format!(
                "Found {datasets} datasets across {satellites} satellites"
            )),
            (Some(datasets), None) => Some(format!("Found {datasets} datasets")),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressReply {
    pub status: ReplyStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<BackendProgress>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ProgressReply {
    pub fn success(progress: BackendProgress) -> Self {
        Self {
            status: ReplyStatus::Success,
            progress: Some(progress),
            message: None,
        }
    }

    /// Flattens the reply into what the session state machine consumes.
    pub fn into_report(self) -> PollReport {
        let progress = self.progress.unwrap_or_default();
        let event = progress.transfer_event();
        let discovery = progress.discovery_message();
        let BackendProgress {
            percentage,
            message,
            completed,
            error,
            ..
        } = progress;

        let backend_error = match (self.status, error) {
            (_, Some(error)) => Some(error),
            (ReplyStatus::Error, None) => Some(
                self.message
                    .clone()
                    .or_else(|| message.clone())
                    .unwrap_or_else(|| "backend reported an error".to_string()),
            ),
            _ => None,
        };

        PollReport {
            backend_error,
            completed: completed.unwrap_or(false),
            percentage,
            message: message.or(self.message).or(discovery),
            event,
            log_text: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogReply {
    pub status: ReplyStatus,
    #[serde(default)]
    pub log: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PortError {
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("malformed backend reply: {0}")]
    Decode(String),
    #[error("not supported by this backend: {0}")]
    Unsupported(&'static str),
}

impl From<serde_json::Error> for PortError {
    fn from(err: serde_json::Error) -> Self {
        PortError::Decode(err.to_string())
    }
}

/// Result of `OperationController::start`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    Started(SessionId),
    /// A run of the same kind is in progress; it was left untouched.
    AlreadyRunning(SessionId),
    Failed { id: SessionId, message: String },
    /// The run was cancelled before the backend confirmed the start.
    Cancelled(SessionId),
}

/// Sink callbacks as values, for consumers that live on another thread.
#[derive(Debug, Clone, PartialEq)]
pub enum MonitorEvent {
    Progress {
        kind: OperationKind,
        snapshot: ProgressSnapshot,
    },
    Terminal {
        kind: OperationKind,
        status: TerminalStatus,
        message: Option<String>,
    },
}
