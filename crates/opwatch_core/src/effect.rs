use crate::{ProgressSnapshot, SessionId, TerminalStatus};

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Ask the backend to start the run.
    LaunchBackend { id: SessionId },
    /// A run of this kind is already in progress; nothing was started.
    StartRejected { running: SessionId },
    BeginPolling { id: SessionId },
    StopPolling { id: SessionId },
    /// Best-effort notification to the backend; failure is not fatal.
    CancelBackend { id: SessionId },
    DeliverProgress {
        id: SessionId,
        snapshot: ProgressSnapshot,
    },
    DeliverTerminal {
        id: SessionId,
        status: TerminalStatus,
        message: Option<String>,
    },
}
