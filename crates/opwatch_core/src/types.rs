use std::fmt;
use std::time::Instant;

/// The two monitored background jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OperationKind {
    Crawl,
    Download,
}

impl OperationKind {
    pub const ALL: [OperationKind; 2] = [OperationKind::Crawl, OperationKind::Download];

    /// Default rolling-window capacity: one sample per second of graph history.
    pub fn window_capacity(self) -> usize {
        match self {
            OperationKind::Crawl => 60,
            OperationKind::Download => 30,
        }
    }

    /// Whether the backend exposes a raw log tail as a secondary progress source.
    pub fn uses_log_tail(self) -> bool {
        matches!(self, OperationKind::Crawl)
    }

    /// Unit counted by `ProgressEvent::current_units` for this kind.
    pub fn unit_label(self) -> &'static str {
        match self {
            OperationKind::Crawl => "datasets",
            OperationKind::Download => "bytes",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationKind::Crawl => write!(f, "crawl"),
            OperationKind::Download => write!(f, "download"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionStatus {
    #[default]
    Idle,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl SessionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SessionStatus::Completed | SessionStatus::Failed | SessionStatus::Cancelled
        )
    }
}

/// Handle for one run of an operation. `run` increases with every start of the same kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId {
    pub kind: OperationKind,
    pub run: u64,
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.kind, self.run)
    }
}

/// A `current/total label` pair as printed by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitCount {
    pub current: u64,
    pub total: u64,
    pub label: String,
}

/// Structured progress extracted from backend output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    pub current_units: u64,
    pub total_units: u64,
    /// Backend-reported elapsed time; never measured on the client.
    pub elapsed_seconds: u64,
    pub message: Option<String>,
    pub secondary: Option<UnitCount>,
}

impl ProgressEvent {
    pub fn new(current_units: u64, total_units: u64, elapsed_seconds: u64) -> Self {
        Self {
            current_units,
            total_units,
            elapsed_seconds,
            message: None,
            secondary: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThroughputSample {
    pub timestamp: Instant,
    /// Units (or bytes) per second; never negative.
    pub rate: f64,
}

/// Terminal marker carried by a snapshot. Cancellation never comes from a poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SnapshotTerminal {
    #[default]
    None,
    Completed,
    Failed,
}

/// Outcome reported once through `ProgressSink::on_terminal`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalStatus {
    Completed,
    Failed,
    Cancelled,
}

impl TerminalStatus {
    pub fn as_status(self) -> SessionStatus {
        match self {
            TerminalStatus::Completed => SessionStatus::Completed,
            TerminalStatus::Failed => SessionStatus::Failed,
            TerminalStatus::Cancelled => SessionStatus::Cancelled,
        }
    }
}

impl fmt::Display for TerminalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerminalStatus::Completed => write!(f, "Completed"),
            TerminalStatus::Failed => write!(f, "Failed"),
            TerminalStatus::Cancelled => write!(f, "Cancelled"),
        }
    }
}
