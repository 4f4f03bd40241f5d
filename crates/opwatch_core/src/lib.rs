//! Opwatch core: log parsing, throughput estimation, and the pure session state machine.
mod effect;
mod estimator;
pub mod format;
mod msg;
mod parse;
mod session;
mod snapshot;
mod types;
mod update;

pub use effect::Effect;
pub use estimator::ThroughputEstimator;
pub use format::{format_bytes, format_duration, format_eta, format_percentage, format_rate};
pub use msg::{Msg, PollReport};
pub use parse::{parse_progress, PROGRESS_TAG};
pub use session::OperationSession;
pub use snapshot::ProgressSnapshot;
pub use types::{
    OperationKind, ProgressEvent, SessionId, SessionStatus, SnapshotTerminal, TerminalStatus,
    ThroughputSample, UnitCount,
};
pub use update::{try_start, update};
