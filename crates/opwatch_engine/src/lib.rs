//! Opwatch engine: backend polling and effect execution.
mod controller;
mod poller;
mod port;
mod process;
mod sink;
mod types;

pub use controller::OperationController;
pub use poller::{poll_once, PollSettings, ProgressPoller};
pub use port::OperationPort;
pub use process::{ProcessCommand, ProcessPort, PARAMS_ENV, STATUS_TAG};
pub use sink::{ChannelProgressSink, ProgressSink};
pub use types::{
    BackendProgress, LogReply, MonitorEvent, PortError, ProgressReply, ReplyStatus, StartOutcome,
    StartReply,
};
