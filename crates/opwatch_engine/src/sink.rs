use std::sync::mpsc;

use opwatch_core::{OperationKind, ProgressSnapshot, TerminalStatus};

use crate::MonitorEvent;

/// Receiver of progress for one operation kind.
///
/// Callbacks run while the controller holds its session lock, so an
/// implementation must not call back into the controller.
pub trait ProgressSink: Send + Sync {
    fn on_progress(&self, snapshot: &ProgressSnapshot);
    fn on_terminal(&self, status: TerminalStatus, message: Option<&str>);
}

pub struct ChannelProgressSink {
    kind: OperationKind,
    tx: mpsc::Sender<MonitorEvent>,
}

impl ChannelProgressSink {
    pub fn new(kind: OperationKind, tx: mpsc::Sender<MonitorEvent>) -> Self {
        Self { kind, tx }
    }
}

impl ProgressSink for ChannelProgressSink {
    fn on_progress(&self, snapshot: &ProgressSnapshot) {
        let _ = self.tx.send(MonitorEvent::Progress {
            kind: self.kind,
            snapshot: snapshot.clone(),
        });
    }

    fn on_terminal(&self, status: TerminalStatus, message: Option<&str>) {
        let _ = self.tx.send(MonitorEvent::Terminal {
            kind: self.kind,
            status,
            message: message.map(ToOwned::to_owned),
        });
    }
}
