use std::time::Instant;

use crate::{
    Effect, Msg, OperationSession, SessionId, SessionStatus, SnapshotTerminal, TerminalStatus,
};

/// Pure update function: applies a message to the session and returns any effects.
///
/// Messages tagged with a `SessionId` that is not the current running one are
/// dropped, which is what keeps terminal notifications to exactly one per run.
pub fn update(mut session: OperationSession, msg: Msg) -> (OperationSession, Vec<Effect>) {
    let effects = match msg {
        Msg::Start { now } => {
            let (next, started) = try_start(session, now);
            session = next;
            match started {
                Ok(id) => vec![Effect::LaunchBackend { id }],
                Err(running) => vec![Effect::StartRejected { running }],
            }
        }
        Msg::BackendStarted { id, message } => {
            if !session.is_current(id) {
                return (session, Vec::new());
            }
            if let Some(message) = message {
                session.set_message(message);
            }
            vec![Effect::BeginPolling { id }]
        }
        Msg::BackendStartFailed { id, message } => {
            if !session.is_current(id) {
                return (session, Vec::new());
            }
            session.finish(TerminalStatus::Failed, Some(message.clone()));
            vec![Effect::DeliverTerminal {
                id,
                status: TerminalStatus::Failed,
                message: Some(message),
            }]
        }
        Msg::Polled { id, report, now } => {
            if !session.is_current(id) {
                return (session, Vec::new());
            }
            let snapshot = session.apply_report(report, now);
            let terminal = match snapshot.terminal {
                SnapshotTerminal::None => None,
                SnapshotTerminal::Completed => Some(TerminalStatus::Completed),
                SnapshotTerminal::Failed => Some(TerminalStatus::Failed),
            };
            let message = snapshot.message.clone();
            let mut effects = vec![Effect::DeliverProgress { id, snapshot }];
            if let Some(status) = terminal {
                session.finish(status, message.clone());
                effects.push(Effect::StopPolling { id });
                effects.push(Effect::DeliverTerminal {
                    id,
                    status,
                    message,
                });
            }
            effects
        }
        Msg::PollFailed { id, error } => {
            if !session.is_current(id) {
                return (session, Vec::new());
            }
            session.finish(TerminalStatus::Failed, Some(error.clone()));
            vec![
                Effect::StopPolling { id },
                Effect::DeliverTerminal {
                    id,
                    status: TerminalStatus::Failed,
                    message: Some(error),
                },
            ]
        }
        Msg::Cancel => match (session.status(), session.id()) {
            (SessionStatus::Running, Some(id)) => {
                let message = format!("{} cancelled", session.kind());
                session.finish(TerminalStatus::Cancelled, Some(message.clone()));
                vec![
                    Effect::StopPolling { id },
                    Effect::CancelBackend { id },
                    Effect::DeliverTerminal {
                        id,
                        status: TerminalStatus::Cancelled,
                        message: Some(message),
                    },
                ]
            }
            _ => Vec::new(),
        },
        Msg::Reset => {
            if session.status().is_terminal() {
                session.reset();
            }
            Vec::new()
        }
    };

    (session, effects)
}

/// The `Start` transition on its own: `Ok` with the new run's id, or `Err`
/// with the id of the run that is still in progress.
pub fn try_start(
    mut session: OperationSession,
    now: Instant,
) -> (OperationSession, Result<SessionId, SessionId>) {
    let started = match (session.status(), session.id()) {
        (SessionStatus::Running, Some(running)) => Err(running),
        _ => Ok(session.begin_run(now)),
    };
    (session, started)
}
