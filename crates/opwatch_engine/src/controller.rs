use std::mem;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use opwatch_core::{
    try_start, update, Effect, Msg, OperationKind, OperationSession, SessionId, SessionStatus,
    TerminalStatus,
};
use opwatch_logging::{watch_error, watch_info, watch_warn};
use serde_json::Value;
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::{OperationPort, PollSettings, ProgressPoller, ProgressSink, ReplyStatus, StartOutcome};

/// Drives one operation kind: owns its session, its poller, and the effects in between.
///
/// Cloning yields another handle to the same controller.
#[derive(Clone)]
pub struct OperationController {
    shared: Arc<Shared>,
}

struct Shared {
    kind: OperationKind,
    port: Arc<dyn OperationPort>,
    sink: Arc<dyn ProgressSink>,
    settings: PollSettings,
    inner: Mutex<Inner>,
    status_tx: watch::Sender<SessionStatus>,
}

struct Inner {
    session: OperationSession,
    poll_token: Option<CancellationToken>,
}

impl OperationController {
    pub fn new(
        kind: OperationKind,
        port: Arc<dyn OperationPort>,
        sink: Arc<dyn ProgressSink>,
        settings: PollSettings,
    ) -> Self {
        let session = OperationSession::with_window_capacity(kind, settings.window_capacity);
        let (status_tx, _) = watch::channel(session.status());
        Self {
            shared: Arc::new(Shared {
                kind,
                port,
                sink,
                settings,
                inner: Mutex::new(Inner {
                    session,
                    poll_token: None,
                }),
                status_tx,
            }),
        }
    }

    pub fn kind(&self) -> OperationKind {
        self.shared.kind
    }

    pub fn status(&self) -> SessionStatus {
        self.shared.lock().session.status()
    }

    /// Copy of the current session state.
    pub fn session(&self) -> OperationSession {
        self.shared.lock().session.clone()
    }

    /// Starts a run unless one of this kind is already in progress.
    pub async fn start(&self, params: &Value) -> StartOutcome {
        let id = match self.shared.begin(Instant::now().into_std()) {
            Ok(id) => id,
            Err(running) => return StartOutcome::AlreadyRunning(running),
        };

        let kind = self.shared.kind;
        let msg = match self.shared.port.start(params).await {
            Ok(reply) if reply.status != ReplyStatus::Error => Msg::BackendStarted {
                id,
                message: reply.message,
            },
            Ok(reply) => Msg::BackendStartFailed {
                id,
                message: reply
                    .message
                    .unwrap_or_else(|| format!("{kind} failed to start")),
            },
            Err(err) => Msg::BackendStartFailed {
                id,
                message: err.to_string(),
            },
        };
        let accepted = matches!(msg, Msg::BackendStarted { .. });

        let effects = self.shared.dispatch(msg);
        for effect in effects {
            match effect {
                Effect::BeginPolling { .. } => return StartOutcome::Started(id),
                Effect::DeliverTerminal {
                    status: TerminalStatus::Failed,
                    message,
                    ..
                } => {
                    return StartOutcome::Failed {
                        id,
                        message: message.unwrap_or_default(),
                    };
                }
                _ => {}
            }
        }

        // Cancelled while the start call was in flight. The backend job exists only now.
        if accepted {
            watch_info!("{id}: backend started after cancellation, cancelling again");
            if let Err(err) = self.shared.port.cancel().await {
                watch_warn!("{id}: backend cancel notification failed: {err}");
            }
        }
        StartOutcome::Cancelled(id)
    }

    /// Cancels the running session. Returns `false` when nothing was running.
    ///
    /// Once this returns, the sink receives no further progress for the run.
    pub fn cancel(&self) -> bool {
        let effects = self.shared.dispatch(Msg::Cancel);
        !effects.is_empty()
    }

    /// Returns a finished session to `Idle`; no-op while running.
    pub fn reset(&self) {
        self.shared.dispatch(Msg::Reset);
    }

    /// Waits until the session is no longer running and returns its status.
    pub async fn wait_until_finished(&self) -> SessionStatus {
        let mut rx = self.shared.status_tx.subscribe();
        loop {
            let status = *rx.borrow_and_update();
            if status != SessionStatus::Running {
                return status;
            }
            if rx.changed().await.is_err() {
                return self.status();
            }
        }
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The `Start` transition, taken under the same lock as every other message.
    fn begin(&self, now: std::time::Instant) -> Result<SessionId, SessionId> {
        let mut inner = self.lock();
        let placeholder = OperationSession::with_window_capacity(self.kind, 1);
        let session = mem::replace(&mut inner.session, placeholder);
        let (session, started) = try_start(session, now);
        inner.session = session;

        match started {
            Ok(id) => watch_info!("{id}: starting backend"),
            Err(running) => {
                watch_info!("{}: start ignored, {running} already in progress", self.kind);
            }
        }
        self.status_tx.send_replace(inner.session.status());
        started
    }

    /// Runs the state machine on `msg` and executes the resulting effects.
    ///
    /// Sink callbacks happen under the lock so that a concurrent `cancel`
    /// either precedes a progress delivery or suppresses it entirely.
    fn dispatch(self: &Arc<Self>, msg: Msg) -> Vec<Effect> {
        let mut inner = self.lock();
        let placeholder = OperationSession::with_window_capacity(self.kind, 1);
        let session = mem::replace(&mut inner.session, placeholder);
        let (session, effects) = update(session, msg);
        inner.session = session;

        for effect in &effects {
            self.execute(&mut inner, effect);
        }
        self.status_tx.send_replace(inner.session.status());
        effects
    }

    fn execute(self: &Arc<Self>, inner: &mut Inner, effect: &Effect) {
        match effect {
            Effect::LaunchBackend { id } => {
                watch_info!("{id}: starting backend");
            }
            Effect::StartRejected { running } => {
                watch_info!("{}: start ignored, {running} already in progress", self.kind);
            }
            Effect::BeginPolling { id } => {
                if let Some(previous) = inner.poll_token.take() {
                    previous.cancel();
                }
                let token = CancellationToken::new();
                inner.poll_token = Some(token.clone());
                self.spawn_poller(*id, token);
            }
            Effect::StopPolling { id } => {
                if let Some(token) = inner.poll_token.take() {
                    token.cancel();
                    watch_info!("{id}: polling stopped");
                }
            }
            Effect::CancelBackend { id } => self.notify_backend_cancel(*id),
            Effect::DeliverProgress { snapshot, .. } => self.sink.on_progress(snapshot),
            Effect::DeliverTerminal {
                id,
                status,
                message,
            } => {
                match status {
                    TerminalStatus::Failed => {
                        watch_error!("{id}: failed: {}", message.as_deref().unwrap_or("-"));
                    }
                    TerminalStatus::Completed | TerminalStatus::Cancelled => {
                        watch_info!("{id}: {status}");
                    }
                }
                self.sink.on_terminal(*status, message.as_deref());
            }
        }
    }

    fn spawn_poller(self: &Arc<Self>, id: SessionId, token: CancellationToken) {
        let poller = ProgressPoller::new(
            Arc::clone(&self.port),
            id,
            self.settings.clone(),
            token,
        );
        let shared = Arc::clone(self);
        tokio::spawn(async move {
            poller
                .run(move |msg| {
                    shared.dispatch(msg);
                })
                .await;
        });
    }

    fn notify_backend_cancel(&self, id: SessionId) {
        let port = Arc::clone(&self.port);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(err) = port.cancel().await {
                        watch_warn!("{id}: backend cancel notification failed: {err}");
                    }
                });
            }
            Err(_) => watch_warn!("{id}: no runtime to notify backend of cancellation"),
        }
    }
}
