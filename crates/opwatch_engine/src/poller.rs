use std::sync::Arc;
use std::time::Duration;

use opwatch_core::{Msg, OperationKind, PollReport, SessionId};
use opwatch_logging::{watch_debug, watch_error, watch_trace, watch_warn};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::{OperationPort, PortError, ReplyStatus};

const MIN_INTERVAL: Duration = Duration::from_millis(1);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollSettings {
    pub interval: Duration,
    /// Lines requested from the backend log tail on kinds that have one.
    pub log_tail_lines: usize,
    pub window_capacity: usize,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(1000),
            log_tail_lines: 50,
            window_capacity: OperationKind::Crawl.window_capacity(),
        }
    }
}

impl PollSettings {
    pub fn for_kind(kind: OperationKind) -> Self {
        Self {
            window_capacity: kind.window_capacity(),
            ..Self::default()
        }
    }
}

/// Repeating poll task bound to one session.
///
/// Ticks never overlap: each tick awaits its IPC calls before the next tick is
/// taken, and ticks missed while a call was in flight are skipped.
pub struct ProgressPoller {
    port: Arc<dyn OperationPort>,
    id: SessionId,
    settings: PollSettings,
    token: CancellationToken,
}

impl ProgressPoller {
    pub fn new(
        port: Arc<dyn OperationPort>,
        id: SessionId,
        settings: PollSettings,
        token: CancellationToken,
    ) -> Self {
        Self {
            port,
            id,
            settings,
            token,
        }
    }

    /// Runs until the token is cancelled, handing each tick's result to `dispatch`.
    pub async fn run<F>(self, mut dispatch: F)
    where
        F: FnMut(Msg) + Send,
    {
        let period = self.settings.interval.max(MIN_INTERVAL);
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        watch_debug!("{}: polling every {:?}", self.id, period);

        loop {
            tokio::select! {
                biased;
                () = self.token.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let result = tokio::select! {
                biased;
                () = self.token.cancelled() => break,
                result = poll_once(
                    self.port.as_ref(),
                    self.id.kind,
                    self.settings.log_tail_lines,
                ) => result,
            };

            let msg = match result {
                Ok(report) => Msg::Polled {
                    id: self.id,
                    report,
                    now: Instant::now().into_std(),
                },
                Err(err) => {
                    watch_error!("{}: progress query failed: {}", self.id, err);
                    Msg::PollFailed {
                        id: self.id,
                        error: err.to_string(),
                    }
                }
            };
            dispatch(msg);
        }

        watch_debug!("{}: poller stopped", self.id);
    }
}

/// One tick's worth of IPC: the structured query, plus the log tail when the
/// structured reply carried no unit counts and the kind has a log.
pub async fn poll_once(
    port: &dyn OperationPort,
    kind: OperationKind,
    log_tail_lines: usize,
) -> Result<PollReport, PortError> {
    let reply = port.query_progress().await?;
    watch_trace!("{kind}: progress reply {:?}", reply);
    let mut report = reply.into_report();

    if kind.uses_log_tail() && report.event.is_none() {
        match port.tail_log(log_tail_lines).await {
            Ok(log) if log.status != ReplyStatus::Error => report.log_text = Some(log.log),
            Ok(_) => watch_debug!("{kind}: backend refused log tail"),
            Err(PortError::Unsupported(_)) => watch_debug!("{kind}: backend has no log tail"),
            Err(err) => watch_warn!("{kind}: log tail unavailable: {err}"),
        }
    }

    Ok(report)
}
