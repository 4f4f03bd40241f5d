#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

use opwatch_core::{OperationKind, ProgressSnapshot, TerminalStatus};
use opwatch_engine::{
    BackendProgress, LogReply, OperationController, OperationPort, PollSettings, PortError,
    ProgressReply, ProgressSink, ReplyStatus, StartReply,
};
use serde_json::Value;

pub fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(opwatch_logging::initialize_for_tests);
}

/// Backend double that replays scripted replies.
///
/// Once the script is down to its last reply, that reply repeats forever.
pub struct ScriptedPort {
    start_reply: Result<StartReply, PortError>,
    start_delay: Option<Duration>,
    query_delay: Option<Duration>,
    replies: Mutex<VecDeque<Result<ProgressReply, PortError>>>,
    log: Mutex<String>,
    cancel_result: Result<(), PortError>,
    queries: AtomicUsize,
    tails: AtomicUsize,
    cancels: AtomicUsize,
    start_returned: AtomicBool,
    cancels_after_start: AtomicUsize,
    log_tail: bool,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl Default for ScriptedPort {
    fn default() -> Self {
        Self {
            start_reply: Ok(StartReply {
                status: ReplyStatus::Started,
                message: Some("started".to_string()),
            }),
            start_delay: None,
            query_delay: None,
            replies: Mutex::new(VecDeque::new()),
            log: Mutex::new(String::new()),
            cancel_result: Ok(()),
            queries: AtomicUsize::new(0),
            tails: AtomicUsize::new(0),
            cancels: AtomicUsize::new(0),
            start_returned: AtomicBool::new(false),
            cancels_after_start: AtomicUsize::new(0),
            log_tail: true,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }
}

impl ScriptedPort {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_replies(
        mut self,
        replies: impl IntoIterator<Item = Result<ProgressReply, PortError>>,
    ) -> Self {
        self.replies = Mutex::new(replies.into_iter().collect());
        self
    }

    pub fn with_start_reply(mut self, reply: Result<StartReply, PortError>) -> Self {
        self.start_reply = reply;
        self
    }

    pub fn with_start_delay(mut self, delay: Duration) -> Self {
        self.start_delay = Some(delay);
        self
    }

    pub fn with_query_delay(mut self, delay: Duration) -> Self {
        self.query_delay = Some(delay);
        self
    }

    pub fn with_cancel_result(mut self, result: Result<(), PortError>) -> Self {
        self.cancel_result = result;
        self
    }

    /// Behaves like a backend with no log tail at all.
    pub fn without_log_tail(mut self) -> Self {
        self.log_tail = false;
        self
    }

    pub fn set_log(&self, log: &str) {
        *self.log.lock().unwrap() = log.to_string();
    }

    pub fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    pub fn tails(&self) -> usize {
        self.tails.load(Ordering::SeqCst)
    }

    pub fn cancels(&self) -> usize {
        self.cancels.load(Ordering::SeqCst)
    }

    /// Cancel calls made after `start` had replied.
    pub fn cancels_after_start(&self) -> usize {
        self.cancels_after_start.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl OperationPort for ScriptedPort {
    async fn start(&self, _params: &Value) -> Result<StartReply, PortError> {
        if let Some(delay) = self.start_delay {
            tokio::time::sleep(delay).await;
        }
        self.start_returned.store(true, Ordering::SeqCst);
        self.start_reply.clone()
    }

    async fn query_progress(&self) -> Result<ProgressReply, PortError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        let in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(in_flight, Ordering::SeqCst);
        if let Some(delay) = self.query_delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let mut replies = self.replies.lock().unwrap();
        if replies.len() > 1 {
            replies.pop_front().unwrap()
        } else {
            replies
                .front()
                .cloned()
                .unwrap_or_else(|| Ok(running(None, "working")))
        }
    }

    async fn tail_log(&self, _max_lines: usize) -> Result<LogReply, PortError> {
        self.tails.fetch_add(1, Ordering::SeqCst);
        if !self.log_tail {
            return Err(PortError::Unsupported("log tail"));
        }
        Ok(LogReply {
            status: ReplyStatus::Success,
            log: self.log.lock().unwrap().clone(),
        })
    }

    async fn cancel(&self) -> Result<(), PortError> {
        self.cancels.fetch_add(1, Ordering::SeqCst);
        if self.start_returned.load(Ordering::SeqCst) {
            self.cancels_after_start.fetch_add(1, Ordering::SeqCst);
        }
        self.cancel_result.clone()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Recorded {
    Progress(ProgressSnapshot),
    Terminal(TerminalStatus, Option<String>),
}

#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<Recorded>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<Recorded> {
        self.events.lock().unwrap().clone()
    }

    pub fn progress(&self) -> Vec<ProgressSnapshot> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                Recorded::Progress(snapshot) => Some(snapshot),
                Recorded::Terminal(..) => None,
            })
            .collect()
    }

    pub fn terminals(&self) -> Vec<(TerminalStatus, Option<String>)> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                Recorded::Terminal(status, message) => Some((status, message)),
                Recorded::Progress(_) => None,
            })
            .collect()
    }
}

impl ProgressSink for RecordingSink {
    fn on_progress(&self, snapshot: &ProgressSnapshot) {
        self.events
            .lock()
            .unwrap()
            .push(Recorded::Progress(snapshot.clone()));
    }

    fn on_terminal(&self, status: TerminalStatus, message: Option<&str>) {
        self.events
            .lock()
            .unwrap()
            .push(Recorded::Terminal(status, message.map(ToOwned::to_owned)));
    }
}

pub fn controller(
    kind: OperationKind,
    port: &Arc<ScriptedPort>,
    sink: &Arc<RecordingSink>,
) -> OperationController {
    OperationController::new(
        kind,
        port.clone(),
        sink.clone(),
        PollSettings::for_kind(kind),
    )
}

pub fn running(percentage: Option<f64>, message: &str) -> ProgressReply {
    ProgressReply::success(BackendProgress {
        percentage,
        message: Some(message.to_string()),
        ..BackendProgress::default()
    })
}

pub fn downloading(bytes: u64, total: u64, elapsed: f64) -> ProgressReply {
    ProgressReply::success(BackendProgress {
        bytes_downloaded: Some(bytes),
        total_bytes: Some(total),
        elapsed_time: Some(elapsed),
        ..BackendProgress::default()
    })
}

pub fn completed(message: &str) -> ProgressReply {
    ProgressReply::success(BackendProgress {
        completed: Some(true),
        message: Some(message.to_string()),
        ..BackendProgress::default()
    })
}

pub fn backend_error(error: &str) -> ProgressReply {
    ProgressReply::success(BackendProgress {
        error: Some(error.to_string()),
        ..BackendProgress::default()
    })
}

/// Advances the paused clock; spawned pollers run at each tick boundary.
pub async fn advance(millis: u64) {
    tokio::time::sleep(Duration::from_millis(millis)).await;
}
