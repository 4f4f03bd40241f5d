//! `OperationPort` over a child process.
//!
//! The child receives its start parameters as JSON in [`PARAMS_ENV`] and
//! reports structured progress by printing `[STATUS] {json}` lines, where the
//! JSON is a [`BackendProgress`]. Every other output line is kept as log text.

use std::collections::VecDeque;
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use opwatch_logging::{watch_debug, watch_info, watch_warn};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};

use crate::{
    BackendProgress, LogReply, OperationPort, PortError, ProgressReply, ReplyStatus, StartReply,
};

pub const PARAMS_ENV: &str = "OPWATCH_PARAMS";
pub const STATUS_TAG: &str = "[STATUS]";
const DEFAULT_MAX_LOG_LINES: usize = 1000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl ProcessCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stream {
    Stdout,
    Stderr,
}

#[derive(Default)]
struct ProcessState {
    /// Bumped on every spawn so readers of an older child stop recording.
    generation: u64,
    child: Option<Child>,
    exit: Option<ExitStatus>,
    open_streams: u8,
    log: VecDeque<String>,
    last_status: Option<BackendProgress>,
    last_stderr: Option<String>,
}

impl ProcessState {
    fn record(&mut self, line: String, stream: Stream, max_lines: usize) {
        if stream == Stream::Stdout {
            if let Some(payload) = line.trim_start().strip_prefix(STATUS_TAG) {
                match serde_json::from_str::<BackendProgress>(payload.trim()) {
                    Ok(progress) => self.last_status = Some(progress),
                    Err(err) => watch_warn!("ignoring malformed status line: {err}"),
                }
                return;
            }
        } else if !line.trim().is_empty() {
            self.last_stderr = Some(line.trim().to_string());
        }

        if self.log.len() == max_lines {
            self.log.pop_front();
        }
        self.log.push_back(line);
    }

    fn refresh_exit(&mut self) -> Result<(), PortError> {
        if self.exit.is_some() {
            return Ok(());
        }
        if let Some(child) = self.child.as_mut() {
            self.exit = child
                .try_wait()
                .map_err(|err| PortError::Transport(err.to_string()))?;
        }
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.child.is_some() && self.exit.is_none()
    }
}

/// Runs the backend as a child process and reads its progress from stdout.
pub struct ProcessPort {
    command: ProcessCommand,
    max_log_lines: usize,
    state: Arc<Mutex<ProcessState>>,
}

impl ProcessPort {
    pub fn new(command: ProcessCommand) -> Self {
        Self::with_max_log_lines(command, DEFAULT_MAX_LOG_LINES)
    }

    pub fn with_max_log_lines(command: ProcessCommand, max_log_lines: usize) -> Self {
        Self {
            command,
            max_log_lines: max_log_lines.max(1),
            state: Arc::new(Mutex::new(ProcessState::default())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ProcessState> {
        lock_state(&self.state)
    }

    fn spawn_reader<R>(&self, reader: R, stream: Stream, generation: u64)
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let state = Arc::clone(&self.state);
        let max_lines = self.max_log_lines;
        tokio::spawn(async move {
            let mut reader = BufReader::new(reader);
            let mut buf = Vec::new();
            loop {
                buf.clear();
                match reader.read_until(b'\n', &mut buf).await {
                    Ok(0) => break,
                    Ok(_) => {}
                    Err(err) => {
                        watch_warn!("backend {stream:?} read failed: {err}");
                        break;
                    }
                }
                // Backend output is not guaranteed to be UTF-8.
                let line = decode_line(&buf);
                let mut guard = lock_state(&state);
                if guard.generation != generation {
                    return;
                }
                guard.record(line, stream, max_lines);
            }
            let mut guard = lock_state(&state);
            if guard.generation == generation {
                guard.open_streams = guard.open_streams.saturating_sub(1);
            }
        });
    }
}

fn decode_line(raw: &[u8]) -> String {
    let raw = raw.strip_suffix(b"\n").unwrap_or(raw);
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    String::from_utf8_lossy(raw).into_owned()
}

fn lock_state(state: &Mutex<ProcessState>) -> MutexGuard<'_, ProcessState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

#[async_trait::async_trait]
impl OperationPort for ProcessPort {
    async fn start(&self, params: &Value) -> Result<StartReply, PortError> {
        {
            let mut state = self.lock();
            state.refresh_exit()?;
            if state.is_running() {
                return Ok(StartReply {
                    status: ReplyStatus::Error,
                    message: Some("backend process is already running".to_string()),
                });
            }
        }

        let mut command = Command::new(&self.command.program);
        command
            .args(&self.command.args)
            .env(PARAMS_ENV, params.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = command.spawn().map_err(|err| {
            PortError::Transport(format!("failed to spawn {}: {err}", self.command.program))
        })?;
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let generation = {
            let mut state = self.lock();
            let generation = state.generation + 1;
            *state = ProcessState {
                generation,
                child: Some(child),
                open_streams: u8::from(stdout.is_some()) + u8::from(stderr.is_some()),
                ..ProcessState::default()
            };
            generation
        };

        if let Some(stdout) = stdout {
            self.spawn_reader(stdout, Stream::Stdout, generation);
        }
        if let Some(stderr) = stderr {
            self.spawn_reader(stderr, Stream::Stderr, generation);
        }

        watch_info!("spawned backend {}", self.command.program);
        Ok(StartReply {
            status: ReplyStatus::Started,
            message: Some(format!("{} started", self.command.program)),
        })
    }

    async fn query_progress(&self) -> Result<ProgressReply, PortError> {
        let mut state = self.lock();
        if state.child.is_none() {
            return Err(PortError::Transport(
                "backend process has not been started".to_string(),
            ));
        }
        state.refresh_exit()?;

        let mut progress = state.last_status.clone().unwrap_or_default();
        // Exit is only final once both pipes are drained; otherwise the last
        // status lines could still be in flight.
        if state.open_streams == 0 {
            match state.exit {
                Some(status) if status.success() => progress.completed = Some(true),
                Some(status) => {
                    if progress.error.is_none() {
                        progress.error = Some(
                            state
                                .last_stderr
                                .clone()
                                .unwrap_or_else(|| format!("backend exited with {status}")),
                        );
                    }
                }
                None => {}
            }
        }

        Ok(ProgressReply::success(progress))
    }

    async fn tail_log(&self, max_lines: usize) -> Result<LogReply, PortError> {
        let state = self.lock();
        let skip = state.log.len().saturating_sub(max_lines);
        let log = state
            .log
            .iter()
            .skip(skip)
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join("\n");
        Ok(LogReply {
            status: ReplyStatus::Success,
            log,
        })
    }

    async fn cancel(&self) -> Result<(), PortError> {
        let mut state = self.lock();
        state.refresh_exit()?;
        if !state.is_running() {
            watch_debug!("cancel requested with no running backend");
            return Ok(());
        }
        if let Some(child) = state.child.as_mut() {
            child
                .start_kill()
                .map_err(|err| PortError::Transport(err.to_string()))?;
        }
        Ok(())
    }
}
