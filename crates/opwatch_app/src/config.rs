//! Application configuration, read from a RON file.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::LevelFilter;
use opwatch_core::OperationKind;
use opwatch_engine::{PollSettings, ProcessCommand};
use opwatch_logging::LogDestination;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_CONFIG_FILE: &str = "./opwatch.ron";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read {path:?}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("could not parse {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: ron::error::SpannedError,
    },
    #[error("invalid {kind} configuration: {reason}")]
    Invalid {
        kind: OperationKind,
        reason: &'static str,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub verbose: bool,
    /// Also write logs to `./opwatch.log`.
    pub log_to_file: bool,
    pub crawl: Option<OperationConfig>,
    pub download: Option<OperationConfig>,
}

/// How to launch and poll one backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationConfig {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// Passed to the backend as a JSON object.
    #[serde(default)]
    pub params: BTreeMap<String, String>,
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    #[serde(default = "default_log_tail_lines")]
    pub log_tail_lines: usize,
    /// Defaults to the per-kind window (60 samples for crawl, 30 for download).
    #[serde(default)]
    pub window_capacity: Option<usize>,
}

fn default_interval_ms() -> u64 {
    1000
}

fn default_log_tail_lines() -> usize {
    50
}

impl OperationConfig {
    pub fn process_command(&self) -> ProcessCommand {
        ProcessCommand {
            program: self.command.clone(),
            args: self.args.clone(),
        }
    }

    pub fn poll_settings(&self, kind: OperationKind) -> PollSettings {
        PollSettings {
            interval: Duration::from_millis(self.interval_ms),
            log_tail_lines: self.log_tail_lines,
            window_capacity: self
                .window_capacity
                .unwrap_or_else(|| kind.window_capacity()),
        }
    }

    pub fn params_json(&self) -> serde_json::Value {
        self.params
            .iter()
            .map(|(key, value)| (key.clone(), serde_json::Value::String(value.clone())))
            .collect::<serde_json::Map<_, _>>()
            .into()
    }

    fn validate(&self, kind: OperationKind) -> Result<(), ConfigError> {
        let invalid = |reason| Err(ConfigError::Invalid { kind, reason });
        if self.command.trim().is_empty() {
            return invalid("command is empty");
        }
        if self.interval_ms == 0 {
            return invalid("interval_ms must be positive");
        }
        if self.window_capacity == Some(0) {
            return invalid("window_capacity must be positive");
        }
        Ok(())
    }
}

impl AppConfig {
    pub fn operation(&self, kind: OperationKind) -> Option<&OperationConfig> {
        match kind {
            OperationKind::Crawl => self.crawl.as_ref(),
            OperationKind::Download => self.download.as_ref(),
        }
    }

    pub fn log_level(&self) -> LevelFilter {
        if self.verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        }
    }

    pub fn log_destination(&self) -> LogDestination {
        if self.log_to_file {
            LogDestination::Both(PathBuf::from(opwatch_logging::DEFAULT_LOG_FILE))
        } else {
            LogDestination::Terminal
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for kind in OperationKind::ALL {
            if let Some(operation) = self.operation(kind) {
                operation.validate(kind)?;
            }
        }
        Ok(())
    }
}

/// Loads and validates the config at `path`. `Ok(None)` means there is no file.
pub fn load(path: &Path) -> Result<Option<AppConfig>, ConfigError> {
    let content = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    let config: AppConfig = ron::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    config.validate()?;
    Ok(Some(config))
}
