mod config;
mod console;

use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use opwatch_core::{OperationKind, SessionStatus};
use opwatch_engine::{OperationController, ProcessPort, StartOutcome};
use opwatch_logging::{watch_error, watch_info, watch_warn};
use tokio::task::JoinSet;

use crate::config::{AppConfig, DEFAULT_CONFIG_FILE};
use crate::console::ConsoleSink;

fn main() -> anyhow::Result<()> {
    let path = env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
    let loaded = config::load(&path)?;
    let found = loaded.is_some();
    let config = loaded.unwrap_or_default();

    if !opwatch_logging::initialize(config.log_destination(), config.log_level()) {
        eprintln!("opwatch: logging could not be initialized");
    }
    if !found {
        watch_info!("No config at {}, using defaults", path.display());
    }

    let runtime = tokio::runtime::Runtime::new().context("failed to start the tokio runtime")?;
    runtime.block_on(run(&path, config))
}

async fn run(path: &Path, config: AppConfig) -> anyhow::Result<()> {
    let mut running = Vec::new();
    let mut failed = Vec::new();

    for kind in OperationKind::ALL {
        let Some(operation) = config.operation(kind) else {
            continue;
        };
        let controller = OperationController::new(
            kind,
            Arc::new(ProcessPort::new(operation.process_command())),
            Arc::new(ConsoleSink::new(kind)),
            operation.poll_settings(kind),
        );

        match controller.start(&operation.params_json()).await {
            StartOutcome::Started(id) => {
                watch_info!("{} started", id);
                running.push(controller);
            }
            StartOutcome::Failed { id, message } => {
                watch_error!("{} failed to start: {}", id, message);
                failed.push(kind);
            }
            StartOutcome::AlreadyRunning(id) | StartOutcome::Cancelled(id) => {
                watch_warn!("{} did not start", id);
            }
        }
    }

    if running.is_empty() && failed.is_empty() {
        bail!("no operations configured in {}", path.display());
    }

    let mut finished = JoinSet::new();
    for controller in &running {
        let controller = controller.clone();
        finished.spawn(async move { (controller.kind(), controller.wait_until_finished().await) });
    }

    let mut interrupted = false;
    loop {
        tokio::select! {
            joined = finished.join_next() => match joined {
                Some(Ok((kind, status))) => {
                    watch_info!("{} finished: {:?}", kind, status);
                    if status == SessionStatus::Failed {
                        failed.push(kind);
                    }
                }
                Some(Err(err)) => return Err(err).context("monitor task panicked"),
                None => break,
            },
            signal = tokio::signal::ctrl_c(), if !interrupted => {
                interrupted = true;
                match signal {
                    Ok(()) => {
                        watch_info!("Interrupted, cancelling running operations");
                        for controller in &running {
                            controller.cancel();
                        }
                    }
                    Err(err) => watch_warn!("Ctrl-C handler unavailable: {}", err),
                }
            }
        }
    }

    if !failed.is_empty() {
        let names: Vec<String> = failed.iter().map(ToString::to_string).collect();
        bail!("operation failed: {}", names.join(", "));
    }
    Ok(())
}
