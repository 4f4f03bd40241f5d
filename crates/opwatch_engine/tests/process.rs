#![cfg(unix)]

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{init_logging, RecordingSink};
use opwatch_core::{OperationKind, SessionStatus, TerminalStatus};
use opwatch_engine::{
    OperationController, OperationPort, PollSettings, PortError, ProcessCommand, ProcessPort,
    ProgressReply, ReplyStatus, StartOutcome,
};
use serde_json::{json, Value};

fn shell(script: &str) -> ProcessPort {
    ProcessPort::new(ProcessCommand::new("sh").arg("-c").arg(script))
}

/// Polls the port until the child has exited and its output is drained.
async fn final_reply(port: &ProcessPort) -> ProgressReply {
    for _ in 0..200 {
        let reply = port.query_progress().await.expect("query");
        let progress = reply.progress.clone().unwrap_or_default();
        if progress.completed == Some(true) || progress.error.is_some() {
            return reply;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    panic!("backend process did not finish");
}

#[tokio::test]
async fn query_before_start_is_a_transport_error() {
    let port = shell("true");
    let err = port.query_progress().await.unwrap_err();
    assert!(matches!(err, PortError::Transport(_)));
}

#[tokio::test]
async fn status_lines_and_log_are_captured() {
    init_logging();
    let port = shell(
        r#"echo 'booting'
echo '[STATUS] {"percent": 40, "message": "Crawling Landsat"}'
echo '[PROGRESS] 4/10 datasets processed | 1/2 satellites | Elapsed: 2s'"#,
    );

    let reply = port.start(&Value::Null).await.expect("spawn");
    assert_eq!(reply.status, ReplyStatus::Started);

    let reply = final_reply(&port).await;
    let progress = reply.progress.expect("progress");
    assert_eq!(progress.percentage, Some(40.0));
    assert_eq!(progress.message.as_deref(), Some("Crawling Landsat"));
    assert_eq!(progress.completed, Some(true));

    let log = port.tail_log(10).await.expect("tail").log;
    assert_eq!(
        log,
        "booting\n[PROGRESS] 4/10 datasets processed | 1/2 satellites | Elapsed: 2s"
    );
    assert_eq!(port.tail_log(1).await.expect("tail").log.lines().count(), 1);
}

#[tokio::test]
async fn non_utf8_output_does_not_break_the_run() {
    init_logging();
    let port = shell(
        r#"printf 'tile caf\351.tif\r\n'
sleep 0.3
echo 'line 1'
echo 'line 2'
exit 0"#,
    );
    port.start(&Value::Null).await.expect("spawn");

    let progress = final_reply(&port).await.progress.expect("progress");
    assert_eq!(progress.completed, Some(true));
    assert_eq!(progress.error, None);

    let log = port.tail_log(10).await.expect("tail").log;
    assert_eq!(log, "tile caf\u{FFFD}.tif\nline 1\nline 2");
}

#[tokio::test]
async fn params_are_passed_as_json() {
    let port = shell(r#"printf '%s\n' "$OPWATCH_PARAMS""#);
    port.start(&json!({"region": "alps"})).await.expect("spawn");

    final_reply(&port).await;
    let log = port.tail_log(5).await.expect("tail").log;
    assert_eq!(log, r#"{"region":"alps"}"#);
}

#[tokio::test]
async fn nonzero_exit_reports_last_stderr_line() {
    let port = shell("echo 'starting'; echo 'token expired' >&2; exit 3");
    port.start(&Value::Null).await.expect("spawn");

    let progress = final_reply(&port).await.progress.expect("progress");
    assert_eq!(progress.error.as_deref(), Some("token expired"));
    assert_eq!(progress.completed, None);
}

#[tokio::test]
async fn missing_program_fails_to_start() {
    let port = ProcessPort::new(ProcessCommand::new("/nonexistent/opwatch-backend"));
    let err = port.start(&Value::Null).await.unwrap_err();
    assert!(matches!(err, PortError::Transport(message) if message.contains("failed to spawn")));
}

#[tokio::test]
async fn cancel_kills_the_child() {
    let port = shell("sleep 30");
    port.start(&Value::Null).await.expect("spawn");
    port.cancel().await.expect("cancel");

    let progress = final_reply(&port).await.progress.expect("progress");
    assert!(progress.error.is_some());
}

#[tokio::test]
async fn controller_drives_a_real_process_to_completion() {
    init_logging();
    let port = Arc::new(shell(
        r#"echo '[STATUS] {"message": "Crawling"}'
echo '[PROGRESS] 5/10 datasets processed | 1/2 satellites | Elapsed: 1s'
sleep 0.2"#,
    ));
    let sink = Arc::new(RecordingSink::default());
    let controller = OperationController::new(
        OperationKind::Crawl,
        port,
        sink.clone(),
        PollSettings {
            interval: Duration::from_millis(20),
            ..PollSettings::for_kind(OperationKind::Crawl)
        },
    );

    assert!(matches!(
        controller.start(&Value::Null).await,
        StartOutcome::Started(_)
    ));
    let status = tokio::time::timeout(Duration::from_secs(10), controller.wait_until_finished())
        .await
        .expect("finished in time");

    assert_eq!(status, SessionStatus::Completed);
    let terminals = sink.terminals();
    assert_eq!(terminals.len(), 1);
    assert_eq!(terminals[0].0, TerminalStatus::Completed);
    assert!(sink
        .progress()
        .iter()
        .any(|snapshot| snapshot.current_units == Some(5)));
}
