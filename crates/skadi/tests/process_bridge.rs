use std::time::Duration;

use pretty_assertions::assert_eq;
use skadi::{CommandDescriptor, ProcessBridge, ProcessError, StreamEvent, SystemProcessBridge};
use tokio::sync::mpsc;

fn sh(script: &str) -> CommandDescriptor {
    CommandDescriptor::polling("sh", ["-c", script])
}

fn collect_events(descriptor: &CommandDescriptor) -> (skadi::StreamHandle, mpsc::UnboundedReceiver<StreamEvent>) {
    let (send, recv) = mpsc::unbounded_channel();
    let handle = SystemProcessBridge
        .spawn_stream(
            descriptor,
            Box::new(move |event| {
                let _ = send.send(event);
            }),
        )
        .unwrap();
    (handle, recv)
}

async fn next_event(recv: &mut mpsc::UnboundedReceiver<StreamEvent>) -> StreamEvent {
    tokio::time::timeout(Duration::from_secs(5), recv.recv()).await.expect("timed out waiting for stream event").unwrap()
}

#[tokio::test]
async fn run_once_captures_stdout() {
    let output = SystemProcessBridge.run_once(&CommandDescriptor::one_shot("sh", ["-c", "echo hello; echo world"])).await.unwrap();
    assert_eq!(output, "hello\nworld\n");
}

#[tokio::test]
async fn run_once_reports_exit_code() {
    let result = SystemProcessBridge.run_once(&CommandDescriptor::one_shot("sh", ["-c", "echo oops >&2; exit 3"])).await;
    match result {
        Err(ProcessError::NonZeroExit { code, stderr, .. }) => {
            assert_eq!(code, Some(3));
            assert_eq!(stderr, "oops");
        }
        other => panic!("expected non-zero exit, got {:?}", other),
    }
}

#[tokio::test]
async fn run_once_reports_spawn_failure() {
    let result = SystemProcessBridge.run_once(&CommandDescriptor::one_shot("/nonexistent/skadi-backend", Vec::<String>::new())).await;
    assert!(matches!(result, Err(ProcessError::SpawnFailed { .. })));
}

#[tokio::test]
async fn stream_delivers_lines_then_reports_exit() {
    let (_handle, mut events) = collect_events(&sh(r#"printf '{"op": 5, "data": {"volume": 1}}\r\n'; echo second"#));

    match next_event(&mut events).await {
        StreamEvent::Line(line) => assert_eq!(line, br#"{"op": 5, "data": {"volume": 1}}"#.to_vec()),
        other => panic!("expected a line, got {:?}", other),
    }
    match next_event(&mut events).await {
        StreamEvent::Line(line) => assert_eq!(line, b"second".to_vec()),
        other => panic!("expected a line, got {:?}", other),
    }
    match next_event(&mut events).await {
        StreamEvent::Exited(ProcessError::UnexpectedEof { command, .. }) => assert!(command.starts_with("sh -c")),
        other => panic!("expected the stream to end, got {:?}", other),
    }
}

#[tokio::test]
async fn shutdown_terminates_stream() {
    let (handle, mut events) = collect_events(&sh("echo ready; while true; do sleep 1; done"));
    assert!(matches!(next_event(&mut events).await, StreamEvent::Line(_)));

    tokio::time::timeout(Duration::from_secs(5), handle.shutdown()).await.expect("stream did not terminate");
    // a torn down stream does not report an unexpected exit
    assert!(events.recv().await.is_none());
}
