mod common;

use common::FakeBridge;
use pretty_assertions::assert_eq;
use skadi::{CommandDescriptor, CommandDispatcher, Invocation, Invoked, ProcessError};

#[tokio::test]
async fn exec_returns_output() {
    let bridge = FakeBridge::new();
    let query = CommandDescriptor::one_shot("hyprctl", ["activeworkspace", "-j"]);
    bridge.set_output(query.clone(), r#"{"id": 2}"#);
    let dispatcher = CommandDispatcher::new(bridge.clone());

    assert_eq!(dispatcher.exec(&query).await.unwrap(), r#"{"id": 2}"#);
    assert_eq!(bridge.runs(), vec![query]);
}

#[tokio::test]
async fn exec_reports_non_zero_exit() {
    let bridge = FakeBridge::new();
    let query = CommandDescriptor::one_shot("pactl", ["get-sink-volume", "@DEFAULT_SINK@"]);
    bridge.set_exit_code(query.clone(), 1);
    let dispatcher = CommandDispatcher::new(bridge.clone());

    match dispatcher.exec(&query).await {
        Err(ProcessError::NonZeroExit { code, .. }) => assert_eq!(code, Some(1)),
        other => panic!("expected non-zero exit, got {:?}", other),
    }
}

#[tokio::test]
async fn invoke_by_mode() {
    let bridge = FakeBridge::new();
    let dispatcher = CommandDispatcher::new(bridge.clone());

    let resolving = CommandDescriptor::one_shot("echo", ["hi"]);
    bridge.set_output(resolving.clone(), "hi\n");
    match dispatcher.invoke(Invocation::resolving(resolving)).await.unwrap() {
        Invoked::Output(output) => assert_eq!(output, "hi\n"),
        other => panic!("expected output, got {:?}", other),
    }

    let detached = CommandDescriptor::one_shot("wlogout", Vec::<String>::new());
    assert!(matches!(dispatcher.invoke(Invocation::detached(detached.clone())).await.unwrap(), Invoked::Detached));
    assert!(bridge.runs().contains(&detached));

    let polling = CommandDescriptor::polling("skadi-backend", ["--sysinfo-poll-interval", "2"]);
    let handle = match dispatcher.invoke(Invocation::resolving(polling.clone())).await.unwrap() {
        Invoked::Listening(handle) => handle,
        other => panic!("expected a subscription, got {:?}", other),
    };
    dispatcher.registry().stats().await;
    assert_eq!(bridge.spawned(), vec![polling]);

    handle.unsubscribe();
    dispatcher.registry().stats().await;
    assert_eq!(bridge.terminated_count(), 1);
}

#[tokio::test]
async fn fire_and_forget_swallows_failures() {
    let bridge = FakeBridge::new();
    bridge.fail_spawns_of("playerctl");
    let dispatcher = CommandDispatcher::new(bridge.clone());

    let command = CommandDescriptor::one_shot("playerctl", ["--player=spotify", "next"]);
    dispatcher.fire(command.clone()).await.unwrap();
    assert_eq!(bridge.runs(), vec![command]);
}
