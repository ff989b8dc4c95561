//! Contract Tests for Command Interception
//!
//! These tests define the expected behavior of interceptor rules at a
//! command boundary: a claimed command never reaches the host, partial
//! typing always does, and intercepted commands still land in history.

use shellgate::{
    EngineConfig, InterceptOutcome, MockProcessHost, ResolutionMethod, SessionConfig,
    TerminalEngine,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn engine_with_mock() -> (TerminalEngine, Arc<MockProcessHost>) {
    let host = Arc::new(MockProcessHost::new());
    let engine = TerminalEngine::with_host(EngineConfig::default(), host.clone());
    (engine, host)
}

// Test that a matched command is suppressed entirely
#[tokio::test]
async fn test_intercepted_command_never_reaches_host() {
    // Arrange
    let (engine, host) = engine_with_mock();
    engine
        .add_interceptor(r"^rm\s+-rf", |cmd, _session| async move {
            Ok(InterceptOutcome::Intercepted(format!("blocked: {}", cmd)))
        })
        .await
        .unwrap();
    let session = engine.create_session(SessionConfig::default()).await.unwrap();

    // Act
    engine.send_input(&session.id, "rm -rf /tmp/scratch\n").await.unwrap();

    // Assert: the whole fragment was suppressed, terminator included
    assert_eq!(host.written_text(&session.id).await, "");
}

// Test that the intercepted command is recorded in history
#[tokio::test]
async fn test_intercepted_command_lands_in_history() {
    let (engine, _host) = engine_with_mock();
    engine
        .add_interceptor("^deploy", |_cmd, _session| async move {
            Ok(InterceptOutcome::Intercepted("use the CI pipeline".to_string()))
        })
        .await
        .unwrap();
    let session = engine.create_session(SessionConfig::default()).await.unwrap();

    engine.send_input(&session.id, "deploy prod\n").await.unwrap();

    let entries = engine.history_all().await;
    assert_eq!(entries.len(), 1);
    let entry = &entries[0];
    assert_eq!(entry.command, "deploy prod");
    assert!(entry.intercepted);
    assert_eq!(entry.captured_output, "use the CI pipeline");
    assert_eq!(entry.exit_code, None);
    assert_eq!(entry.resolution_method, ResolutionMethod::Unknown);
}

// Test that partial typing forwards even when interception will follow
#[tokio::test]
async fn test_partial_typing_forwards_before_interception() {
    let (engine, host) = engine_with_mock();
    engine
        .add_interceptor(r"^rm\s", |_cmd, _session| async move {
            Ok(InterceptOutcome::Intercepted("no".to_string()))
        })
        .await
        .unwrap();
    let session = engine.create_session(SessionConfig::default()).await.unwrap();

    // Typed character by character, the shell must see every keystroke
    // for echo to work; only the terminator fragment is suppressed
    engine.send_input(&session.id, "rm ").await.unwrap();
    engine.send_input(&session.id, "-rf /tmp/x").await.unwrap();
    engine.send_input(&session.id, "\n").await.unwrap();

    assert_eq!(host.written_text(&session.id).await, "rm -rf /tmp/x");
}

// Test that non-matching commands forward verbatim
#[tokio::test]
async fn test_non_matching_command_forwards_verbatim() {
    let (engine, host) = engine_with_mock();
    engine
        .add_interceptor("^forbidden", |_cmd, _session| async move {
            Ok(InterceptOutcome::Intercepted("nope".to_string()))
        })
        .await
        .unwrap();
    let session = engine.create_session(SessionConfig::default()).await.unwrap();

    engine.send_input(&session.id, "ls -la\n").await.unwrap();

    assert_eq!(host.written_text(&session.id).await, "ls -la\n");
    // The forwarded command has a pending entry, not a finalized one
    assert!(engine.history_all().await.is_empty());
}

// Test that a declining handler lets later rules run
#[tokio::test]
async fn test_pass_through_continues_to_later_rules() {
    let (engine, host) = engine_with_mock();
    engine
        .add_interceptor(".*", |_cmd, _session| async move {
            Ok(InterceptOutcome::PassThrough)
        })
        .await
        .unwrap();
    engine
        .add_interceptor("^halt", |_cmd, _session| async move {
            Ok(InterceptOutcome::Intercepted("halted".to_string()))
        })
        .await
        .unwrap();
    let session = engine.create_session(SessionConfig::default()).await.unwrap();

    engine.send_input(&session.id, "halt now\n").await.unwrap();

    assert_eq!(host.written_text(&session.id).await, "");
    assert_eq!(engine.history_all().await[0].captured_output, "halted");
}

// Test that the first claiming rule wins
#[tokio::test]
async fn test_first_matching_rule_wins() {
    let (engine, _host) = engine_with_mock();
    let second_ran = Arc::new(AtomicUsize::new(0));

    engine
        .add_interceptor("^stop", |_cmd, _session| async move {
            Ok(InterceptOutcome::Intercepted("first".to_string()))
        })
        .await
        .unwrap();
    let counter = second_ran.clone();
    engine
        .add_interceptor("^stop", move |_cmd, _session| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(InterceptOutcome::Intercepted("second".to_string()))
            }
        })
        .await
        .unwrap();
    let session = engine.create_session(SessionConfig::default()).await.unwrap();

    engine.send_input(&session.id, "stop\n").await.unwrap();

    assert_eq!(engine.history_all().await[0].captured_output, "first");
    assert_eq!(second_ran.load(Ordering::SeqCst), 0);
}

// Test that a failing handler is treated as pass-through
#[tokio::test]
async fn test_failing_handler_forwards_the_command() {
    let (engine, host) = engine_with_mock();
    engine
        .add_interceptor("^fragile", |_cmd, _session| async move {
            Err(shellgate::Error::Other("handler bug".to_string()))
        })
        .await
        .unwrap();
    let session = engine.create_session(SessionConfig::default()).await.unwrap();

    let result = engine.send_input(&session.id, "fragile op\n").await;

    assert!(result.is_ok(), "Handler failure must not fail send_input");
    assert_eq!(host.written_text(&session.id).await, "fragile op\n");
}

// Test that a bare newline is not a command
#[tokio::test]
async fn test_empty_boundary_is_not_intercepted() {
    let (engine, host) = engine_with_mock();
    let ran = Arc::new(AtomicUsize::new(0));
    let counter = ran.clone();
    engine
        .add_interceptor(".*", move |_cmd, _session| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(InterceptOutcome::Intercepted("never".to_string()))
            }
        })
        .await
        .unwrap();
    let session = engine.create_session(SessionConfig::default()).await.unwrap();

    engine.send_input(&session.id, "\n").await.unwrap();

    // The keystroke still reaches the shell; no rule ran, no history
    assert_eq!(host.written_text(&session.id).await, "\n");
    assert_eq!(ran.load(Ordering::SeqCst), 0);
    assert!(engine.history_all().await.is_empty());
}

// Test that an intercepted boundary still closes the previous command
#[tokio::test]
async fn test_interception_finalizes_previous_pending_command() {
    let (engine, host) = engine_with_mock();
    engine
        .add_interceptor("^blocked", |_cmd, _session| async move {
            Ok(InterceptOutcome::Intercepted("denied".to_string()))
        })
        .await
        .unwrap();
    let session = engine.create_session(SessionConfig::default()).await.unwrap();

    engine.send_input(&session.id, "echo one\n").await.unwrap();
    host.emit_stdout(&session.id, "one\n").await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;

    engine.send_input(&session.id, "blocked\n").await.unwrap();

    let entries = engine.history_all().await;
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].command, "echo one");
    assert_eq!(
        entries[0].resolution_method,
        ResolutionMethod::HeuristicFromOutput
    );
    assert_eq!(entries[0].exit_code, Some(0));
    assert_eq!(entries[0].captured_output, "one\n");
    assert_eq!(entries[1].command, "blocked");
    assert!(entries[1].intercepted);
}

// Test per-session isolation of interception state
#[tokio::test]
async fn test_interception_is_per_command_not_per_session() {
    let (engine, host) = engine_with_mock();
    engine
        .add_interceptor("^secret", |_cmd, _session| async move {
            Ok(InterceptOutcome::Intercepted("hidden".to_string()))
        })
        .await
        .unwrap();
    let session = engine.create_session(SessionConfig::default()).await.unwrap();

    engine.send_input(&session.id, "secret\n").await.unwrap();
    engine.send_input(&session.id, "echo visible\n").await.unwrap();

    // Only the matched command was held back
    assert_eq!(host.written_text(&session.id).await, "echo visible\n");
}
