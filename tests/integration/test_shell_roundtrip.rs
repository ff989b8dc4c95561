//! Integration Tests for Real Shell Round Trips
//!
//! These tests drive a real shell through the PTY host: keystrokes in,
//! echoed output back, exit codes from the actual process. They bail
//! out quietly on machines where no PTY can be opened.

use shellgate::{InterceptOutcome, Session, SessionConfig, SessionStatus, TerminalEngine};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

const DEADLINE: Duration = Duration::from_secs(10);

fn shell_binary() -> &'static str {
    if cfg!(windows) {
        "cmd.exe"
    } else {
        "/bin/sh"
    }
}

/// Spawn a real shell session, or None where PTYs are unavailable
async fn spawn_shell(engine: &TerminalEngine) -> Option<Session> {
    let config = SessionConfig::for_shell(shell_binary())
        .with_working_directory(std::env::temp_dir());
    match engine.create_session(config).await {
        Ok(session) => Some(session),
        Err(e) => {
            eprintln!("skipping: no usable PTY here ({})", e);
            None
        }
    }
}

/// Poll a predicate until it holds or the deadline passes
async fn wait_until(mut check: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < DEADLINE {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    false
}

/// Poll until the session shows as exited
async fn wait_for_exit(engine: &TerminalEngine, session_id: &str) -> Option<SessionStatus> {
    let start = Instant::now();
    while start.elapsed() < DEADLINE {
        match engine.get_session(session_id).await {
            Ok(session) if !session.is_running() => return Some(session.status),
            Ok(_) => tokio::time::sleep(Duration::from_millis(25)).await,
            Err(_) => return None,
        }
    }
    None
}

#[tokio::test]
async fn test_echo_round_trip_records_history() {
    let engine = TerminalEngine::new();
    let Some(session) = spawn_shell(&engine).await else {
        return;
    };

    let transcript = Arc::new(Mutex::new(String::new()));
    let sink = transcript.clone();
    let _sub = engine
        .subscribe(&session.id, move |chunk| {
            sink.lock().unwrap().push_str(&chunk.content);
        })
        .await
        .unwrap();

    engine
        .send_input(&session.id, "echo shellgate_ping\n")
        .await
        .unwrap();

    let seen = {
        let transcript = transcript.clone();
        wait_until(move || transcript.lock().unwrap().contains("shellgate_ping")).await
    };
    assert!(seen, "shell output never arrived");

    // Ending the session finalizes both commands
    engine.send_input(&session.id, "exit\n").await.unwrap();
    assert!(wait_for_exit(&engine, &session.id).await.is_some());

    let entries = engine.history_all().await;
    let echo_entry = entries
        .iter()
        .find(|e| e.command == "echo shellgate_ping")
        .expect("echo command should be in history");
    assert!(echo_entry.captured_output.contains("shellgate_ping"));

    engine.shutdown().await;
}

#[tokio::test]
async fn test_exit_code_is_reported_by_the_host() {
    if cfg!(windows) {
        // cmd.exe's `exit 7` code reporting via ConPTY is unreliable
        return;
    }
    let engine = TerminalEngine::new();
    let Some(session) = spawn_shell(&engine).await else {
        return;
    };

    engine.send_input(&session.id, "exit 7\n").await.unwrap();

    let status = wait_for_exit(&engine, &session.id).await;
    assert_eq!(status, Some(SessionStatus::Exited(Some(7))));

    let entries = engine.history_all().await;
    let exit_entry = entries
        .iter()
        .find(|e| e.command == "exit 7")
        .expect("exit command should be in history");
    assert_eq!(exit_entry.exit_code, Some(7));

    engine.shutdown().await;
}

#[tokio::test]
async fn test_intercepted_command_never_runs_in_the_shell() {
    let engine = TerminalEngine::new();
    engine
        .add_interceptor(r"^touch\s+/tmp/shellgate_forbidden", |_cmd, _session| async move {
            Ok(InterceptOutcome::Intercepted("file creation blocked".to_string()))
        })
        .await
        .unwrap();
    let Some(session) = spawn_shell(&engine).await else {
        return;
    };

    let transcript = Arc::new(Mutex::new(String::new()));
    let sink = transcript.clone();
    let _sub = engine
        .subscribe(&session.id, move |chunk| {
            sink.lock().unwrap().push_str(&chunk.content);
        })
        .await
        .unwrap();

    // The whole fragment is suppressed; the shell sees nothing, so it
    // echoes nothing
    engine
        .send_input(&session.id, "touch /tmp/shellgate_forbidden\n")
        .await
        .unwrap();

    // A follow-up command proves the session is still healthy
    engine
        .send_input(&session.id, "echo still_alive\n")
        .await
        .unwrap();
    let alive = {
        let transcript = transcript.clone();
        wait_until(move || transcript.lock().unwrap().contains("still_alive")).await
    };
    assert!(alive, "session should keep working after an interception");
    assert!(
        !transcript.lock().unwrap().contains("touch /tmp/shellgate_forbidden"),
        "suppressed command must not be echoed by the shell"
    );

    let intercepted: Vec<_> = engine
        .history_all()
        .await
        .into_iter()
        .filter(|e| e.intercepted)
        .collect();
    assert_eq!(intercepted.len(), 1);
    assert_eq!(intercepted[0].captured_output, "file creation blocked");

    engine.shutdown().await;
}

#[tokio::test]
async fn test_kill_tears_down_a_live_shell() {
    let engine = TerminalEngine::new();
    let Some(session) = spawn_shell(&engine).await else {
        return;
    };

    engine.kill_session(&session.id).await.unwrap();

    assert!(engine.get_session(&session.id).await.is_err());
    assert!(engine.list_sessions().await.is_empty());

    // Killing again stays quiet
    assert!(engine.kill_session(&session.id).await.is_ok());
}

#[tokio::test]
async fn test_resize_survives_a_real_session() {
    let engine = TerminalEngine::new();
    let Some(session) = spawn_shell(&engine).await else {
        return;
    };

    engine.resize(&session.id, 132, 43).await.unwrap();
    let session = engine.get_session(&session.id).await.unwrap();
    assert_eq!((session.size.cols, session.size.rows), (132, 43));

    engine.shutdown().await;
}
