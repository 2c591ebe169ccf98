//! Basic CLI E2E tests.
//!
//! Each test runs the built binary against its own data directory.

use std::io::{Read, Write};
use std::path::Path;
use std::process::{Command, Stdio};

use serde_json::{json, Value};

/// Run a CLI command and return (exit code, stdout, stderr).
fn run_cli(home: &Path, args: &[&str]) -> (i32, String, String) {
    let output = Command::new(env!("CARGO_BIN_EXE_pomoguard"))
        .env("POMOGUARD_HOME", home)
        .env_remove("RUST_LOG")
        .arg("--no-notify")
        .args(args)
        .output()
        .expect("Failed to execute CLI command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);

    (code, stdout, stderr)
}

fn run_json(home: &Path, args: &[&str]) -> Value {
    let (code, stdout, stderr) = run_cli(home, args);
    assert_eq!(code, 0, "{args:?} failed: {stderr}");
    serde_json::from_str(&stdout).unwrap_or_else(|e| panic!("{args:?} printed {stdout:?}: {e}"))
}

#[test]
fn test_status_starts_idle() {
    let home = tempfile::tempdir().unwrap();
    let view = run_json(home.path(), &["timer", "status"]);
    assert_eq!(view["phase"], "idle");
    assert_eq!(view["running"], false);
    assert_eq!(view["remainingMs"], 0);
}

#[test]
fn test_timer_lifecycle() {
    let home = tempfile::tempdir().unwrap();

    let started = run_json(home.path(), &["timer", "start"]);
    assert_eq!(started["type"], "PhaseStarted");
    assert_eq!(started["phase"], "focus");

    let view = run_json(home.path(), &["timer", "status"]);
    assert_eq!(view["phase"], "focus");
    assert_eq!(view["running"], true);
    assert_eq!(view["totalMs"], 1_500_000);

    let paused = run_json(home.path(), &["timer", "pause"]);
    assert_eq!(paused["type"], "TimerPaused");
    let view = run_json(home.path(), &["timer", "status"]);
    assert_eq!(view["paused"], true);

    // A second pause is a no-op, not an error.
    let (code, stdout, _) = run_cli(home.path(), &["timer", "pause"]);
    assert_eq!(code, 0);
    assert!(stdout.is_empty());

    let resumed = run_json(home.path(), &["timer", "resume"]);
    assert_eq!(resumed["type"], "TimerResumed");

    let stopped = run_json(home.path(), &["timer", "stop"]);
    assert_eq!(stopped["type"], "TimerStopped");
    let view = run_json(home.path(), &["timer", "status"]);
    assert_eq!(view["phase"], "idle");
}

#[test]
fn test_skip_moves_to_break_and_records_history() {
    let home = tempfile::tempdir().unwrap();
    run_json(home.path(), &["timer", "start"]);

    let skipped = run_json(home.path(), &["timer", "skip"]);
    assert_eq!(skipped["type"], "PhaseSkipped");
    assert_eq!(skipped["next"], "short");

    let history = run_json(home.path(), &["history", "list", "--json"]);
    let entries = history.as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["phase"], "focus");

    let current = run_json(home.path(), &["history", "list", "--current", "--json"]);
    assert_eq!(current.as_array().unwrap().len(), 1);

    let stats = run_json(home.path(), &["history", "stats", "--today"]);
    assert_eq!(stats["focusSessions"], 1);
    assert_eq!(stats["queues"], 1);
}

#[test]
fn test_start_specific_phase() {
    let home = tempfile::tempdir().unwrap();
    let started = run_json(home.path(), &["timer", "start", "--phase", "long"]);
    assert_eq!(started["phase"], "long");

    let (code, _, stderr) = run_cli(home.path(), &["timer", "start", "--phase", "lunch"]);
    assert_ne!(code, 0);
    assert!(stderr.contains("lunch"));
}

#[test]
fn test_timer_configure() {
    let home = tempfile::tempdir().unwrap();
    let applied = run_json(home.path(), &["timer", "configure", "strictMode", "true"]);
    assert_eq!(applied["type"], "ConfigApplied");
    assert_eq!(applied["strict_mode"], true);

    run_json(home.path(), &["timer", "configure", "focusMin", "50"]);
    run_json(home.path(), &["timer", "start"]);
    let view = run_json(home.path(), &["timer", "status"]);
    assert_eq!(view["totalMs"], 3_000_000);

    let (code, _, _) = run_cli(home.path(), &["timer", "configure", "longEvery", "1"]);
    assert_ne!(code, 0);
}

#[test]
fn test_config_get_set() {
    let home = tempfile::tempdir().unwrap();

    let (code, stdout, _) = run_cli(home.path(), &["config", "get", "enforcement.retry_attempts"]);
    assert_eq!(code, 0);
    assert_eq!(stdout.trim(), "3");

    let (code, stdout, _) = run_cli(home.path(), &["config", "set", "defaults.focusMin", "45"]);
    assert_eq!(code, 0);
    assert_eq!(stdout.trim(), "ok");

    // New defaults only seed a fresh state.
    let view = run_json(home.path(), &["timer", "start"]);
    assert_eq!(view["type"], "PhaseStarted");
    let view = run_json(home.path(), &["timer", "status"]);
    assert_eq!(view["totalMs"], 2_700_000);

    let list = run_json(home.path(), &["config", "list"]);
    assert_eq!(list["extension"]["break_path"], "tabs/break.html");
}

#[test]
fn test_config_unknown_key_fails() {
    let home = tempfile::tempdir().unwrap();
    let (code, _, stderr) = run_cli(home.path(), &["config", "get", "no.such.key"]);
    assert_ne!(code, 0);
    assert!(stderr.contains("unknown key"));

    let (code, _, _) = run_cli(home.path(), &["config", "set", "no.such.key", "1"]);
    assert_ne!(code, 0);
}

fn write_frame(stdin: &mut impl Write, value: &Value) {
    let body = serde_json::to_vec(value).unwrap();
    stdin.write_all(&(body.len() as u32).to_ne_bytes()).unwrap();
    stdin.write_all(&body).unwrap();
    stdin.flush().unwrap();
}

fn read_frame(stdout: &mut impl Read) -> Option<Value> {
    let mut len = [0u8; 4];
    stdout.read_exact(&mut len).ok()?;
    let mut body = vec![0u8; u32::from_ne_bytes(len) as usize];
    stdout.read_exact(&mut body).unwrap();
    Some(serde_json::from_slice(&body).unwrap())
}

/// Read frames until the response to `id`, answering browser calls with
/// `reply` on the way.
fn await_response(
    stdin: &mut impl Write,
    stdout: &mut impl Read,
    id: u64,
    mut reply: impl FnMut(&Value) -> Value,
) -> Value {
    loop {
        let frame = read_frame(stdout).expect("host closed stdout");
        match frame["type"].as_str() {
            Some("response") if frame["id"] == id => return frame["body"].clone(),
            Some("call") => {
                let value = reply(&frame["call"]);
                write_frame(
                    stdin,
                    &json!({"type": "result", "id": frame["id"], "ok": true, "value": value}),
                );
            }
            _ => {}
        }
    }
}

#[test]
fn test_native_host_round_trip() {
    let home = tempfile::tempdir().unwrap();
    let mut child = Command::new(env!("CARGO_BIN_EXE_pomoguard"))
        .env("POMOGUARD_HOME", home.path())
        .env_remove("RUST_LOG")
        .args(["--no-notify", "host"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("Failed to start host");
    let mut stdin = child.stdin.take().unwrap();
    let mut stdout = child.stdout.take().unwrap();

    // Initial state push.
    let first = read_frame(&mut stdout).unwrap();
    assert_eq!(first["type"], "state");
    assert_eq!(first["view"]["phase"], "idle");

    // Entering focus ends any strict break, which queries the open tabs.
    write_frame(
        &mut stdin,
        &json!({"type": "command", "id": 1, "command": {"type": "start"}}),
    );
    let mut methods = Vec::new();
    let body = await_response(&mut stdin, &mut stdout, 1, |call| {
        methods.push(call["method"].as_str().unwrap_or_default().to_string());
        json!([])
    });
    assert_eq!(body, json!({"ok": true}));
    assert_eq!(methods, vec!["queryTabs"]);

    write_frame(
        &mut stdin,
        &json!({"type": "command", "id": 2, "command": {"type": "status"}}),
    );
    let body = await_response(&mut stdin, &mut stdout, 2, |_| json!([]));
    assert_eq!(body["ok"], true);
    assert_eq!(body["view"]["phase"], "focus");

    write_frame(
        &mut stdin,
        &json!({"type": "command", "id": 3, "command": {"type": "resume"}}),
    );
    let body = await_response(&mut stdin, &mut stdout, 3, |_| json!([]));
    assert_eq!(body, json!({"ok": true}));

    write_frame(
        &mut stdin,
        &json!({"type": "command", "id": 4, "command": {"type": "config.update", "longEvery": 0}}),
    );
    let body = await_response(&mut stdin, &mut stdout, 4, |_| json!([]));
    assert_eq!(body["ok"], false);
    assert!(body["error"].is_string());

    drop(stdin);
    let status = child.wait().unwrap();
    assert!(status.success());
}
