use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

fn spawn_sidecar(service_key: Option<&str>) -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_campusd");
    let mut cmd = Command::new(exe);
    cmd.env_remove("CAMPUSD_SERVICE_KEY");
    if let Some(key) = service_key {
        cmd.env("CAMPUSD_SERVICE_KEY", key);
    }
    let mut child = cmd
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn campusd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

fn error_code(value: &serde_json::Value) -> Option<&str> {
    value
        .get("error")
        .and_then(|e| e.get("code"))
        .and_then(|v| v.as_str())
}

#[test]
fn admin_methods_require_a_service_key() {
    let workspace = temp_dir("campus-admin-gate");
    let (_child, mut stdin, mut reader) = spawn_sidecar(None);

    // No workspace yet: admin and student methods both refuse.
    let resp = request(&mut stdin, &mut reader, "1", "users.list", json!({}));
    assert_eq!(error_code(&resp), Some("no_workspace"));

    let opened = request(
        &mut stdin,
        &mut reader,
        "2",
        "campus.open",
        json!({ "path": workspace.to_string_lossy() }),
    );
    assert_eq!(opened.get("ok").and_then(|v| v.as_bool()), Some(true));
    assert_eq!(
        opened
            .get("result")
            .and_then(|v| v.get("adminEnabled"))
            .and_then(|v| v.as_bool()),
        Some(false)
    );

    // Open but keyless: admin surface is down, the student surface is not.
    let resp = request(&mut stdin, &mut reader, "3", "users.list", json!({}));
    assert_eq!(error_code(&resp), Some("service_unavailable"));
    let resp = request(
        &mut stdin,
        &mut reader,
        "4",
        "departments.create",
        json!({ "name": "X", "code": "X" }),
    );
    assert_eq!(error_code(&resp), Some("service_unavailable"));
    let resp = request(
        &mut stdin,
        &mut reader,
        "5",
        "student.dashboard",
        json!({ "studentId": "missing" }),
    );
    assert_eq!(error_code(&resp), Some("not_found"));

    // Re-opening with a key turns the admin surface on.
    let opened = request(
        &mut stdin,
        &mut reader,
        "6",
        "campus.open",
        json!({ "path": workspace.to_string_lossy(), "serviceKey": "late-key" }),
    );
    assert_eq!(
        opened
            .get("result")
            .and_then(|v| v.get("adminEnabled"))
            .and_then(|v| v.as_bool()),
        Some(true)
    );
    let resp = request(&mut stdin, &mut reader, "7", "users.list", json!({}));
    assert_eq!(resp.get("ok").and_then(|v| v.as_bool()), Some(true));

    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn service_key_from_environment_enables_admin() {
    let workspace = temp_dir("campus-admin-env");
    let (_child, mut stdin, mut reader) = spawn_sidecar(Some("env-key"));

    let health = request(&mut stdin, &mut reader, "1", "health", json!({}));
    assert_eq!(
        health
            .get("result")
            .and_then(|v| v.get("adminEnabled"))
            .and_then(|v| v.as_bool()),
        Some(true)
    );

    let _ = request(
        &mut stdin,
        &mut reader,
        "2",
        "campus.open",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let resp = request(&mut stdin, &mut reader, "3", "admin.stats", json!({}));
    assert_eq!(resp.get("ok").and_then(|v| v.as_bool()), Some(true));
    assert_eq!(
        resp.get("result")
            .and_then(|v| v.get("totalUsers"))
            .and_then(|v| v.as_i64()),
        Some(0)
    );

    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn open_requires_a_path_and_unknown_methods_are_flagged() {
    let (_child, mut stdin, mut reader) = spawn_sidecar(None);

    let resp = request(&mut stdin, &mut reader, "1", "campus.open", json!({}));
    assert_eq!(error_code(&resp), Some("bad_params"));

    let resp = request(&mut stdin, &mut reader, "2", "campus.burn", json!({}));
    assert_eq!(error_code(&resp), Some("not_implemented"));
}
