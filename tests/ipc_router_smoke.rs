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

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_rollcalld");
    let mut child = Command::new(exe)
        .env("ROLLCALL_TOKEN_SECRET", "test-secret")
        .env_remove("ROLLCALL_WORKSPACE")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn rollcalld");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn read_json_line(reader: &mut BufReader<ChildStdout>) -> serde_json::Value {
    let mut line = String::new();
    reader.read_line(&mut line).expect("read line");
    assert!(!line.trim().is_empty(), "empty line from sidecar");
    serde_json::from_str(line.trim()).expect("parse line json")
}

fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    token: Option<&str>,
    params: serde_json::Value,
) -> serde_json::Value {
    let mut payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    if let Some(t) = token {
        payload["token"] = json!(t);
    }
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let value = read_json_line(reader);
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    token: Option<&str>,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, token, params);
    assert!(
        value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

fn error_code(value: &serde_json::Value) -> &str {
    value
        .get("error")
        .and_then(|e| e.get("code"))
        .and_then(|v| v.as_str())
        .unwrap_or("")
}

fn register(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    name: &str,
    email: &str,
) -> (String, String) {
    let res = request_ok(
        stdin,
        reader,
        id,
        "auth.register",
        None,
        json!({ "name": name, "email": email, "password": "pw-123456" }),
    );
    let token = res.get("token").and_then(|v| v.as_str()).expect("token").to_string();
    let user_id = res
        .get("user")
        .and_then(|u| u.get("id"))
        .and_then(|v| v.as_str())
        .expect("user id")
        .to_string();
    (token, user_id)
}

fn assert_dispatched(value: &serde_json::Value, method: &str) {
    if value.get("ok").and_then(|v| v.as_bool()) == Some(false) {
        assert_ne!(
            error_code(value),
            "not_implemented",
            "unexpected unknown method for {}",
            method
        );
    }
}

#[test]
fn router_dispatch_smoke_covers_handler_families() {
    let workspace = temp_dir("rollcall-router-smoke");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let health = request(&mut stdin, &mut reader, "1", "health", None, json!({}));
    assert_dispatched(&health, "health");
    assert_eq!(health.pointer("/result/workspacePath"), Some(&json!(null)));

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "workspace.select",
        None,
        json!({ "path": workspace.to_string_lossy() }),
    );
    let (token, user_id) = register(&mut stdin, &mut reader, "3", "Smoke", "smoke@example.com");
    let login = request(
        &mut stdin,
        &mut reader,
        "4",
        "auth.login",
        None,
        json!({ "email": "smoke@example.com", "password": "pw-123456" }),
    );
    assert_dispatched(&login, "auth.login");

    let created = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "groups.create",
        Some(&token),
        json!({ "name": "Smoke" }),
    );
    let group_id = created
        .pointer("/group/id")
        .and_then(|v| v.as_str())
        .expect("group id")
        .to_string();
    let student = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "groups.addStudent",
        Some(&token),
        json!({ "groupId": group_id, "name": "Pupil" }),
    );
    let student_id = student
        .pointer("/student/id")
        .and_then(|v| v.as_str())
        .expect("student id")
        .to_string();

    let calls: Vec<(&str, serde_json::Value)> = vec![
        ("groups.list", json!({})),
        ("groups.open", json!({ "groupId": group_id })),
        (
            "attendance.bulkUpdate",
            json!({
                "groupId": group_id,
                "updates": [{ "studentId": student_id, "date": "2024-01-15", "status": "Present" }]
            }),
        ),
        ("attendance.history", json!({ "groupId": group_id })),
        (
            "attendance.studentStats",
            json!({ "groupId": group_id, "studentId": student_id }),
        ),
        ("groups.addAdmin", json!({ "groupId": group_id, "email": "smoke@example.com" })),
        ("groups.removeAdmin", json!({ "groupId": group_id, "userId": user_id })),
        ("groups.removeStudent", json!({ "groupId": group_id, "studentId": student_id })),
        ("realtime.join", json!({ "groupId": group_id })),
        ("realtime.leave", json!({ "subscriptionId": 999_999 })),
    ];
    for (i, (method, params)) in calls.into_iter().enumerate() {
        let id = format!("c{}", i);
        let value = request(&mut stdin, &mut reader, &id, method, Some(&token), params);
        assert_dispatched(&value, method);
    }

    let unknown = request(&mut stdin, &mut reader, "u1", "nope.method", None, json!({}));
    assert_eq!(error_code(&unknown), "not_implemented");

    writeln!(stdin, "{{not json").expect("write garbage");
    stdin.flush().expect("flush garbage");
    let garbage = read_json_line(&mut reader);
    assert_eq!(error_code(&garbage), "bad_json");

    let _ = request_ok(&mut stdin, &mut reader, "z", "health", None, json!({}));
    drop(stdin);
    let _ = child.wait();
}
