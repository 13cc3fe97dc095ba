use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_lmsd");
    let mut child = Command::new(exe)
        .env_remove("LMSD_WORKSPACE")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn lmsd");
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

fn error_code(resp: &serde_json::Value) -> Option<&str> {
    resp.get("error")
        .and_then(|e| e.get("code"))
        .and_then(|v| v.as_str())
}

const STORE_METHODS: &[&str] = &[
    "workspace.seedDemo",
    "setup.get",
    "setup.update",
    "users.list",
    "users.get",
    "users.create",
    "auth.login",
    "courses.list",
    "courses.get",
    "courses.create",
    "courses.update",
    "courses.members",
    "courses.addTeacher",
    "courses.removeTeacher",
    "courses.addStudent",
    "courses.removeStudent",
    "sections.add",
    "subsections.add",
    "subsections.get",
    "subsections.update",
    "grades.get",
    "grades.listForStudent",
    "grades.listForTask",
    "grades.submit",
    "grades.override",
    "tasks.eligibility",
    "tasks.attempt",
    "tasks.stats",
    "tasks.forStudent",
    "tasks.forCourse",
    "courses.progress",
    "dashboard.summary",
];

#[test]
fn store_methods_require_a_workspace() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let health = request(&mut stdin, &mut reader, "h", "health", json!({}));
    assert_eq!(health["ok"], true);
    assert_eq!(health["result"]["workspaceOpen"], false);

    for (i, method) in STORE_METHODS.iter().enumerate() {
        let resp = request(&mut stdin, &mut reader, &format!("n{}", i), method, json!({}));
        assert_eq!(resp["ok"], false, "{} should fail", method);
        assert_eq!(error_code(&resp), Some("no_workspace"), "{}", method);
    }

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn every_method_dispatches_once_a_workspace_is_open() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let opened = request(&mut stdin, &mut reader, "0", "workspace.openMemory", json!({}));
    assert_eq!(opened["ok"], true);

    for (i, method) in STORE_METHODS.iter().enumerate() {
        let resp = request(&mut stdin, &mut reader, &format!("m{}", i), method, json!({}));
        assert_ne!(
            error_code(&resp),
            Some("not_implemented"),
            "unexpected unknown method for {}",
            method
        );
        assert_ne!(error_code(&resp), Some("no_workspace"), "{}", method);
    }

    let unknown = request(&mut stdin, &mut reader, "u", "grades.delete", json!({}));
    assert_eq!(error_code(&unknown), Some("not_implemented"));

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn malformed_line_gets_bad_json_and_loop_continues() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    writeln!(stdin, "{{not json").expect("write");
    stdin.flush().expect("flush");
    let mut line = String::new();
    reader.read_line(&mut line).expect("read");
    let v: serde_json::Value = serde_json::from_str(line.trim()).expect("json");
    assert_eq!(v["ok"], false);
    assert_eq!(v["error"]["code"], "bad_json");

    let health = request(&mut stdin, &mut reader, "1", "health", json!({}));
    assert_eq!(health["ok"], true);

    drop(stdin);
    let _ = child.wait();
}
