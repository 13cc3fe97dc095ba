use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
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

fn spawn_sidecar(workspace_env: Option<&Path>) -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_lmsd");
    let mut cmd = Command::new(exe);
    cmd.env_remove("LMSD_WORKSPACE");
    if let Some(p) = workspace_env {
        cmd.env("LMSD_WORKSPACE", p);
    }
    let mut child = cmd
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
    let payload = json!({ "id": id, "method": method, "params": params });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");
    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert_eq!(
        value.get("ok").and_then(|v| v.as_bool()),
        Some(true),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

#[test]
fn setup_and_data_survive_restart() {
    let workspace = temp_dir("lmsd-persist");

    let (mut child, mut stdin, mut reader) = spawn_sidecar(None);
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let defaults = request_ok(&mut stdin, &mut reader, "2", "setup.get", json!({}));
    assert_eq!(defaults["tasks"]["defaultMaxAttempts"], 2);
    assert_eq!(defaults["tasks"]["defaultDeadlineDays"], 7);
    assert_eq!(defaults["tasks"]["lockAfterDeadline"], false);

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "setup.update",
        json!({ "section": "tasks", "patch": { "defaultMaxAttempts": 5 } }),
    );
    let bad = request(
        &mut stdin,
        &mut reader,
        "4",
        "setup.update",
        json!({ "section": "tasks", "patch": { "defaultMaxAttempts": 0 } }),
    );
    assert_eq!(bad["error"]["code"], "bad_params");
    let unknown = request(
        &mut stdin,
        &mut reader,
        "5",
        "setup.update",
        json!({ "section": "planner", "patch": {} }),
    );
    assert_eq!(unknown["error"]["code"], "bad_params");

    let seeded = request_ok(&mut stdin, &mut reader, "6", "workspace.seedDemo", json!({}));
    assert_eq!(seeded["seeded"], true);
    drop(stdin);
    let _ = child.wait();

    let (mut child, mut stdin, mut reader) = spawn_sidecar(Some(&workspace));
    let health = request_ok(&mut stdin, &mut reader, "h", "health", json!({}));
    assert_eq!(health["workspaceOpen"], true);

    let setup = request_ok(&mut stdin, &mut reader, "s", "setup.get", json!({}));
    assert_eq!(setup["tasks"]["defaultMaxAttempts"], 5);

    let summary = request_ok(&mut stdin, &mut reader, "d", "dashboard.summary", json!({}));
    assert_eq!(
        summary["counts"],
        json!({ "admins": 1, "teachers": 2, "students": 3, "courses": 3 })
    );
    let again = request_ok(&mut stdin, &mut reader, "r", "workspace.seedDemo", json!({}));
    assert_eq!(again["seeded"], false);

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(&workspace);
}

#[test]
fn seeded_student_board_and_progress() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar(None);
    let _ = request_ok(&mut stdin, &mut reader, "0", "workspace.openMemory", json!({}));
    let _ = request_ok(&mut stdin, &mut reader, "1", "workspace.seedDemo", json!({}));

    let login = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "auth.login",
        json!({ "email": "student2@university.edu" }),
    );
    let student = login["user"]["id"].as_str().expect("id").to_string();
    assert_eq!(student, "5");

    let tasks = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "tasks.forStudent",
        json!({ "studentId": student }),
    );
    assert_eq!(tasks["tasks"].as_array().map(|a| a.len()), Some(1));
    assert_eq!(tasks["tasks"][0]["courseName"], "Introduction to Computer Science");
    assert_eq!(tasks["tasks"][0]["remainingAttempts"], 1);
    assert_eq!(tasks["board"]["upcoming"].as_array().map(|a| a.len()), Some(1));

    let progress = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "courses.progress",
        json!({ "studentId": "4" }),
    );
    assert_eq!(progress["courses"][0]["completedTasks"], 1);
    assert_eq!(progress["courses"][0]["totalTasks"], 1);
    assert_eq!(progress["courses"][1]["courseName"], "Advanced Mathematics");

    let course_view = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "tasks.forCourse",
        json!({ "courseId": "2", "studentId": "4" }),
    );
    assert_eq!(course_view["board"]["completed"].as_array().map(|a| a.len()), Some(1));

    drop(stdin);
    let _ = child.wait();
}
