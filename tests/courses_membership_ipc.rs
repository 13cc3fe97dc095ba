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

fn error_code(value: &serde_json::Value) -> String {
    value
        .get("error")
        .and_then(|e| e.get("code"))
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string()
}

fn create_user(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    name: &str,
    role: &str,
) -> String {
    request_ok(
        stdin,
        reader,
        &format!("user-{}", name),
        "users.create",
        json!({ "name": name, "email": format!("{}@uni.edu", name), "role": role }),
    )["user"]["id"]
        .as_str()
        .expect("user id")
        .to_string()
}

#[test]
fn enrollment_is_idempotent_and_role_checked() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(&mut stdin, &mut reader, "ws", "workspace.openMemory", json!({}));

    let teacher = create_user(&mut stdin, &mut reader, "tess", "teacher");
    let student = create_user(&mut stdin, &mut reader, "sam", "student");
    let course = request_ok(
        &mut stdin,
        &mut reader,
        "c",
        "courses.create",
        json!({ "name": "Physics", "description": "Intro" }),
    )["course"]["id"]
        .as_str()
        .expect("course id")
        .to_string();

    let first = request_ok(
        &mut stdin,
        &mut reader,
        "e1",
        "courses.addStudent",
        json!({ "courseId": course, "userId": student }),
    );
    assert_eq!(first["changed"], true);
    let second = request_ok(
        &mut stdin,
        &mut reader,
        "e2",
        "courses.addStudent",
        json!({ "courseId": course, "userId": student }),
    );
    assert_eq!(second["changed"], false);
    assert_eq!(second["members"]["studentIds"], json!([student]));

    let wrong = request(
        &mut stdin,
        &mut reader,
        "e3",
        "courses.addTeacher",
        json!({ "courseId": course, "userId": student }),
    );
    assert_eq!(error_code(&wrong), "role_mismatch");

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "t1",
        "courses.addTeacher",
        json!({ "courseId": course, "userId": teacher }),
    );
    let teacher_courses = request_ok(
        &mut stdin,
        &mut reader,
        "l1",
        "courses.list",
        json!({ "userId": teacher }),
    );
    assert_eq!(teacher_courses["courses"].as_array().map(|a| a.len()), Some(1));
    assert_eq!(teacher_courses["courses"][0]["teacherIds"], json!([teacher]));

    let removed = request_ok(
        &mut stdin,
        &mut reader,
        "r1",
        "courses.removeStudent",
        json!({ "courseId": course, "userId": student }),
    );
    assert_eq!(removed["changed"], true);
    let removed_again = request_ok(
        &mut stdin,
        &mut reader,
        "r2",
        "courses.removeStudent",
        json!({ "courseId": course, "userId": student }),
    );
    assert_eq!(removed_again["changed"], false);
    assert_eq!(removed_again["members"]["studentIds"], json!([]));

    let missing = request(
        &mut stdin,
        &mut reader,
        "m",
        "courses.addStudent",
        json!({ "courseId": "nope", "userId": student }),
    );
    assert_eq!(error_code(&missing), "not_found");

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn duplicate_email_leaves_users_unchanged() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(&mut stdin, &mut reader, "ws", "workspace.openMemory", json!({}));

    let _ = create_user(&mut stdin, &mut reader, "ann", "student");
    let dup = request(
        &mut stdin,
        &mut reader,
        "dup",
        "users.create",
        json!({ "name": "Ann Again", "email": "ANN@uni.edu", "role": "teacher" }),
    );
    assert_eq!(error_code(&dup), "duplicate_email");

    let all = request_ok(&mut stdin, &mut reader, "l", "users.list", json!({}));
    assert_eq!(all["users"].as_array().map(|a| a.len()), Some(1));
    let teachers = request_ok(
        &mut stdin,
        &mut reader,
        "lt",
        "users.list",
        json!({ "role": "teacher" }),
    );
    assert_eq!(teachers["users"], json!([]));

    let login = request_ok(
        &mut stdin,
        &mut reader,
        "login",
        "auth.login",
        json!({ "email": "Ann@Uni.edu" }),
    );
    assert_eq!(login["user"]["name"], "ann");

    let bad_role = request(
        &mut stdin,
        &mut reader,
        "br",
        "users.create",
        json!({ "name": "X", "email": "x@uni.edu", "role": "dean" }),
    );
    assert_eq!(error_code(&bad_role), "bad_params");

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn course_update_edits_name_and_description() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(&mut stdin, &mut reader, "ws", "workspace.openMemory", json!({}));

    let course = request_ok(
        &mut stdin,
        &mut reader,
        "c",
        "courses.create",
        json!({ "name": "Physics", "description": "Intro" }),
    )["course"]["id"]
        .as_str()
        .expect("course id")
        .to_string();

    let updated = request_ok(
        &mut stdin,
        &mut reader,
        "u1",
        "courses.update",
        json!({ "courseId": course, "patch": { "name": " Physics 101 ", "description": "Mechanics" } }),
    );
    assert_eq!(updated["course"]["name"], "Physics 101");
    assert_eq!(updated["course"]["description"], "Mechanics");

    let fetched = request_ok(
        &mut stdin,
        &mut reader,
        "g",
        "courses.get",
        json!({ "courseId": course }),
    );
    assert_eq!(fetched["course"]["name"], "Physics 101");

    let blank = request(
        &mut stdin,
        &mut reader,
        "u2",
        "courses.update",
        json!({ "courseId": course, "patch": { "name": "  " } }),
    );
    assert_eq!(error_code(&blank), "bad_params");

    let unknown_field = request(
        &mut stdin,
        &mut reader,
        "u3",
        "courses.update",
        json!({ "courseId": course, "patch": { "studentIds": [] } }),
    );
    assert_eq!(error_code(&unknown_field), "bad_params");

    let missing = request(
        &mut stdin,
        &mut reader,
        "u4",
        "courses.update",
        json!({ "courseId": "nope", "patch": { "name": "X" } }),
    );
    assert_eq!(error_code(&missing), "not_found");

    drop(stdin);
    let _ = child.wait();
}
