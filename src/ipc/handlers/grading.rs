use crate::grading::{self, AttemptRequest};
use crate::ipc::helpers::{db_conn, optional_str, reply, required_bool, required_str};
use crate::ipc::types::{AppState, Request};
use chrono::Utc;
use serde_json::Value;

fn handle_grades_get(state: &mut AppState, req: &Request) -> Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let task_id = match required_str(req, "taskId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let student_id = match required_str(req, "studentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    reply(req, "grade", grading::grade_for(conn, &student_id, &task_id))
}

fn handle_grades_list_for_student(state: &mut AppState, req: &Request) -> Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let student_id = match required_str(req, "studentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    reply(req, "grades", grading::grades_for_student(conn, &student_id))
}

fn handle_grades_list_for_task(state: &mut AppState, req: &Request) -> Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let task_id = match required_str(req, "taskId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    reply(req, "grades", grading::grades_for_task(conn, &task_id))
}

fn handle_grades_submit(state: &mut AppState, req: &Request) -> Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let task_id = match required_str(req, "taskId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let student_id = match required_str(req, "studentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let passed = match required_bool(req, "passed") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let feedback = match optional_str(req, "feedback") {
        Ok(v) => v,
        Err(e) => return e,
    };
    reply(
        req,
        "grade",
        grading::submit_grade(
            conn,
            &task_id,
            &student_id,
            passed,
            feedback.as_deref(),
            Utc::now(),
        ),
    )
}

fn handle_grades_override(state: &mut AppState, req: &Request) -> Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let grader_id = match required_str(req, "graderId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let task_id = match required_str(req, "taskId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let student_id = match required_str(req, "studentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let passed = match required_bool(req, "passed") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let feedback = match optional_str(req, "feedback") {
        Ok(v) => v,
        Err(e) => return e,
    };
    reply(
        req,
        "grade",
        grading::override_grade(
            conn,
            &grader_id,
            &task_id,
            &student_id,
            passed,
            feedback.as_deref(),
            Utc::now(),
        ),
    )
}

fn handle_tasks_eligibility(state: &mut AppState, req: &Request) -> Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let task_id = match required_str(req, "taskId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let student_id = match required_str(req, "studentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    reply(
        req,
        "eligibility",
        grading::eligibility(conn, &task_id, &student_id, Utc::now()),
    )
}

fn handle_tasks_attempt(state: &mut AppState, req: &Request) -> Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let task_id = match required_str(req, "taskId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let student_id = match required_str(req, "studentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let passed = match required_bool(req, "passed") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let feedback = match optional_str(req, "feedback") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let request_key = match optional_str(req, "requestKey") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let attempt = AttemptRequest {
        task_id: &task_id,
        student_id: &student_id,
        passed,
        feedback: feedback.as_deref(),
        request_key: request_key.as_deref(),
    };
    reply(
        req,
        "outcome",
        grading::attempt_task(conn, &attempt, Utc::now()),
    )
}

fn handle_tasks_stats(state: &mut AppState, req: &Request) -> Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let task_id = match required_str(req, "taskId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    reply(req, "stats", grading::task_stats(conn, &task_id))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "grades.get" => Some(handle_grades_get(state, req)),
        "grades.listForStudent" => Some(handle_grades_list_for_student(state, req)),
        "grades.listForTask" => Some(handle_grades_list_for_task(state, req)),
        "grades.submit" => Some(handle_grades_submit(state, req)),
        "grades.override" => Some(handle_grades_override(state, req)),
        "tasks.eligibility" => Some(handle_tasks_eligibility(state, req)),
        "tasks.attempt" => Some(handle_tasks_attempt(state, req)),
        "tasks.stats" => Some(handle_tasks_stats(state, req)),
        _ => None,
    }
}
