use crate::ipc::error::{lms_err, ok};
use crate::ipc::helpers::{db_conn, optional_str, reply, required_str};
use crate::ipc::types::{AppState, Request};
use crate::query::{self, TaskBoard};
use chrono::Utc;
use serde_json::{json, Value};

fn board_reply(req: &Request, views: crate::error::LmsResult<Vec<query::TaskView>>) -> Value {
    match views {
        Ok(views) => {
            let board = TaskBoard::from_views(views.iter().cloned());
            ok(&req.id, json!({ "tasks": views, "board": board }))
        }
        Err(e) => lms_err(&req.id, &e),
    }
}

fn handle_tasks_for_student(state: &mut AppState, req: &Request) -> Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let student_id = match required_str(req, "studentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    board_reply(req, query::tasks_for_student(conn, &student_id, Utc::now()))
}

fn handle_tasks_for_course(state: &mut AppState, req: &Request) -> Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let course_id = match required_str(req, "courseId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let student_id = match optional_str(req, "studentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    board_reply(
        req,
        query::tasks_for_course(conn, &course_id, student_id.as_deref(), Utc::now()),
    )
}

fn handle_courses_progress(state: &mut AppState, req: &Request) -> Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let student_id = match required_str(req, "studentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    reply(req, "courses", query::course_progress(conn, &student_id, Utc::now()))
}

fn handle_dashboard_summary(state: &mut AppState, req: &Request) -> Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    reply(req, "counts", query::dashboard_counts(conn))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "tasks.forStudent" => Some(handle_tasks_for_student(state, req)),
        "tasks.forCourse" => Some(handle_tasks_for_course(state, req)),
        "courses.progress" => Some(handle_courses_progress(state, req)),
        "dashboard.summary" => Some(handle_dashboard_summary(state, req)),
        _ => None,
    }
}
