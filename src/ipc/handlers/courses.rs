use crate::content::{self, CoursePatch};
use crate::enrollment;
use crate::error::LmsResult;
use crate::ipc::error::{lms_err, ok};
use crate::ipc::helpers::{db_conn, optional_str, param_as, reply, required_str};
use crate::ipc::types::{AppState, Request};
use crate::store;
use chrono::Utc;
use rusqlite::Connection;
use serde_json::{json, Value};

fn handle_courses_list(state: &mut AppState, req: &Request) -> Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let user_id = match optional_str(req, "userId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let courses = match user_id {
        Some(uid) => store::get_user(conn, &uid)
            .and_then(|u| store::courses_for_user(conn, &u.id, u.role)),
        None => store::list_courses(conn),
    };
    reply(req, "courses", courses)
}

fn handle_courses_get(state: &mut AppState, req: &Request) -> Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let course_id = match required_str(req, "courseId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    reply(req, "course", store::get_course(conn, &course_id))
}

fn handle_courses_create(state: &mut AppState, req: &Request) -> Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let name = match required_str(req, "name") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let description = match optional_str(req, "description") {
        Ok(v) => v.unwrap_or_default(),
        Err(e) => return e,
    };
    reply(
        req,
        "course",
        content::create_course(conn, &name, &description, Utc::now()),
    )
}

fn handle_courses_update(state: &mut AppState, req: &Request) -> Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let course_id = match required_str(req, "courseId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let patch: CoursePatch = match param_as(req, "patch") {
        Ok(v) => v,
        Err(e) => return e,
    };
    reply(req, "course", content::update_course(conn, &course_id, patch))
}

fn handle_courses_members(state: &mut AppState, req: &Request) -> Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let course_id = match required_str(req, "courseId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    reply(req, "members", enrollment::members(conn, &course_id))
}

type MembershipOp = fn(&Connection, &str, &str) -> LmsResult<bool>;

/// Shared shape of the four add/remove methods: `{courseId, userId}` in,
/// `{changed, members}` out.
fn handle_membership(state: &mut AppState, req: &Request, op: MembershipOp) -> Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let course_id = match required_str(req, "courseId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let user_id = match required_str(req, "userId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let result = op(conn, &course_id, &user_id)
        .and_then(|changed| Ok((changed, enrollment::members(conn, &course_id)?)));
    match result {
        Ok((changed, members)) => ok(&req.id, json!({ "changed": changed, "members": members })),
        Err(e) => lms_err(&req.id, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "courses.list" => Some(handle_courses_list(state, req)),
        "courses.get" => Some(handle_courses_get(state, req)),
        "courses.create" => Some(handle_courses_create(state, req)),
        "courses.update" => Some(handle_courses_update(state, req)),
        "courses.members" => Some(handle_courses_members(state, req)),
        "courses.addTeacher" => Some(handle_membership(state, req, enrollment::add_teacher)),
        "courses.removeTeacher" => Some(handle_membership(state, req, enrollment::remove_teacher)),
        "courses.addStudent" => Some(handle_membership(state, req, enrollment::add_student)),
        "courses.removeStudent" => Some(handle_membership(state, req, enrollment::remove_student)),
        _ => None,
    }
}
