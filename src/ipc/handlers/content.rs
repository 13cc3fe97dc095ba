use crate::content::{self, NewSubsection, SubsectionPatch};
use crate::ipc::helpers::{db_conn, param_as, params_as, reply, required_str};
use crate::ipc::types::{AppState, Request};
use crate::store;
use chrono::Utc;
use serde_json::Value;

fn handle_sections_add(state: &mut AppState, req: &Request) -> Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let course_id = match required_str(req, "courseId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let name = match required_str(req, "name") {
        Ok(v) => v,
        Err(e) => return e,
    };
    reply(req, "section", content::add_section(conn, &course_id, &name))
}

fn handle_subsections_add(state: &mut AppState, req: &Request) -> Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let section_id = match required_str(req, "sectionId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let new: NewSubsection = match params_as(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    reply(
        req,
        "subsection",
        content::add_subsection(conn, &section_id, new, Utc::now()),
    )
}

fn handle_subsections_get(state: &mut AppState, req: &Request) -> Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let subsection_id = match required_str(req, "subsectionId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    reply(req, "subsection", store::get_subsection(conn, &subsection_id))
}

fn handle_subsections_update(state: &mut AppState, req: &Request) -> Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let subsection_id = match required_str(req, "subsectionId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let patch: SubsectionPatch = match param_as(req, "patch") {
        Ok(v) => v,
        Err(e) => return e,
    };
    reply(
        req,
        "subsection",
        content::update_subsection(conn, &subsection_id, patch),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "sections.add" => Some(handle_sections_add(state, req)),
        "subsections.add" => Some(handle_subsections_add(state, req)),
        "subsections.get" => Some(handle_subsections_get(state, req)),
        "subsections.update" => Some(handle_subsections_update(state, req)),
        _ => None,
    }
}
