use crate::ipc::error::err;
use crate::ipc::helpers::{db_conn, optional_str, reply, required_str};
use crate::ipc::types::{AppState, Request};
use crate::model::Role;
use crate::store;
use crate::users;
use chrono::Utc;
use serde_json::Value;

fn parse_role(req: &Request, raw: &str) -> Result<Role, Value> {
    Role::parse(raw).ok_or_else(|| {
        err(
            &req.id,
            "bad_params",
            "role must be one of: admin, teacher, student",
            None,
        )
    })
}

fn handle_users_list(state: &mut AppState, req: &Request) -> Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let role = match optional_str(req, "role") {
        Ok(Some(raw)) => match parse_role(req, &raw) {
            Ok(r) => Some(r),
            Err(e) => return e,
        },
        Ok(None) => None,
        Err(e) => return e,
    };
    reply(req, "users", store::list_users(conn, role))
}

fn handle_users_get(state: &mut AppState, req: &Request) -> Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let user_id = match required_str(req, "userId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    reply(req, "user", store::get_user(conn, &user_id))
}

fn handle_users_create(state: &mut AppState, req: &Request) -> Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let name = match required_str(req, "name") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let email = match required_str(req, "email") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let role = match required_str(req, "role").and_then(|r| parse_role(req, &r)) {
        Ok(v) => v,
        Err(e) => return e,
    };
    reply(
        req,
        "user",
        users::create_user(conn, &name, &email, role, Utc::now()),
    )
}

fn handle_auth_login(state: &mut AppState, req: &Request) -> Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let email = match required_str(req, "email") {
        Ok(v) => v,
        Err(e) => return e,
    };
    reply(req, "user", users::login(conn, &email))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "users.list" => Some(handle_users_list(state, req)),
        "users.get" => Some(handle_users_get(state, req)),
        "users.create" => Some(handle_users_create(state, req)),
        "auth.login" => Some(handle_auth_login(state, req)),
        _ => None,
    }
}
