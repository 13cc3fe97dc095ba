use crate::error::{EntityKind, LmsError, LmsResult};
use crate::model::{Role, User};
use crate::store;
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use uuid::Uuid;

/// Registers a user. Emails are unique case-insensitively; a duplicate
/// leaves the store untouched.
pub fn create_user(
    conn: &Connection,
    name: &str,
    email: &str,
    role: Role,
    now: DateTime<Utc>,
) -> LmsResult<User> {
    let name = name.trim();
    if name.is_empty() {
        return Err(LmsError::Invalid("name must not be empty".into()));
    }
    let email = store::normalize_email(email);
    if email.is_empty() || !email.contains('@') {
        return Err(LmsError::Invalid("email must be an address".into()));
    }
    if store::find_user_by_email(conn, &email)?.is_some() {
        return Err(LmsError::DuplicateEmail(email));
    }

    let user = User {
        id: Uuid::new_v4().to_string(),
        name: name.to_string(),
        email,
        role,
    };
    store::insert_user(conn, &user, now)?;
    tracing::info!(user_id = %user.id, role = %role, "user created");
    Ok(user)
}

/// Resolves the session identity for an email. The auth collaborator is
/// trusted; no credential is checked here.
pub fn login(conn: &Connection, email: &str) -> LmsResult<User> {
    store::find_user_by_email(conn, email)?
        .ok_or_else(|| LmsError::not_found(EntityKind::User, store::normalize_email(email)))
}
