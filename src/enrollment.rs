use crate::error::LmsResult;
use crate::store::{self, Membership};
use rusqlite::Connection;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Members {
    pub teacher_ids: Vec<String>,
    pub student_ids: Vec<String>,
}

fn add(conn: &Connection, course_id: &str, user_id: &str, m: Membership) -> LmsResult<bool> {
    store::require_course(conn, course_id)?;
    let user = store::get_user(conn, user_id)?;
    store::require_role(&user, m.role())?;
    let changed = store::insert_member(conn, course_id, user_id, m)?;
    if changed {
        tracing::info!(course_id, user_id, role = %m.role(), "member added");
    }
    Ok(changed)
}

fn remove(conn: &Connection, course_id: &str, user_id: &str, m: Membership) -> LmsResult<bool> {
    store::require_course(conn, course_id)?;
    store::get_user(conn, user_id)?;
    // Grades are left in place; they are the student's history.
    let changed = store::delete_member(conn, course_id, user_id, m)?;
    if changed {
        tracing::info!(course_id, user_id, role = %m.role(), "member removed");
    }
    Ok(changed)
}

/// Assigns a teacher. Returns whether the membership changed.
pub fn add_teacher(conn: &Connection, course_id: &str, teacher_id: &str) -> LmsResult<bool> {
    add(conn, course_id, teacher_id, Membership::Teacher)
}

pub fn remove_teacher(conn: &Connection, course_id: &str, teacher_id: &str) -> LmsResult<bool> {
    remove(conn, course_id, teacher_id, Membership::Teacher)
}

/// Enrolls a student. Returns whether the membership changed.
pub fn add_student(conn: &Connection, course_id: &str, student_id: &str) -> LmsResult<bool> {
    add(conn, course_id, student_id, Membership::Student)
}

pub fn remove_student(conn: &Connection, course_id: &str, student_id: &str) -> LmsResult<bool> {
    remove(conn, course_id, student_id, Membership::Student)
}

pub fn members(conn: &Connection, course_id: &str) -> LmsResult<Members> {
    store::require_course(conn, course_id)?;
    Ok(Members {
        teacher_ids: store::member_ids(conn, course_id, Membership::Teacher)?,
        student_ids: store::member_ids(conn, course_id, Membership::Student)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content;
    use crate::db;
    use crate::model::Role;
    use crate::users;
    use chrono::Utc;

    fn fixture() -> (Connection, String, String, String) {
        let conn = db::open_in_memory().expect("open");
        let now = Utc::now();
        let course = content::create_course(&conn, "Physics", "", now).expect("course");
        let teacher =
            users::create_user(&conn, "T", "t@uni.edu", Role::Teacher, now).expect("teacher");
        let student =
            users::create_user(&conn, "S", "s@uni.edu", Role::Student, now).expect("student");
        (conn, course.id, teacher.id, student.id)
    }

    #[test]
    fn add_student_twice_lists_once() {
        let (conn, course_id, _, student_id) = fixture();
        assert!(add_student(&conn, &course_id, &student_id).expect("add"));
        assert!(!add_student(&conn, &course_id, &student_id).expect("add again"));
        let m = members(&conn, &course_id).expect("members");
        assert_eq!(m.student_ids, vec![student_id]);
    }

    #[test]
    fn remove_absent_member_is_noop_success() {
        let (conn, course_id, teacher_id, _) = fixture();
        assert!(!remove_teacher(&conn, &course_id, &teacher_id).expect("remove"));
        assert!(add_teacher(&conn, &course_id, &teacher_id).expect("add"));
        assert!(remove_teacher(&conn, &course_id, &teacher_id).expect("remove"));
        assert!(members(&conn, &course_id).expect("m").teacher_ids.is_empty());
    }

    #[test]
    fn unknown_course_and_wrong_role_fail() {
        let (conn, course_id, teacher_id, student_id) = fixture();
        let e = add_student(&conn, "nope", &student_id).unwrap_err();
        assert_eq!(e.code(), "not_found");
        let e = add_student(&conn, &course_id, &teacher_id).unwrap_err();
        assert_eq!(e.code(), "role_mismatch");
        let e = add_teacher(&conn, &course_id, "ghost").unwrap_err();
        assert_eq!(e.code(), "not_found");
    }

    #[test]
    fn membership_preserves_insertion_order() {
        let (conn, course_id, _, first) = fixture();
        let now = Utc::now();
        let second = users::create_user(&conn, "B", "b@uni.edu", Role::Student, now)
            .expect("second")
            .id;
        add_student(&conn, &course_id, &second).expect("add");
        add_student(&conn, &course_id, &first).expect("add");
        let m = members(&conn, &course_id).expect("members");
        assert_eq!(m.student_ids, vec![second, first]);
    }
}
