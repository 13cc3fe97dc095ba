//! Typed reads and writes over the LMS tables.
//!
//! Every function takes the connection explicitly; callers that need several
//! statements to commit together open the transaction themselves and pass it
//! in (a `Transaction` derefs to `Connection`).

use crate::error::{EntityKind, LmsError, LmsResult};
use crate::model::{
    Course, Grade, Role, Section, Subsection, SubsectionBody, SubsectionKind, Task, User,
};
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row};

// ---------------------------------------------------------------------------
// users

fn map_user(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        role: row.get(3)?,
    })
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

pub fn get_user(conn: &Connection, user_id: &str) -> LmsResult<User> {
    conn.query_row(
        "SELECT id, name, email, role FROM users WHERE id = ?",
        [user_id],
        map_user,
    )
    .optional()?
    .ok_or_else(|| LmsError::not_found(EntityKind::User, user_id))
}

pub fn find_user_by_email(conn: &Connection, email: &str) -> LmsResult<Option<User>> {
    Ok(conn
        .query_row(
            "SELECT id, name, email, role FROM users WHERE email = ?",
            [normalize_email(email)],
            map_user,
        )
        .optional()?)
}

pub fn list_users(conn: &Connection, role: Option<Role>) -> LmsResult<Vec<User>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, email, role FROM users
         WHERE ?1 IS NULL OR role = ?1
         ORDER BY rowid",
    )?;
    let users = stmt
        .query_map([role], map_user)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(users)
}

pub fn insert_user(conn: &Connection, user: &User, now: DateTime<Utc>) -> LmsResult<()> {
    conn.execute(
        "INSERT INTO users(id, name, email, role, created_at) VALUES(?, ?, ?, ?, ?)",
        (&user.id, &user.name, &user.email, user.role, now),
    )?;
    Ok(())
}

pub fn require_role(user: &User, expected: Role) -> LmsResult<()> {
    if user.role != expected {
        return Err(LmsError::RoleMismatch {
            user_id: user.id.clone(),
            expected,
            actual: user.role,
        });
    }
    Ok(())
}

pub fn count_users_by_role(conn: &Connection, role: Role) -> LmsResult<i64> {
    Ok(conn.query_row(
        "SELECT COUNT(*) FROM users WHERE role = ?",
        [role],
        |r| r.get(0),
    )?)
}

// ---------------------------------------------------------------------------
// courses and membership

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Membership {
    Teacher,
    Student,
}

impl Membership {
    fn table(self) -> &'static str {
        match self {
            Self::Teacher => "course_teachers",
            Self::Student => "course_students",
        }
    }

    pub fn role(self) -> Role {
        match self {
            Self::Teacher => Role::Teacher,
            Self::Student => Role::Student,
        }
    }
}

pub fn require_course(conn: &Connection, course_id: &str) -> LmsResult<()> {
    let exists: Option<i64> = conn
        .query_row("SELECT 1 FROM courses WHERE id = ?", [course_id], |r| {
            r.get(0)
        })
        .optional()?;
    if exists.is_none() {
        return Err(LmsError::not_found(EntityKind::Course, course_id));
    }
    Ok(())
}

pub fn insert_course(
    conn: &Connection,
    course_id: &str,
    name: &str,
    description: &str,
    now: DateTime<Utc>,
) -> LmsResult<()> {
    conn.execute(
        "INSERT INTO courses(id, name, description, created_at) VALUES(?, ?, ?, ?)",
        (course_id, name, description, now),
    )?;
    Ok(())
}

pub fn update_course_row(
    conn: &Connection,
    course_id: &str,
    name: &str,
    description: &str,
) -> LmsResult<()> {
    let n = conn.execute(
        "UPDATE courses SET name = ?, description = ? WHERE id = ?",
        (name, description, course_id),
    )?;
    if n == 0 {
        return Err(LmsError::not_found(EntityKind::Course, course_id));
    }
    Ok(())
}

pub fn course_name(conn: &Connection, course_id: &str) -> LmsResult<String> {
    conn.query_row("SELECT name FROM courses WHERE id = ?", [course_id], |r| {
        r.get(0)
    })
    .optional()?
    .ok_or_else(|| LmsError::not_found(EntityKind::Course, course_id))
}

pub fn member_ids(conn: &Connection, course_id: &str, m: Membership) -> LmsResult<Vec<String>> {
    let sql = format!(
        "SELECT user_id FROM {} WHERE course_id = ? ORDER BY sort_order",
        m.table()
    );
    let mut stmt = conn.prepare(&sql)?;
    let ids = stmt
        .query_map([course_id], |r| r.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ids)
}

/// Returns `false` when the relation already held.
pub fn insert_member(
    conn: &Connection,
    course_id: &str,
    user_id: &str,
    m: Membership,
) -> LmsResult<bool> {
    let sql = format!(
        "INSERT INTO {table}(course_id, user_id, sort_order)
         SELECT ?1, ?2, COALESCE(MAX(sort_order), -1) + 1 FROM {table} WHERE course_id = ?1
         ON CONFLICT(course_id, user_id) DO NOTHING",
        table = m.table()
    );
    let n = conn.execute(&sql, (course_id, user_id))?;
    Ok(n > 0)
}

/// Returns `false` when the relation did not hold.
pub fn delete_member(
    conn: &Connection,
    course_id: &str,
    user_id: &str,
    m: Membership,
) -> LmsResult<bool> {
    let sql = format!(
        "DELETE FROM {} WHERE course_id = ? AND user_id = ?",
        m.table()
    );
    let n = conn.execute(&sql, (course_id, user_id))?;
    Ok(n > 0)
}

pub fn get_course(conn: &Connection, course_id: &str) -> LmsResult<Course> {
    let (name, description): (String, String) = conn
        .query_row(
            "SELECT name, description FROM courses WHERE id = ?",
            [course_id],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )
        .optional()?
        .ok_or_else(|| LmsError::not_found(EntityKind::Course, course_id))?;

    Ok(Course {
        id: course_id.to_string(),
        name,
        description,
        teacher_ids: member_ids(conn, course_id, Membership::Teacher)?,
        student_ids: member_ids(conn, course_id, Membership::Student)?,
        sections: sections_for_course(conn, course_id)?,
    })
}

fn courses_by_ids(conn: &Connection, ids: Vec<String>) -> LmsResult<Vec<Course>> {
    ids.iter().map(|id| get_course(conn, id)).collect()
}

pub fn list_courses(conn: &Connection) -> LmsResult<Vec<Course>> {
    let mut stmt = conn.prepare("SELECT id FROM courses ORDER BY rowid")?;
    let ids = stmt
        .query_map([], |r| r.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    courses_by_ids(conn, ids)
}

/// Ids of the courses a teacher is assigned to or a student is enrolled in,
/// in course creation order.
pub fn course_ids_for_member(
    conn: &Connection,
    user_id: &str,
    m: Membership,
) -> LmsResult<Vec<String>> {
    let sql = format!(
        "SELECT c.id FROM courses c
         JOIN {} m ON m.course_id = c.id
         WHERE m.user_id = ?
         ORDER BY c.rowid",
        m.table()
    );
    let mut stmt = conn.prepare(&sql)?;
    let ids = stmt
        .query_map([user_id], |r| r.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ids)
}

/// Admins see every course; teachers and students see the courses they are
/// assigned to or enrolled in.
pub fn courses_for_user(conn: &Connection, user_id: &str, role: Role) -> LmsResult<Vec<Course>> {
    let m = match role {
        Role::Admin => return list_courses(conn),
        Role::Teacher => Membership::Teacher,
        Role::Student => Membership::Student,
    };
    courses_by_ids(conn, course_ids_for_member(conn, user_id, m)?)
}

pub fn count_courses(conn: &Connection) -> LmsResult<i64> {
    Ok(conn.query_row("SELECT COUNT(*) FROM courses", [], |r| r.get(0))?)
}

// ---------------------------------------------------------------------------
// sections

pub fn get_section(conn: &Connection, section_id: &str) -> LmsResult<Section> {
    let (name, course_id): (String, String) = conn
        .query_row(
            "SELECT name, course_id FROM sections WHERE id = ?",
            [section_id],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )
        .optional()?
        .ok_or_else(|| LmsError::not_found(EntityKind::Section, section_id))?;
    Ok(Section {
        id: section_id.to_string(),
        name,
        course_id,
        subsections: subsections_for_section(conn, section_id)?,
    })
}

pub fn sections_for_course(conn: &Connection, course_id: &str) -> LmsResult<Vec<Section>> {
    let mut stmt = conn.prepare(
        "SELECT id, name FROM sections WHERE course_id = ? ORDER BY sort_order",
    )?;
    let rows = stmt
        .query_map([course_id], |r| {
            Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(|(id, name)| {
            let subsections = subsections_for_section(conn, &id)?;
            Ok(Section {
                id,
                name,
                course_id: course_id.to_string(),
                subsections,
            })
        })
        .collect()
}

pub fn insert_section(conn: &Connection, section: &Section) -> LmsResult<()> {
    conn.execute(
        "INSERT INTO sections(id, course_id, name, sort_order)
         SELECT ?1, ?2, ?3, COALESCE(MAX(sort_order), -1) + 1 FROM sections WHERE course_id = ?2",
        (&section.id, &section.course_id, &section.name),
    )?;
    Ok(())
}

// ---------------------------------------------------------------------------
// subsections and tasks

const SUBSECTION_COLS: &str =
    "s.id, s.section_id, s.course_id, s.name, s.kind, s.content, s.deadline, s.max_attempts";

fn map_subsection(row: &Row<'_>) -> rusqlite::Result<Subsection> {
    let kind: SubsectionKind = row.get(4)?;
    let deadline: Option<DateTime<Utc>> = row.get(6)?;
    let max_attempts: Option<u32> = row.get(7)?;
    let body = match SubsectionBody::plain(kind) {
        Some(body) => body,
        None => SubsectionBody::Task {
            deadline: deadline
                .ok_or_else(|| rusqlite::Error::InvalidColumnType(6, "deadline".into(), Type::Null))?,
            max_attempts: max_attempts.ok_or_else(|| {
                rusqlite::Error::InvalidColumnType(7, "max_attempts".into(), Type::Null)
            })?,
        },
    };
    Ok(Subsection {
        id: row.get(0)?,
        section_id: row.get(1)?,
        course_id: row.get(2)?,
        name: row.get(3)?,
        content: row.get(5)?,
        body,
    })
}

fn task_columns(body: &SubsectionBody) -> (Option<DateTime<Utc>>, Option<u32>) {
    match body {
        SubsectionBody::Task {
            deadline,
            max_attempts,
        } => (Some(*deadline), Some(*max_attempts)),
        _ => (None, None),
    }
}

pub fn get_subsection(conn: &Connection, subsection_id: &str) -> LmsResult<Subsection> {
    let sql = format!("SELECT {SUBSECTION_COLS} FROM subsections s WHERE s.id = ?");
    conn.query_row(&sql, [subsection_id], map_subsection)
        .optional()?
        .ok_or_else(|| LmsError::not_found(EntityKind::Subsection, subsection_id))
}

pub fn subsections_for_section(conn: &Connection, section_id: &str) -> LmsResult<Vec<Subsection>> {
    let sql = format!(
        "SELECT {SUBSECTION_COLS} FROM subsections s WHERE s.section_id = ? ORDER BY s.sort_order"
    );
    let mut stmt = conn.prepare(&sql)?;
    let subs = stmt
        .query_map([section_id], map_subsection)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(subs)
}

pub fn insert_subsection(conn: &Connection, sub: &Subsection) -> LmsResult<()> {
    let (deadline, max_attempts) = task_columns(&sub.body);
    conn.execute(
        "INSERT INTO subsections(id, section_id, course_id, name, kind, content, deadline, max_attempts, sort_order)
         SELECT ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, COALESCE(MAX(sort_order), -1) + 1
         FROM subsections WHERE section_id = ?2",
        (
            &sub.id,
            &sub.section_id,
            &sub.course_id,
            &sub.name,
            sub.body.kind(),
            &sub.content,
            deadline,
            max_attempts,
        ),
    )?;
    Ok(())
}

pub fn update_subsection_row(conn: &Connection, sub: &Subsection) -> LmsResult<()> {
    let (deadline, max_attempts) = task_columns(&sub.body);
    let n = conn.execute(
        "UPDATE subsections
         SET name = ?, kind = ?, content = ?, deadline = ?, max_attempts = ?
         WHERE id = ?",
        (
            &sub.name,
            sub.body.kind(),
            &sub.content,
            deadline,
            max_attempts,
            &sub.id,
        ),
    )?;
    if n == 0 {
        return Err(LmsError::not_found(EntityKind::Subsection, &sub.id));
    }
    Ok(())
}

pub fn get_task(conn: &Connection, task_id: &str) -> LmsResult<Task> {
    let sub = get_subsection(conn, task_id).map_err(|e| match e {
        LmsError::NotFound { id, .. } => LmsError::not_found(EntityKind::Task, id),
        other => other,
    })?;
    sub.as_task()
        .ok_or_else(|| LmsError::not_found(EntityKind::Task, task_id))
}

/// Tasks of a course in section order, then subsection order.
pub fn tasks_for_course(conn: &Connection, course_id: &str) -> LmsResult<Vec<Task>> {
    let sql = format!(
        "SELECT {SUBSECTION_COLS}
         FROM subsections s
         JOIN sections sec ON sec.id = s.section_id
         WHERE s.course_id = ? AND s.kind = 'task'
         ORDER BY sec.sort_order, s.sort_order"
    );
    let mut stmt = conn.prepare(&sql)?;
    let subs = stmt
        .query_map([course_id], map_subsection)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(subs.iter().filter_map(Subsection::as_task).collect())
}

// ---------------------------------------------------------------------------
// grades

const GRADE_COLS: &str = "task_id, student_id, passed, attempts, feedback, updated_at";

fn map_grade(row: &Row<'_>) -> rusqlite::Result<Grade> {
    Ok(Grade {
        task_id: row.get(0)?,
        student_id: row.get(1)?,
        passed: row.get(2)?,
        attempts: row.get(3)?,
        feedback: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

pub fn grade_for(conn: &Connection, student_id: &str, task_id: &str) -> LmsResult<Option<Grade>> {
    let sql = format!("SELECT {GRADE_COLS} FROM grades WHERE task_id = ? AND student_id = ?");
    Ok(conn
        .query_row(&sql, (task_id, student_id), map_grade)
        .optional()?)
}

pub fn grades_for_student(conn: &Connection, student_id: &str) -> LmsResult<Vec<Grade>> {
    let sql = format!("SELECT {GRADE_COLS} FROM grades WHERE student_id = ? ORDER BY rowid");
    let mut stmt = conn.prepare(&sql)?;
    let grades = stmt
        .query_map([student_id], map_grade)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(grades)
}

pub fn grades_for_task(conn: &Connection, task_id: &str) -> LmsResult<Vec<Grade>> {
    let sql = format!("SELECT {GRADE_COLS} FROM grades WHERE task_id = ? ORDER BY rowid");
    let mut stmt = conn.prepare(&sql)?;
    let grades = stmt
        .query_map([task_id], map_grade)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(grades)
}

pub fn upsert_grade(conn: &Connection, grade: &Grade) -> LmsResult<()> {
    conn.execute(
        "INSERT INTO grades(task_id, student_id, passed, attempts, feedback, updated_at)
         VALUES(?, ?, ?, ?, ?, ?)
         ON CONFLICT(task_id, student_id) DO UPDATE SET
           passed = excluded.passed,
           attempts = excluded.attempts,
           feedback = excluded.feedback,
           updated_at = excluded.updated_at",
        (
            &grade.task_id,
            &grade.student_id,
            grade.passed,
            grade.attempts,
            &grade.feedback,
            grade.updated_at,
        ),
    )?;
    Ok(())
}

// ---------------------------------------------------------------------------
// attempt receipts

pub struct Receipt {
    pub task_id: String,
    pub student_id: String,
    pub grade: Grade,
}

pub fn find_receipt(conn: &Connection, request_key: &str) -> LmsResult<Option<Receipt>> {
    let row: Option<(String, String, String)> = conn
        .query_row(
            "SELECT task_id, student_id, grade_json FROM attempt_receipts WHERE request_key = ?",
            [request_key],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
        )
        .optional()?;
    match row {
        Some((task_id, student_id, raw)) => Ok(Some(Receipt {
            task_id,
            student_id,
            grade: serde_json::from_str(&raw)?,
        })),
        None => Ok(None),
    }
}

pub fn insert_receipt(
    conn: &Connection,
    request_key: &str,
    grade: &Grade,
    now: DateTime<Utc>,
) -> LmsResult<()> {
    conn.execute(
        "INSERT INTO attempt_receipts(request_key, task_id, student_id, grade_json, created_at)
         VALUES(?, ?, ?, ?, ?)",
        (
            request_key,
            &grade.task_id,
            &grade.student_id,
            serde_json::to_string(grade)?,
            now,
        ),
    )?;
    Ok(())
}
