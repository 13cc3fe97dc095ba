use anyhow::Context;
use rusqlite::{Connection, OptionalExtension};
use std::path::Path;
use std::time::Duration;

pub const DB_FILE_NAME: &str = "lms.sqlite3";

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace).with_context(|| {
        format!(
            "failed to create workspace {}",
            workspace.to_string_lossy()
        )
    })?;
    let db_path = workspace.join(DB_FILE_NAME);
    let conn = Connection::open(&db_path)
        .with_context(|| format!("failed to open {}", db_path.to_string_lossy()))?;
    // Writers on a shared workspace file wait for each other instead of failing.
    conn.busy_timeout(BUSY_TIMEOUT)?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn open_in_memory() -> anyhow::Result<Connection> {
    let conn = Connection::open_in_memory()?;
    init_schema(&conn)?;
    Ok(conn)
}

fn init_schema(conn: &Connection) -> anyhow::Result<()> {
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS users(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            email TEXT NOT NULL,
            role TEXT NOT NULL CHECK(role IN ('admin', 'teacher', 'student')),
            created_at TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_users_email ON users(email)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS courses(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS course_teachers(
            course_id TEXT NOT NULL,
            user_id TEXT NOT NULL,
            sort_order INTEGER NOT NULL,
            PRIMARY KEY(course_id, user_id),
            FOREIGN KEY(course_id) REFERENCES courses(id),
            FOREIGN KEY(user_id) REFERENCES users(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_course_teachers_user ON course_teachers(user_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS course_students(
            course_id TEXT NOT NULL,
            user_id TEXT NOT NULL,
            sort_order INTEGER NOT NULL,
            PRIMARY KEY(course_id, user_id),
            FOREIGN KEY(course_id) REFERENCES courses(id),
            FOREIGN KEY(user_id) REFERENCES users(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_course_students_user ON course_students(user_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS sections(
            id TEXT PRIMARY KEY,
            course_id TEXT NOT NULL,
            name TEXT NOT NULL,
            sort_order INTEGER NOT NULL,
            FOREIGN KEY(course_id) REFERENCES courses(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_sections_course_sort ON sections(course_id, sort_order)",
        [],
    )?;

    // Task columns are populated for kind = 'task' and only then.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS subsections(
            id TEXT PRIMARY KEY,
            section_id TEXT NOT NULL,
            course_id TEXT NOT NULL,
            name TEXT NOT NULL,
            kind TEXT NOT NULL CHECK(kind IN ('lecture', 'literature', 'task', 'extra')),
            content TEXT NOT NULL DEFAULT '',
            deadline TEXT,
            max_attempts INTEGER CHECK(max_attempts IS NULL OR max_attempts >= 1),
            sort_order INTEGER NOT NULL,
            FOREIGN KEY(section_id) REFERENCES sections(id),
            FOREIGN KEY(course_id) REFERENCES courses(id),
            CHECK(kind <> 'task' OR (deadline IS NOT NULL AND max_attempts IS NOT NULL)),
            CHECK(kind = 'task' OR (deadline IS NULL AND max_attempts IS NULL))
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_subsections_section_sort ON subsections(section_id, sort_order)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_subsections_course ON subsections(course_id)",
        [],
    )?;

    // No foreign key to course_students: grades outlive enrollment.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS grades(
            task_id TEXT NOT NULL,
            student_id TEXT NOT NULL,
            passed INTEGER NOT NULL,
            attempts INTEGER NOT NULL CHECK(attempts >= 0),
            feedback TEXT,
            updated_at TEXT NOT NULL,
            PRIMARY KEY(task_id, student_id),
            FOREIGN KEY(task_id) REFERENCES subsections(id),
            FOREIGN KEY(student_id) REFERENCES users(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_grades_student ON grades(student_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS attempt_receipts(
            request_key TEXT PRIMARY KEY,
            task_id TEXT NOT NULL,
            student_id TEXT NOT NULL,
            grade_json TEXT NOT NULL,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings(
            key TEXT PRIMARY KEY,
            value_json TEXT NOT NULL
        )",
        [],
    )?;

    Ok(())
}

pub fn settings_get_json(
    conn: &Connection,
    key: &str,
) -> anyhow::Result<Option<serde_json::Value>> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT value_json FROM settings WHERE key = ?",
            [key],
            |r| r.get(0),
        )
        .optional()?;
    match raw {
        Some(s) => Ok(Some(
            serde_json::from_str(&s).with_context(|| format!("corrupt setting {key}"))?,
        )),
        None => Ok(None),
    }
}

pub fn settings_set_json(
    conn: &Connection,
    key: &str,
    value: &serde_json::Value,
) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO settings(key, value_json) VALUES(?, ?)
         ON CONFLICT(key) DO UPDATE SET value_json = excluded.value_json",
        (key, serde_json::to_string(value)?),
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn schema_bootstrap_is_repeatable() {
        let conn = open_in_memory().expect("open");
        init_schema(&conn).expect("second init");
        let n: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'grades'",
                [],
                |r| r.get(0),
            )
            .expect("count");
        assert_eq!(n, 1);
    }

    #[test]
    fn settings_round_trip_and_overwrite() {
        let conn = open_in_memory().expect("open");
        assert!(settings_get_json(&conn, "tasks").expect("get").is_none());
        settings_set_json(&conn, "tasks", &json!({ "a": 1 })).expect("set");
        settings_set_json(&conn, "tasks", &json!({ "a": 2 })).expect("overwrite");
        assert_eq!(
            settings_get_json(&conn, "tasks").expect("get"),
            Some(json!({ "a": 2 }))
        );
    }

    #[test]
    fn storage_rejects_task_fields_on_lectures() {
        let conn = open_in_memory().expect("open");
        conn.execute(
            "INSERT INTO courses(id, name, created_at) VALUES('c', 'C', '2024-01-01T00:00:00Z')",
            [],
        )
        .expect("course");
        conn.execute(
            "INSERT INTO sections(id, course_id, name, sort_order) VALUES('s', 'c', 'S', 0)",
            [],
        )
        .expect("section");
        let res = conn.execute(
            "INSERT INTO subsections(id, section_id, course_id, name, kind, max_attempts, sort_order)
             VALUES('x', 's', 'c', 'X', 'lecture', 3, 0)",
            [],
        );
        assert!(res.is_err());
        let res = conn.execute(
            "INSERT INTO subsections(id, section_id, course_id, name, kind, deadline, max_attempts, sort_order)
             VALUES('t', 's', 'c', 'T', 'task', '2024-01-01T00:00:00Z', 0, 0)",
            [],
        );
        assert!(res.is_err());
    }
}
