//! Demo fixture: three courses, six users and a few grades, loaded into an
//! empty workspace so the UI has something to show.

use crate::error::LmsResult;
use crate::model::{Grade, Role, Section, Subsection, SubsectionBody, User};
use crate::store::{self, Membership};
use chrono::{DateTime, Duration, Utc};
use rusqlite::Connection;

const USERS: &[(&str, &str, &str, Role)] = &[
    ("1", "Admin User", "admin@university.edu", Role::Admin),
    ("2", "Teacher One", "teacher1@university.edu", Role::Teacher),
    ("3", "Teacher Two", "teacher2@university.edu", Role::Teacher),
    ("4", "Student One", "student1@university.edu", Role::Student),
    ("5", "Student Two", "student2@university.edu", Role::Student),
    ("6", "Student Three", "student3@university.edu", Role::Student),
];

struct CourseRow {
    id: &'static str,
    name: &'static str,
    description: &'static str,
    teachers: &'static [&'static str],
    students: &'static [&'static str],
}

const COURSES: &[CourseRow] = &[
    CourseRow {
        id: "1",
        name: "Introduction to Computer Science",
        description: "A foundational course covering basic computer science concepts.",
        teachers: &["2"],
        students: &["4", "5"],
    },
    CourseRow {
        id: "2",
        name: "Advanced Mathematics",
        description: "An in-depth exploration of advanced mathematical concepts.",
        teachers: &["2", "3"],
        students: &["4", "6"],
    },
    CourseRow {
        id: "3",
        name: "Physics 101",
        description: "An introduction to basic physics principles and theories.",
        teachers: &["3"],
        students: &["5", "6"],
    },
];

// (id, course, name)
const SECTIONS: &[(&str, &str, &str)] = &[
    ("1", "1", "Week 1: Introduction"),
    ("2", "1", "Week 2: Basic Algorithms"),
    ("3", "2", "Week 1: Fundamentals"),
    ("4", "3", "Week 1: Mechanics"),
];

fn subsections(now: DateTime<Utc>) -> Vec<Subsection> {
    let sub = |id: &str, section: &str, course: &str, name: &str, content: &str, body| Subsection {
        id: id.into(),
        name: name.into(),
        content: content.into(),
        section_id: section.into(),
        course_id: course.into(),
        body,
    };
    vec![
        sub(
            "1",
            "1",
            "1",
            "Lecture: Course Overview",
            "<h1>Welcome to Computer Science</h1><p>This course will cover the fundamentals of computer science...</p>",
            SubsectionBody::Lecture,
        ),
        sub(
            "2",
            "1",
            "1",
            "Literature: Introduction to Algorithms",
            "<h2>Required Reading</h2><ul><li>Chapter 1 of Introduction to Algorithms</li><li>Article on Big O Notation</li></ul>",
            SubsectionBody::Literature,
        ),
        sub(
            "3",
            "2",
            "1",
            "Task: Algorithm Quiz",
            "<h2>Quiz Instructions</h2><p>Complete the quiz on basic algorithm concepts.</p>",
            SubsectionBody::Task {
                deadline: now + Duration::days(7),
                max_attempts: 2,
            },
        ),
        sub(
            "4",
            "3",
            "2",
            "Lecture: Mathematics Fundamentals",
            "<h1>Mathematics Fundamentals</h1><p>This lecture covers the basic principles of advanced mathematics...</p>",
            SubsectionBody::Lecture,
        ),
        sub(
            "5",
            "3",
            "2",
            "Task: Mathematics Problem Set",
            "<h2>Problem Set</h2><p>Complete the following problems...</p>",
            SubsectionBody::Task {
                deadline: now + Duration::days(14),
                max_attempts: 3,
            },
        ),
    ]
}

// (task, student, passed, attempts, feedback)
const GRADES: &[(&str, &str, bool, u32, &str)] = &[
    ("3", "4", true, 1, "Excellent work!"),
    ("3", "5", false, 1, "Please review the material and try again."),
    ("5", "4", true, 2, "Good job on the second attempt."),
];

/// Loads the fixture when the workspace has no users yet. Returns whether
/// anything was written.
pub fn seed_demo(conn: &Connection, now: DateTime<Utc>) -> LmsResult<bool> {
    let existing: i64 = conn.query_row("SELECT COUNT(*) FROM users", [], |r| r.get(0))?;
    if existing > 0 {
        tracing::info!(existing, "workspace already has users; demo seed skipped");
        return Ok(false);
    }

    let tx = conn.unchecked_transaction()?;
    for &(id, name, email, role) in USERS {
        let user = User {
            id: id.into(),
            name: name.into(),
            email: email.into(),
            role,
        };
        store::insert_user(&tx, &user, now)?;
    }
    for c in COURSES {
        store::insert_course(&tx, c.id, c.name, c.description, now)?;
        for t in c.teachers {
            store::insert_member(&tx, c.id, t, Membership::Teacher)?;
        }
        for s in c.students {
            store::insert_member(&tx, c.id, s, Membership::Student)?;
        }
    }
    for &(id, course_id, name) in SECTIONS {
        let section = Section {
            id: id.into(),
            name: name.into(),
            course_id: course_id.into(),
            subsections: Vec::new(),
        };
        store::insert_section(&tx, &section)?;
    }
    for sub in subsections(now) {
        store::insert_subsection(&tx, &sub)?;
    }
    for &(task_id, student_id, passed, attempts, feedback) in GRADES {
        let grade = Grade {
            task_id: task_id.into(),
            student_id: student_id.into(),
            passed,
            attempts,
            feedback: Some(feedback.into()),
            updated_at: now,
        };
        store::upsert_grade(&tx, &grade)?;
    }
    tx.commit()?;

    tracing::info!(
        users = USERS.len(),
        courses = COURSES.len(),
        "demo workspace seeded"
    );
    Ok(true)
}
