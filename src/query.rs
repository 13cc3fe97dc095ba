//! Read-side views for dashboards: task lists joined with course names and
//! grade state, bucketed by deadline and completion.

use crate::error::LmsResult;
use crate::grading;
use crate::model::{Grade, GradeState, Role, Task};
use crate::settings;
use crate::store::{self, Membership};
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Upcoming,
    Completed,
    PastDue,
}

pub fn classify(state: GradeState, deadline: DateTime<Utc>, now: DateTime<Utc>) -> TaskStatus {
    if state == GradeState::Passed {
        TaskStatus::Completed
    } else if deadline <= now {
        TaskStatus::PastDue
    } else {
        TaskStatus::Upcoming
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskView {
    pub task: Task,
    pub course_name: String,
    pub grade: Option<Grade>,
    pub state: GradeState,
    pub can_attempt: bool,
    pub remaining_attempts: u32,
    pub status: TaskStatus,
}

fn view(
    conn: &Connection,
    task: Task,
    course_name: &str,
    student_id: Option<&str>,
    lock_after_deadline: bool,
    now: DateTime<Utc>,
) -> LmsResult<TaskView> {
    let grade = match student_id {
        Some(sid) => store::grade_for(conn, sid, &task.id)?,
        None => None,
    };
    let state = grading::grade_state(grade.as_ref(), &task);
    let remaining_attempts = match &grade {
        Some(g) => task.max_attempts.saturating_sub(g.attempts),
        None => task.max_attempts,
    };
    Ok(TaskView {
        status: classify(state, task.deadline, now),
        can_attempt: grading::attempt_denied(state, &task, now, lock_after_deadline).is_none(),
        course_name: course_name.to_string(),
        remaining_attempts,
        state,
        grade,
        task,
    })
}

fn course_views(
    conn: &Connection,
    course_id: &str,
    student_id: Option<&str>,
    lock_after_deadline: bool,
    now: DateTime<Utc>,
) -> LmsResult<Vec<TaskView>> {
    let course_name = store::course_name(conn, course_id)?;
    store::tasks_for_course(conn, course_id)?
        .into_iter()
        .map(|t| view(conn, t, &course_name, student_id, lock_after_deadline, now))
        .collect()
}

fn require_student(conn: &Connection, student_id: &str) -> LmsResult<()> {
    let student = store::get_user(conn, student_id)?;
    store::require_role(&student, Role::Student)
}

/// Tasks of one course. With a student, each view carries that student's
/// grade; without one every task reads as not attempted, which buckets by
/// deadline alone.
pub fn tasks_for_course(
    conn: &Connection,
    course_id: &str,
    student_id: Option<&str>,
    now: DateTime<Utc>,
) -> LmsResult<Vec<TaskView>> {
    store::require_course(conn, course_id)?;
    if let Some(sid) = student_id {
        require_student(conn, sid)?;
    }
    let lock = settings::load_task_settings(conn)?.lock_after_deadline;
    course_views(conn, course_id, student_id, lock, now)
}

/// Tasks across every course the student is enrolled in.
pub fn tasks_for_student(
    conn: &Connection,
    student_id: &str,
    now: DateTime<Utc>,
) -> LmsResult<Vec<TaskView>> {
    require_student(conn, student_id)?;
    let lock = settings::load_task_settings(conn)?.lock_after_deadline;

    let mut out = Vec::new();
    for course_id in store::course_ids_for_member(conn, student_id, Membership::Student)? {
        out.extend(course_views(conn, &course_id, Some(student_id), lock, now)?);
    }
    tracing::debug!(student_id, count = out.len(), "student tasks loaded");
    Ok(out)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskBoard {
    pub upcoming: Vec<TaskView>,
    pub completed: Vec<TaskView>,
    pub past_due: Vec<TaskView>,
}

impl TaskBoard {
    /// Upcoming tasks soonest first; completed and past-due most recent
    /// deadline first. Ties keep their input order.
    pub fn from_views(views: impl IntoIterator<Item = TaskView>) -> Self {
        let mut board = Self::default();
        for v in views {
            match v.status {
                TaskStatus::Upcoming => board.upcoming.push(v),
                TaskStatus::Completed => board.completed.push(v),
                TaskStatus::PastDue => board.past_due.push(v),
            }
        }
        board.upcoming.sort_by_key(|v| v.task.deadline);
        board
            .completed
            .sort_by(|a, b| b.task.deadline.cmp(&a.task.deadline));
        board
            .past_due
            .sort_by(|a, b| b.task.deadline.cmp(&a.task.deadline));
        board
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseProgress {
    pub course_id: String,
    pub course_name: String,
    pub completed_tasks: usize,
    pub total_tasks: usize,
    pub progress: f64,
}

pub fn course_progress(
    conn: &Connection,
    student_id: &str,
    now: DateTime<Utc>,
) -> LmsResult<Vec<CourseProgress>> {
    require_student(conn, student_id)?;
    let lock = settings::load_task_settings(conn)?.lock_after_deadline;

    let mut out = Vec::new();
    for course_id in store::course_ids_for_member(conn, student_id, Membership::Student)? {
        let views = course_views(conn, &course_id, Some(student_id), lock, now)?;
        let total_tasks = views.len();
        let completed_tasks = views
            .iter()
            .filter(|v| v.state == GradeState::Passed)
            .count();
        let progress = if total_tasks > 0 {
            100.0 * completed_tasks as f64 / total_tasks as f64
        } else {
            0.0
        };
        out.push(CourseProgress {
            course_name: store::course_name(conn, &course_id)?,
            course_id,
            completed_tasks,
            total_tasks,
            progress,
        });
    }
    Ok(out)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardCounts {
    pub admins: i64,
    pub teachers: i64,
    pub students: i64,
    pub courses: i64,
}

pub fn dashboard_counts(conn: &Connection) -> LmsResult<DashboardCounts> {
    Ok(DashboardCounts {
        admins: store::count_users_by_role(conn, Role::Admin)?,
        teachers: store::count_users_by_role(conn, Role::Teacher)?,
        students: store::count_users_by_role(conn, Role::Student)?,
        courses: store::count_courses(conn)?,
    })
}
