//! Attempt bookkeeping and grade records.
//!
//! A (task, student) pair moves through `NotAttempted -> InProgress ->
//! {Exhausted | Passed}`; the state is derived from the grade row on every
//! read. Student attempts go through [`attempt_task`], which checks
//! eligibility and writes the grade inside one IMMEDIATE transaction so two
//! racing submissions cannot both pass the check. Teachers bypass the
//! attempt rules with [`override_grade`].

use crate::error::{AttemptDenied, LmsError, LmsResult};
use crate::model::{Grade, GradeState, Role, Task};
use crate::settings;
use crate::store;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use serde::Serialize;

#[derive(Debug, Clone, Copy)]
pub struct AttemptRequest<'a> {
    pub task_id: &'a str,
    pub student_id: &'a str,
    pub passed: bool,
    pub feedback: Option<&'a str>,
    /// Caller-chosen key; replaying it returns the first outcome instead of
    /// counting another attempt.
    pub request_key: Option<&'a str>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptOutcome {
    pub grade: Grade,
    pub state: GradeState,
    pub can_attempt: bool,
    pub remaining_attempts: u32,
    pub replayed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Eligibility {
    pub task_id: String,
    pub student_id: String,
    pub state: GradeState,
    pub attempts: u32,
    pub max_attempts: u32,
    pub remaining_attempts: u32,
    /// Whether [`attempt_task`] would accept an attempt right now, including
    /// the deadline lock when it is enabled.
    pub can_attempt: bool,
    pub deadline_passed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStats {
    pub task_id: String,
    pub total_submissions: usize,
    pub passed: usize,
    pub pending: usize,
}

pub fn grade_state(grade: Option<&Grade>, task: &Task) -> GradeState {
    GradeState::derive(grade, task.max_attempts)
}

fn remaining_for(grade: Option<&Grade>, task: &Task) -> u32 {
    match grade {
        None => task.max_attempts,
        Some(g) => task.max_attempts.saturating_sub(g.attempts),
    }
}

/// Why a student attempt would be refused right now, or `None` when it
/// would be accepted.
pub fn attempt_denied(
    state: GradeState,
    task: &Task,
    now: DateTime<Utc>,
    lock_after_deadline: bool,
) -> Option<AttemptDenied> {
    match state {
        GradeState::Passed => Some(AttemptDenied::Passed),
        GradeState::Exhausted => Some(AttemptDenied::Exhausted),
        _ if lock_after_deadline && task.deadline <= now => Some(AttemptDenied::DeadlinePassed),
        _ => None,
    }
}

/// Grade after one counted attempt. Feedback is only replaced when the new
/// one is non-empty.
fn next_grade(
    existing: Option<Grade>,
    task: &Task,
    student_id: &str,
    passed: bool,
    feedback: Option<&str>,
    now: DateTime<Utc>,
) -> Grade {
    let feedback = feedback.filter(|f| !f.trim().is_empty()).map(str::to_string);
    match existing {
        Some(mut g) => {
            g.passed = passed;
            g.attempts += 1;
            if feedback.is_some() {
                g.feedback = feedback;
            }
            g.updated_at = now;
            g
        }
        None => Grade {
            task_id: task.id.clone(),
            student_id: student_id.to_string(),
            passed,
            attempts: 1,
            feedback,
            updated_at: now,
        },
    }
}

fn outcome(grade: Grade, task: &Task, replayed: bool) -> AttemptOutcome {
    let state = grade_state(Some(&grade), task);
    AttemptOutcome {
        remaining_attempts: remaining_for(Some(&grade), task),
        can_attempt: state.accepts_attempts(),
        state,
        grade,
        replayed,
    }
}

fn require_student(conn: &Connection, student_id: &str) -> LmsResult<()> {
    let student = store::get_user(conn, student_id)?;
    store::require_role(&student, Role::Student)
}

pub fn grade_for(conn: &Connection, student_id: &str, task_id: &str) -> LmsResult<Option<Grade>> {
    store::grade_for(conn, student_id, task_id)
}

pub fn can_attempt(conn: &Connection, student_id: &str, task: &Task) -> LmsResult<bool> {
    let grade = store::grade_for(conn, student_id, &task.id)?;
    Ok(grade_state(grade.as_ref(), task).accepts_attempts())
}

pub fn remaining_attempts(conn: &Connection, student_id: &str, task: &Task) -> LmsResult<u32> {
    let grade = store::grade_for(conn, student_id, &task.id)?;
    Ok(remaining_for(grade.as_ref(), task))
}

pub fn eligibility(
    conn: &Connection,
    task_id: &str,
    student_id: &str,
    now: DateTime<Utc>,
) -> LmsResult<Eligibility> {
    let task = store::get_task(conn, task_id)?;
    require_student(conn, student_id)?;
    let grade = store::grade_for(conn, student_id, task_id)?;
    let state = grade_state(grade.as_ref(), &task);
    let lock = settings::load_task_settings(conn)?.lock_after_deadline;
    Ok(Eligibility {
        task_id: task.id.clone(),
        student_id: student_id.to_string(),
        state,
        attempts: grade.as_ref().map(|g| g.attempts).unwrap_or(0),
        max_attempts: task.max_attempts,
        remaining_attempts: remaining_for(grade.as_ref(), &task),
        can_attempt: attempt_denied(state, &task, now, lock).is_none(),
        deadline_passed: task.deadline <= now,
    })
}

/// Records one student attempt, refusing it once the task is passed or the
/// attempts are used up.
pub fn attempt_task(
    conn: &Connection,
    req: &AttemptRequest<'_>,
    now: DateTime<Utc>,
) -> LmsResult<AttemptOutcome> {
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;

    if let Some(key) = req.request_key {
        if let Some(receipt) = store::find_receipt(&tx, key)? {
            if receipt.task_id != req.task_id || receipt.student_id != req.student_id {
                return Err(LmsError::Invalid(format!(
                    "request key {key} belongs to a different attempt"
                )));
            }
            let task = store::get_task(&tx, req.task_id)?;
            tracing::debug!(request_key = key, "attempt replayed from receipt");
            return Ok(outcome(receipt.grade, &task, true));
        }
    }

    let task = store::get_task(&tx, req.task_id)?;
    require_student(&tx, req.student_id)?;
    let existing = store::grade_for(&tx, req.student_id, req.task_id)?;
    let state = grade_state(existing.as_ref(), &task);
    let lock = settings::load_task_settings(&tx)?.lock_after_deadline;
    if let Some(reason) = attempt_denied(state, &task, now, lock) {
        tracing::warn!(
            task_id = req.task_id,
            student_id = req.student_id,
            reason = reason.as_str(),
            "attempt refused"
        );
        return Err(LmsError::AttemptNotAllowed {
            task_id: task.id,
            reason,
        });
    }

    let grade = next_grade(existing, &task, req.student_id, req.passed, req.feedback, now);
    store::upsert_grade(&tx, &grade)?;
    if let Some(key) = req.request_key {
        store::insert_receipt(&tx, key, &grade, now)?;
    }
    tx.commit()?;

    tracing::info!(
        task_id = req.task_id,
        student_id = req.student_id,
        attempts = grade.attempts,
        passed = grade.passed,
        "attempt recorded"
    );
    Ok(outcome(grade, &task, false))
}

/// `submitGrade` entry point: one counted attempt, same rules as
/// [`attempt_task`].
pub fn submit_grade(
    conn: &Connection,
    task_id: &str,
    student_id: &str,
    passed: bool,
    feedback: Option<&str>,
    now: DateTime<Utc>,
) -> LmsResult<Grade> {
    let req = AttemptRequest {
        task_id,
        student_id,
        passed,
        feedback,
        request_key: None,
    };
    attempt_task(conn, &req, now).map(|o| o.grade)
}

/// Teacher-forced grade change. Does not count an attempt and ignores the
/// attempt rules; a grade created this way starts at zero attempts.
pub fn override_grade(
    conn: &Connection,
    grader_id: &str,
    task_id: &str,
    student_id: &str,
    passed: bool,
    feedback: Option<&str>,
    now: DateTime<Utc>,
) -> LmsResult<Grade> {
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;

    let grader = store::get_user(&tx, grader_id)?;
    if grader.role == Role::Student {
        return Err(LmsError::RoleMismatch {
            user_id: grader.id,
            expected: Role::Teacher,
            actual: grader.role,
        });
    }
    let task = store::get_task(&tx, task_id)?;
    require_student(&tx, student_id)?;

    let feedback = feedback.filter(|f| !f.trim().is_empty()).map(str::to_string);
    let grade = match store::grade_for(&tx, student_id, task_id)? {
        Some(mut g) => {
            g.passed = passed;
            if feedback.is_some() {
                g.feedback = feedback;
            }
            g.updated_at = now;
            g
        }
        None => Grade {
            task_id: task.id.clone(),
            student_id: student_id.to_string(),
            passed,
            attempts: 0,
            feedback,
            updated_at: now,
        },
    };
    store::upsert_grade(&tx, &grade)?;
    tx.commit()?;

    tracing::info!(task_id, student_id, grader_id, passed, "grade overridden");
    Ok(grade)
}

pub fn grades_for_student(conn: &Connection, student_id: &str) -> LmsResult<Vec<Grade>> {
    store::get_user(conn, student_id)?;
    store::grades_for_student(conn, student_id)
}

pub fn grades_for_task(conn: &Connection, task_id: &str) -> LmsResult<Vec<Grade>> {
    store::get_task(conn, task_id)?;
    store::grades_for_task(conn, task_id)
}

pub fn task_stats(conn: &Connection, task_id: &str) -> LmsResult<TaskStats> {
    let grades = grades_for_task(conn, task_id)?;
    let passed = grades.iter().filter(|g| g.passed).count();
    Ok(TaskStats {
        task_id: task_id.to_string(),
        total_submissions: grades.len(),
        passed,
        pending: grades.len() - passed,
    })
}
