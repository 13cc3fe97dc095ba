use crate::model::Role;
use serde_json::json;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    User,
    Course,
    Section,
    Subsection,
    Task,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::User => "user",
            Self::Course => "course",
            Self::Section => "section",
            Self::Subsection => "subsection",
            Self::Task => "task",
        })
    }
}

/// Why a student-initiated attempt was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptDenied {
    Passed,
    Exhausted,
    DeadlinePassed,
}

impl AttemptDenied {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Passed => "passed",
            Self::Exhausted => "exhausted",
            Self::DeadlinePassed => "deadline_passed",
        }
    }
}

impl fmt::Display for AttemptDenied {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum LmsError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: EntityKind, id: String },
    #[error("a user with email {0} already exists")]
    DuplicateEmail(String),
    #[error("invalid task configuration: {0}")]
    InvalidTaskConfig(String),
    #[error("attempt not allowed on task {task_id}: {reason}")]
    AttemptNotAllowed {
        task_id: String,
        reason: AttemptDenied,
    },
    #[error("user {user_id} is a {actual}, expected {expected}")]
    RoleMismatch {
        user_id: String,
        expected: Role,
        actual: Role,
    },
    #[error("{0}")]
    Invalid(String),
    #[error(transparent)]
    Db(#[from] rusqlite::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type LmsResult<T> = Result<T, LmsError>;

impl LmsError {
    pub fn not_found(kind: EntityKind, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::DuplicateEmail(_) => "duplicate_email",
            Self::InvalidTaskConfig(_) => "invalid_task_config",
            Self::AttemptNotAllowed { .. } => "attempt_not_allowed",
            Self::RoleMismatch { .. } => "role_mismatch",
            Self::Invalid(_) => "bad_params",
            Self::Db(_) => "db_error",
            Self::Json(_) | Self::Other(_) => "internal_error",
        }
    }

    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            Self::NotFound { kind, id } => Some(json!({ "kind": kind.to_string(), "id": id })),
            Self::DuplicateEmail(email) => Some(json!({ "email": email })),
            Self::AttemptNotAllowed { task_id, reason } => {
                Some(json!({ "taskId": task_id, "reason": reason.as_str() }))
            }
            Self::RoleMismatch {
                user_id,
                expected,
                actual,
            } => Some(json!({
                "userId": user_id,
                "expected": expected.as_str(),
                "actual": actual.as_str()
            })),
            _ => None,
        }
    }
}
