use chrono::{DateTime, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Teacher,
    Student,
}

impl Role {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Some(Self::Admin),
            "teacher" => Some(Self::Teacher),
            "student" => Some(Self::Student),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Teacher => "teacher",
            Self::Student => "student",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ToSql for Role {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for Role {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let s = value.as_str()?;
        Role::parse(s).ok_or_else(|| FromSqlError::Other(format!("unknown role: {s}").into()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: String,
    pub name: String,
    pub description: String,
    pub teacher_ids: Vec<String>,
    pub student_ids: Vec<String>,
    pub sections: Vec<Section>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    pub id: String,
    pub name: String,
    pub course_id: String,
    pub subsections: Vec<Subsection>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubsectionKind {
    Lecture,
    Literature,
    Task,
    Extra,
}

impl SubsectionKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lecture" => Some(Self::Lecture),
            "literature" => Some(Self::Literature),
            "task" => Some(Self::Task),
            "extra" => Some(Self::Extra),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Lecture => "lecture",
            Self::Literature => "literature",
            Self::Task => "task",
            Self::Extra => "extra",
        }
    }
}

impl ToSql for SubsectionKind {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for SubsectionKind {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let s = value.as_str()?;
        SubsectionKind::parse(s)
            .ok_or_else(|| FromSqlError::Other(format!("unknown subsection type: {s}").into()))
    }
}

/// Kind-specific payload of a subsection. Only tasks carry a deadline and
/// an attempt limit.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SubsectionBody {
    Lecture,
    Literature,
    Task {
        deadline: DateTime<Utc>,
        #[serde(rename = "maxAttempts")]
        max_attempts: u32,
    },
    Extra,
}

impl SubsectionBody {
    pub fn kind(&self) -> SubsectionKind {
        match self {
            Self::Lecture => SubsectionKind::Lecture,
            Self::Literature => SubsectionKind::Literature,
            Self::Task { .. } => SubsectionKind::Task,
            Self::Extra => SubsectionKind::Extra,
        }
    }

    /// Body for a non-task kind; `None` for `Task`, which needs its fields.
    pub fn plain(kind: SubsectionKind) -> Option<Self> {
        match kind {
            SubsectionKind::Lecture => Some(Self::Lecture),
            SubsectionKind::Literature => Some(Self::Literature),
            SubsectionKind::Extra => Some(Self::Extra),
            SubsectionKind::Task => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Subsection {
    pub id: String,
    pub name: String,
    pub content: String,
    pub section_id: String,
    pub course_id: String,
    #[serde(flatten)]
    pub body: SubsectionBody,
}

impl Subsection {
    pub fn as_task(&self) -> Option<Task> {
        match self.body {
            SubsectionBody::Task {
                deadline,
                max_attempts,
            } => Some(Task {
                id: self.id.clone(),
                name: self.name.clone(),
                content: self.content.clone(),
                section_id: self.section_id.clone(),
                course_id: self.course_id.clone(),
                deadline,
                max_attempts,
            }),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub name: String,
    pub content: String,
    pub section_id: String,
    pub course_id: String,
    pub deadline: DateTime<Utc>,
    pub max_attempts: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Grade {
    pub task_id: String,
    pub student_id: String,
    pub passed: bool,
    pub attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Per (task, student) state, derived from the grade row rather than stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GradeState {
    NotAttempted,
    InProgress,
    Exhausted,
    Passed,
}

impl GradeState {
    pub fn derive(grade: Option<&Grade>, max_attempts: u32) -> Self {
        match grade {
            None => Self::NotAttempted,
            Some(g) if g.passed => Self::Passed,
            Some(g) if g.attempts >= max_attempts => Self::Exhausted,
            Some(_) => Self::InProgress,
        }
    }

    pub fn accepts_attempts(self) -> bool {
        matches!(self, Self::NotAttempted | Self::InProgress)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotAttempted => "not_attempted",
            Self::InProgress => "in_progress",
            Self::Exhausted => "exhausted",
            Self::Passed => "passed",
        }
    }
}

impl fmt::Display for GradeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
