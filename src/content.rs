use crate::error::{LmsError, LmsResult};
use crate::model::{Course, Section, Subsection, SubsectionBody, SubsectionKind};
use crate::settings;
use crate::store;
use chrono::{DateTime, Duration, Utc};
use rusqlite::Connection;
use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSubsection {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: SubsectionKind,
    #[serde(default)]
    pub content: String,
    pub deadline: Option<DateTime<Utc>>,
    pub max_attempts: Option<i64>,
}

/// Fields an admin may change on a course. Membership and sections have
/// their own operations.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CoursePatch {
    pub name: Option<String>,
    pub description: Option<String>,
}

/// Fields a caller may change on an existing subsection. Anything else in
/// the incoming patch is rejected at deserialization.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SubsectionPatch {
    pub name: Option<String>,
    pub content: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<SubsectionKind>,
    pub deadline: Option<DateTime<Utc>>,
    pub max_attempts: Option<i64>,
}

fn required_name(raw: &str, what: &str) -> LmsResult<String> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(LmsError::Invalid(format!("{what} name must not be empty")));
    }
    Ok(name.to_string())
}

fn checked_max_attempts(n: i64) -> LmsResult<u32> {
    if n < 1 {
        return Err(LmsError::InvalidTaskConfig(format!(
            "maxAttempts must be at least 1, got {n}"
        )));
    }
    u32::try_from(n)
        .map_err(|_| LmsError::InvalidTaskConfig(format!("maxAttempts too large: {n}")))
}

pub fn create_course(
    conn: &Connection,
    name: &str,
    description: &str,
    now: DateTime<Utc>,
) -> LmsResult<Course> {
    let name = required_name(name, "course")?;
    let course_id = Uuid::new_v4().to_string();
    store::insert_course(conn, &course_id, &name, description.trim(), now)?;
    tracing::info!(course_id = %course_id, "course created");
    store::get_course(conn, &course_id)
}

/// Renames a course or replaces its description. Both are trimmed and must
/// stay non-empty.
pub fn update_course(conn: &Connection, course_id: &str, patch: CoursePatch) -> LmsResult<Course> {
    let mut course = store::get_course(conn, course_id)?;
    if let Some(name) = patch.name {
        course.name = required_name(&name, "course")?;
    }
    if let Some(description) = patch.description {
        let description = description.trim();
        if description.is_empty() {
            return Err(LmsError::Invalid("course description must not be empty".into()));
        }
        course.description = description.to_string();
    }
    store::update_course_row(conn, course_id, &course.name, &course.description)?;
    tracing::info!(course_id, "course updated");
    Ok(course)
}

pub fn add_section(conn: &Connection, course_id: &str, name: &str) -> LmsResult<Section> {
    store::require_course(conn, course_id)?;
    let section = Section {
        id: Uuid::new_v4().to_string(),
        name: required_name(name, "section")?,
        course_id: course_id.to_string(),
        subsections: Vec::new(),
    };
    store::insert_section(conn, &section)?;
    tracing::info!(course_id, section_id = %section.id, "section added");
    Ok(section)
}

/// Creates a subsection at the end of its section. Tasks without an explicit
/// deadline or attempt limit take the workspace defaults; explicit values
/// are stored as given.
pub fn add_subsection(
    conn: &Connection,
    section_id: &str,
    new: NewSubsection,
    now: DateTime<Utc>,
) -> LmsResult<Subsection> {
    let section = store::get_section(conn, section_id)?;
    let name = required_name(&new.name, "subsection")?;

    let body = match SubsectionBody::plain(new.kind) {
        Some(body) => {
            if new.deadline.is_some() || new.max_attempts.is_some() {
                return Err(LmsError::InvalidTaskConfig(format!(
                    "deadline and maxAttempts only apply to tasks, not {}",
                    new.kind.as_str()
                )));
            }
            body
        }
        None => {
            let defaults = settings::load_task_settings(conn)?;
            let max_attempts = match new.max_attempts {
                Some(n) => checked_max_attempts(n)?,
                None => defaults.default_max_attempts,
            };
            let deadline = new
                .deadline
                .unwrap_or_else(|| now + Duration::days(defaults.default_deadline_days));
            SubsectionBody::Task {
                deadline,
                max_attempts,
            }
        }
    };

    let sub = Subsection {
        id: Uuid::new_v4().to_string(),
        name,
        content: new.content,
        section_id: section.id,
        course_id: section.course_id,
        body,
    };
    store::insert_subsection(conn, &sub)?;
    tracing::info!(
        subsection_id = %sub.id,
        section_id,
        kind = sub.body.kind().as_str(),
        "subsection added"
    );
    Ok(sub)
}

/// Applies a whitelisted patch. A subsection cannot be turned into a task or
/// back; task fields are only accepted on tasks.
pub fn update_subsection(
    conn: &Connection,
    subsection_id: &str,
    patch: SubsectionPatch,
) -> LmsResult<Subsection> {
    let mut sub = store::get_subsection(conn, subsection_id)?;

    if let Some(name) = patch.name {
        sub.name = required_name(&name, "subsection")?;
    }
    if let Some(content) = patch.content {
        sub.content = content;
    }
    if let Some(kind) = patch.kind {
        let is_task = matches!(sub.body, SubsectionBody::Task { .. });
        match SubsectionBody::plain(kind) {
            Some(body) if !is_task => sub.body = body,
            None if is_task => {}
            _ => {
                return Err(LmsError::InvalidTaskConfig(format!(
                    "cannot change type from {} to {}",
                    sub.body.kind().as_str(),
                    kind.as_str()
                )))
            }
        }
    }

    if patch.deadline.is_some() || patch.max_attempts.is_some() {
        let kind = sub.body.kind();
        let SubsectionBody::Task {
            deadline,
            max_attempts,
        } = &mut sub.body
        else {
            return Err(LmsError::InvalidTaskConfig(format!(
                "deadline and maxAttempts only apply to tasks, not {}",
                kind.as_str()
            )));
        };
        if let Some(d) = patch.deadline {
            *deadline = d;
        }
        if let Some(n) = patch.max_attempts {
            *max_attempts = checked_max_attempts(n)?;
        }
    }

    store::update_subsection_row(conn, &sub)?;
    tracing::info!(subsection_id, "subsection updated");
    Ok(sub)
}
