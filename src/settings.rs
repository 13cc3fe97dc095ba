use crate::db;
use crate::error::{LmsError, LmsResult};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

pub const TASKS_KEY: &str = "setup.tasks";

/// Workspace defaults applied when teachers create tasks and when students
/// attempt them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskSettings {
    pub default_deadline_days: i64,
    pub default_max_attempts: u32,
    pub lock_after_deadline: bool,
}

impl Default for TaskSettings {
    fn default() -> Self {
        Self {
            default_deadline_days: 7,
            default_max_attempts: 2,
            lock_after_deadline: false,
        }
    }
}

fn parse_bool(v: &Value, key: &str) -> Result<bool, String> {
    v.as_bool().ok_or_else(|| format!("{} must be boolean", key))
}

fn parse_i64_range(v: &Value, key: &str, min: i64, max: i64) -> Result<i64, String> {
    let n = v
        .as_i64()
        .ok_or_else(|| format!("{} must be integer", key))?;
    if !(min..=max).contains(&n) {
        return Err(format!("{} must be in {}..={}", key, min, max));
    }
    Ok(n)
}

fn merge_tasks_patch(current: &mut Value, patch: &Map<String, Value>) -> Result<(), String> {
    let obj = current
        .as_object_mut()
        .ok_or_else(|| "internal setup object must be a JSON object".to_string())?;
    for (k, v) in patch {
        match k.as_str() {
            "defaultDeadlineDays" => {
                obj.insert(k.clone(), Value::from(parse_i64_range(v, k, 1, 365)?));
            }
            "defaultMaxAttempts" => {
                obj.insert(k.clone(), Value::from(parse_i64_range(v, k, 1, 100)?));
            }
            "lockAfterDeadline" => {
                obj.insert(k.clone(), Value::Bool(parse_bool(v, k)?));
            }
            _ => return Err(format!("unknown tasks field: {}", k)),
        }
    }
    Ok(())
}

pub fn load_tasks_value(conn: &Connection) -> anyhow::Result<Value> {
    let mut current = json!(TaskSettings::default());
    if let Some(saved) = db::settings_get_json(conn, TASKS_KEY)? {
        if let Some(saved_obj) = saved.as_object() {
            // Malformed historical values fall back to defaults field by field.
            for (k, v) in saved_obj {
                let mut one = Map::new();
                one.insert(k.clone(), v.clone());
                let _ = merge_tasks_patch(&mut current, &one);
            }
        }
    }
    Ok(current)
}

pub fn load_task_settings(conn: &Connection) -> anyhow::Result<TaskSettings> {
    Ok(serde_json::from_value(load_tasks_value(conn)?)?)
}

pub fn update_tasks(conn: &Connection, patch: &Map<String, Value>) -> LmsResult<Value> {
    let mut current = load_tasks_value(conn)?;
    merge_tasks_patch(&mut current, patch).map_err(LmsError::Invalid)?;
    db::settings_set_json(conn, TASKS_KEY, &current)?;
    tracing::info!(settings = %current, "task settings updated");
    Ok(current)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_nothing_saved() {
        let conn = db::open_in_memory().expect("open");
        assert_eq!(
            load_task_settings(&conn).expect("load"),
            TaskSettings::default()
        );
    }

    #[test]
    fn update_validates_and_persists() {
        let conn = db::open_in_memory().expect("open");
        let patch = json!({ "defaultMaxAttempts": 3, "lockAfterDeadline": true });
        update_tasks(&conn, patch.as_object().unwrap()).expect("update");
        let s = load_task_settings(&conn).expect("load");
        assert_eq!(s.default_max_attempts, 3);
        assert!(s.lock_after_deadline);
        assert_eq!(s.default_deadline_days, 7);

        let bad = json!({ "defaultMaxAttempts": 0 });
        let e = update_tasks(&conn, bad.as_object().unwrap()).unwrap_err();
        assert_eq!(e.code(), "bad_params");
        let unknown = json!({ "colour": "red" });
        assert!(update_tasks(&conn, unknown.as_object().unwrap()).is_err());
        assert_eq!(load_task_settings(&conn).expect("load").default_max_attempts, 3);
    }

    #[test]
    fn malformed_saved_fields_fall_back_to_defaults() {
        let conn = db::open_in_memory().expect("open");
        db::settings_set_json(
            &conn,
            TASKS_KEY,
            &json!({ "defaultDeadlineDays": "soon", "defaultMaxAttempts": 4 }),
        )
        .expect("seed");
        let s = load_task_settings(&conn).expect("load");
        assert_eq!(s.default_deadline_days, 7);
        assert_eq!(s.default_max_attempts, 4);
    }
}
