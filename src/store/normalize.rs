//! Load-time repair of persisted project data.
//!
//! Persisted collections may predate the current task shape, have been edited
//! by hand, or carry gaps in their ids. Everything here works on raw
//! `serde_json::Value`s so that one bad field never costs the whole record.

use serde::de::Error as _;
use serde_json::{Map, Value};
use std::collections::HashSet;
use uuid::Uuid;

use crate::core::project::{DEFAULT_TITLE, MAX_PROJECT_ID, Project, ProjectId};
use crate::core::task::{Priority, Task, parse_due_date};

/// Projects recovered from a persisted slot.
#[derive(Debug, Default)]
pub struct Normalized {
    pub projects: Vec<Project>,
    /// First id not used by any loaded project.
    pub next_id: ProjectId,
    /// Number of fields or entries that had to be defaulted, re-keyed or dropped.
    pub repairs: usize,
}

/// Parse a persisted slot into normalized projects.
///
/// Fails only when the text is not JSON or the top level is not an array.
pub fn parse_projects(raw: &str) -> Result<Normalized, serde_json::Error> {
    let value: Value = serde_json::from_str(raw)?;
    normalize_projects(value)
}

pub fn normalize_projects(value: Value) -> Result<Normalized, serde_json::Error> {
    let Value::Array(entries) = value else {
        return Err(serde_json::Error::custom("expected an array of projects"));
    };

    let mut repairs = 0;
    let mut seen_ids = HashSet::new();
    let mut records = Vec::with_capacity(entries.len());

    for (index, entry) in entries.into_iter().enumerate() {
        let Value::Object(map) = entry else {
            log::warn!("Dropping project entry {} that is not an object", index);
            repairs += 1;
            continue;
        };
        let id = map.get("id").and_then(as_id).filter(|id| seen_ids.insert(*id));
        records.push((id, map));
    }

    // Accepted ids are at most MAX_PROJECT_ID, so this cannot overflow.
    let mut next_id = seen_ids.iter().max().map_or(0, |max| max + 1);

    let mut projects = Vec::with_capacity(records.len());
    for (id, map) in records {
        let id = match id {
            Some(id) => id,
            None if next_id > MAX_PROJECT_ID => {
                log::warn!("Dropping project without a usable id: no ids left to assign");
                repairs += 1;
                continue;
            }
            None => {
                let fresh = next_id;
                next_id += 1;
                log::debug!("Assigned id {} to project with missing, duplicate or out-of-range id", fresh);
                repairs += 1;
                fresh
            }
        };
        projects.push(normalize_project(id, map, &mut repairs));
    }

    Ok(Normalized {
        projects,
        next_id,
        repairs,
    })
}

fn normalize_project(id: ProjectId, mut map: Map<String, Value>, repairs: &mut usize) -> Project {
    let title = match map.remove("title") {
        Some(Value::String(t)) if !t.trim().is_empty() => t,
        _ => {
            *repairs += 1;
            DEFAULT_TITLE.to_string()
        }
    };

    let raw_tasks = match map.remove("tasks") {
        Some(Value::Array(items)) => items,
        Some(_) | None => {
            log::debug!("Project {} has no task list, starting empty", id);
            *repairs += 1;
            Vec::new()
        }
    };

    let mut seen = HashSet::new();
    let tasks = raw_tasks
        .into_iter()
        .enumerate()
        .filter_map(|(index, entry)| {
            let task = normalize_task(id, index, entry, &mut seen, repairs)?;
            // Rows without text are never kept or written back.
            if task.is_blank() {
                log::debug!("Dropping blank task {} of project {}", task.id, id);
                *repairs += 1;
                return None;
            }
            Some(task)
        })
        .collect();

    let is_completed_visible = match map.get("isCompletedVisible") {
        Some(Value::Bool(b)) => *b,
        // Older saves predate the flag.
        None => false,
        Some(_) => {
            *repairs += 1;
            false
        }
    };

    Project {
        id,
        title,
        tasks,
        is_completed_visible,
        revision: 0,
    }
}

fn normalize_task(
    project_id: ProjectId,
    index: usize,
    entry: Value,
    seen: &mut HashSet<String>,
    repairs: &mut usize,
) -> Option<Task> {
    let map = match entry {
        Value::Object(map) => map,
        // Early versions stored tasks as bare strings.
        Value::String(text) => {
            *repairs += 1;
            let mut fields = Map::new();
            fields.insert("text".to_string(), Value::String(text));
            fields
        }
        other => {
            log::debug!(
                "Dropping task {} of project {}: not an object ({})",
                index,
                project_id,
                other
            );
            *repairs += 1;
            return None;
        }
    };

    let id = match map.get("id") {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    };
    let id = match id.filter(|id| !seen.contains(id)) {
        Some(id) => id,
        None => {
            *repairs += 1;
            synthesize_task_id(project_id, index)
        }
    };
    seen.insert(id.clone());

    let text = match map.get("text") {
        Some(Value::String(s)) => s.clone(),
        _ => {
            *repairs += 1;
            String::new()
        }
    };

    let completed = match map.get("completed") {
        Some(Value::Bool(b)) => *b,
        _ => {
            *repairs += 1;
            false
        }
    };

    let priority = match map.get("priority").and_then(Value::as_u64).and_then(Priority::from_level) {
        Some(p) => p,
        None => {
            *repairs += 1;
            Priority::Unset
        }
    };

    let due_date = match map.get("dueDate") {
        Some(Value::Null) => None,
        Some(Value::String(s)) => {
            let parsed = parse_due_date(s);
            if parsed.is_none() {
                log::debug!("Discarding unparseable due date {:?} on task {}", s, id);
                *repairs += 1;
            }
            parsed
        }
        _ => {
            *repairs += 1;
            None
        }
    };

    Some(Task {
        id,
        text,
        completed,
        priority,
        due_date,
    })
}

/// Build a task id for a record that lacks one. The random part keeps ids
/// distinct across rapid successive loads.
pub(crate) fn synthesize_task_id(project_id: ProjectId, index: usize) -> String {
    format!("{}-{}-{}", project_id, index, Uuid::new_v4().simple())
}

fn as_id(value: &Value) -> Option<ProjectId> {
    let id = match value {
        Value::Number(n) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| *f >= 0.0 && f.fract() == 0.0 && *f <= MAX_PROJECT_ID as f64)
                .map(|f| f as u64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    id.filter(|id| *id <= MAX_PROJECT_ID)
}
