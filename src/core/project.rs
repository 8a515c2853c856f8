use serde::{Deserialize, Serialize};

use super::task::Task;

pub type ProjectId = u64;

/// Largest project id the store hands out or accepts on load (2^53 - 1, the
/// largest integer every JSON reader round-trips exactly).
pub const MAX_PROJECT_ID: ProjectId = (1 << 53) - 1;

/// Title given to projects created or saved without one.
pub const DEFAULT_TITLE: &str = "New Project";

/// A user-named container for an ordered list of tasks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: ProjectId,
    pub title: String,
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub is_completed_visible: bool,
    /// In-memory version stamp, bumped on every successful update.
    #[serde(skip)]
    pub revision: u64,
}

impl Project {
    pub fn new(id: ProjectId, title: Option<&str>) -> Self {
        Self {
            id,
            title: title_or_default(title),
            tasks: Vec::new(),
            is_completed_visible: false,
            revision: 0,
        }
    }

    pub fn completion_ratio(&self) -> (usize, usize) {
        let total = self.tasks.len();
        let done = self.tasks.iter().filter(|t| t.completed).count();
        (done, total)
    }

    /// Tasks to show in list views; completed ones are hidden unless the
    /// project opts in.
    pub fn visible_tasks(&self) -> impl Iterator<Item = &Task> {
        let show_done = self.is_completed_visible;
        self.tasks.iter().filter(move |t| show_done || !t.completed)
    }

    pub fn task(&self, task_id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == task_id)
    }
}

pub(crate) fn title_or_default(title: Option<&str>) -> String {
    match title {
        Some(t) if !t.trim().is_empty() => t.to_string(),
        _ => DEFAULT_TITLE.to_string(),
    }
}

/// A partial project record for `ProjectStore::update`. Each field that is
/// `Some` replaces the stored field wholesale.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectPatch {
    pub title: Option<String>,
    pub tasks: Option<Vec<Task>>,
    pub is_completed_visible: Option<bool>,
}

impl ProjectPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_tasks(mut self, tasks: Vec<Task>) -> Self {
        self.tasks = Some(tasks);
        self
    }

    pub fn with_completed_visible(mut self, visible: bool) -> Self {
        self.is_completed_visible = Some(visible);
        self
    }
}
