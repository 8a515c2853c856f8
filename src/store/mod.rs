pub mod backend;
pub mod error;
pub mod normalize;

use std::collections::HashSet;

use crate::core::project::{MAX_PROJECT_ID, Project, ProjectId, ProjectPatch, title_or_default};
use crate::core::task::{Task, new_task_id};

pub use backend::{FileBackend, MemoryBackend, StorageBackend};
pub use error::{StoreError, StoreResult};

/// Slot name used when none is configured.
pub const DEFAULT_SLOT: &str = "projects";

/// Result of a version-checked update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The patch was applied; carries the project's new revision.
    Updated(u64),
    NotFound,
    /// The caller's copy is out of date; nothing was changed.
    Stale { current: u64 },
}

/// The single authoritative collection of projects.
///
/// Every mutation rewrites the whole collection to the backend before
/// returning. Reads hand out clones, never references into the store.
///
/// `update` is last-writer-wins: two callers that each read a project, edit
/// their copy and write it back will lose whichever edit lands first. Callers
/// that cannot serialize their edits should use `update_if_current`.
#[derive(Debug)]
pub struct ProjectStore<B: StorageBackend> {
    backend: B,
    slot: String,
    projects: Vec<Project>,
    next_id: ProjectId,
}

impl<B: StorageBackend> ProjectStore<B> {
    /// Build a store over `backend` and load whatever the slot holds.
    pub fn open(backend: B, slot: impl Into<String>) -> Self {
        let mut store = Self {
            backend,
            slot: slot.into(),
            projects: Vec::new(),
            next_id: 0,
        };
        store.initialize();
        store
    }

    /// (Re)load the collection from the backend, discarding in-memory state.
    ///
    /// Unreadable or corrupt data leaves an empty store; the fault is logged.
    pub fn initialize(&mut self) {
        self.projects.clear();
        self.next_id = 0;

        let raw = match self.backend.read(&self.slot) {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                log::info!("No saved projects in slot '{}', starting empty", self.slot);
                return;
            }
            Err(e) => {
                log::error!("Could not read projects from slot '{}': {}", self.slot, e);
                return;
            }
        };

        match normalize::parse_projects(&raw) {
            Ok(loaded) => {
                if loaded.repairs > 0 {
                    log::info!(
                        "Repaired {} malformed fields while loading slot '{}'",
                        loaded.repairs,
                        self.slot
                    );
                }
                self.projects = loaded.projects;
                self.next_id = loaded.next_id;
                log::info!(
                    "Loaded {} projects from slot '{}' (next id {})",
                    self.projects.len(),
                    self.slot,
                    self.next_id
                );
            }
            Err(e) => {
                log::error!("Could not parse projects from slot '{}': {}", self.slot, e);
            }
        }
    }

    /// Create a project with an empty task list. A missing or blank title
    /// gets the default.
    pub fn create(&mut self, title: Option<&str>) -> StoreResult<Project> {
        let id = self.next_id;
        if id > MAX_PROJECT_ID {
            log::error!("Cannot create project: all ids up to {} are used", MAX_PROJECT_ID);
            return Err(StoreError::IdsExhausted);
        }
        self.next_id = id + 1;

        let project = Project::new(id, title);
        self.projects.push(project.clone());

        if let Err(e) = self.persist() {
            self.projects.pop();
            log::error!("Failed to save new project {}: {}", id, e);
            return Err(e);
        }

        log::debug!("Created project {} '{}'", id, project.title);
        Ok(project)
    }

    pub fn list(&self) -> Vec<Project> {
        self.projects.clone()
    }

    pub fn get_by_id(&self, id: ProjectId) -> Option<Project> {
        self.projects.iter().find(|p| p.id == id).cloned()
    }

    /// Merge `patch` into a project. Returns `Ok(false)` if no project has `id`.
    pub fn update(&mut self, id: ProjectId, patch: ProjectPatch) -> StoreResult<bool> {
        let outcome = self.apply_patch(id, None, patch)?;
        Ok(matches!(outcome, UpdateOutcome::Updated(_)))
    }

    /// Merge `patch` only if the project's revision still equals
    /// `expected_revision`.
    pub fn update_if_current(
        &mut self,
        id: ProjectId,
        expected_revision: u64,
        patch: ProjectPatch,
    ) -> StoreResult<UpdateOutcome> {
        self.apply_patch(id, Some(expected_revision), patch)
    }

    /// Delete a project. Absent ids are not an error.
    pub fn remove(&mut self, id: ProjectId) -> StoreResult<()> {
        let position = self.projects.iter().position(|p| p.id == id);
        let removed = position.map(|index| (index, self.projects.remove(index)));

        if let Err(e) = self.persist() {
            if let Some((index, project)) = removed {
                self.projects.insert(index, project);
            }
            log::error!("Failed to save after removing project {}: {}", id, e);
            return Err(e);
        }

        if removed.is_some() {
            log::debug!("Removed project {}", id);
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.projects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }

    /// Id the next `create` will hand out.
    pub fn next_id(&self) -> ProjectId {
        self.next_id
    }

    pub fn slot(&self) -> &str {
        &self.slot
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn into_backend(self) -> B {
        self.backend
    }

    fn apply_patch(
        &mut self,
        id: ProjectId,
        expected_revision: Option<u64>,
        patch: ProjectPatch,
    ) -> StoreResult<UpdateOutcome> {
        let Some(index) = self.projects.iter().position(|p| p.id == id) else {
            log::debug!("Update for unknown project {}", id);
            return Ok(UpdateOutcome::NotFound);
        };

        let current = self.projects[index].revision;
        if let Some(expected) = expected_revision {
            if expected != current {
                log::debug!(
                    "Rejected stale update for project {} (expected revision {}, at {})",
                    id,
                    expected,
                    current
                );
                return Ok(UpdateOutcome::Stale { current });
            }
        }

        let previous = self.projects[index].clone();
        {
            let project = &mut self.projects[index];
            if let Some(title) = patch.title {
                project.title = title_or_default(Some(&title));
            }
            if let Some(tasks) = patch.tasks {
                project.tasks = sanitize_tasks(tasks);
            }
            if let Some(visible) = patch.is_completed_visible {
                project.is_completed_visible = visible;
            }
            project.revision += 1;
        }

        if let Err(e) = self.persist() {
            self.projects[index] = previous;
            log::error!("Failed to save update to project {}: {}", id, e);
            return Err(e);
        }

        Ok(UpdateOutcome::Updated(self.projects[index].revision))
    }

    /// Write the whole collection to the slot.
    fn persist(&mut self) -> StoreResult<()> {
        let json = serde_json::to_string(&self.projects)?;
        self.backend.write(&self.slot, &json)
    }
}

/// Prepare a caller-supplied task list for storage: blank rows are pruned,
/// rows without an id get one, and repeated ids are re-keyed so ids stay
/// unique within the project.
fn sanitize_tasks(tasks: Vec<Task>) -> Vec<Task> {
    let mut seen = HashSet::new();
    tasks
        .into_iter()
        .filter(|t| !t.is_blank())
        .map(|mut task| {
            if task.id.trim().is_empty() || seen.contains(&task.id) {
                task.id = new_task_id();
            }
            seen.insert(task.id.clone());
            task
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::task::{Priority, parse_due_date};
    use serde_json::json;

    fn memory_store() -> ProjectStore<MemoryBackend> {
        ProjectStore::open(MemoryBackend::new(), DEFAULT_SLOT)
    }

    fn restart(store: ProjectStore<MemoryBackend>) -> ProjectStore<MemoryBackend> {
        ProjectStore::open(store.into_backend(), DEFAULT_SLOT)
    }

    fn sample_task() -> Task {
        Task {
            id: "t1".to_string(),
            text: "x".to_string(),
            completed: false,
            priority: Priority::Medium,
            due_date: parse_due_date("2024-01-01"),
        }
    }

    #[test]
    fn ids_are_monotonic_across_reload() {
        let mut store = memory_store();
        let ids: Vec<_> = (0..3)
            .map(|i| store.create(Some(&format!("P{i}"))).unwrap().id)
            .collect();
        assert_eq!(ids, vec![0, 1, 2]);

        store.remove(1).unwrap();
        let mut store = restart(store);
        assert_eq!(store.create(None).unwrap().id, 3);
    }

    #[test]
    fn removing_the_newest_does_not_reuse_its_id_in_session() {
        let mut store = memory_store();
        store.create(None).unwrap();
        let last = store.create(None).unwrap();
        store.remove(last.id).unwrap();
        assert_eq!(store.create(None).unwrap().id, last.id + 1);
    }

    #[test]
    fn extreme_ids_load_without_panicking() {
        let backend = MemoryBackend::new().with_slot(
            DEFAULT_SLOT,
            r#"[{"id":18446744073709551615,"title":"edge","tasks":[]},{"id":1e300,"title":"far","tasks":[]}]"#,
        );
        let mut store = ProjectStore::open(backend, DEFAULT_SLOT);
        assert_eq!(store.len(), 2);
        assert_eq!(store.get_by_id(0).unwrap().title, "edge");
        assert_eq!(store.get_by_id(1).unwrap().title, "far");
        assert_eq!(store.create(None).unwrap().id, 2);
    }

    #[test]
    fn create_fails_cleanly_when_ids_run_out() {
        let slot = format!(r#"[{{"id":{},"title":"last","tasks":[]}}]"#, MAX_PROJECT_ID);
        let backend = MemoryBackend::new().with_slot(DEFAULT_SLOT, slot);
        let mut store = ProjectStore::open(backend, DEFAULT_SLOT);
        assert_eq!(store.next_id(), MAX_PROJECT_ID + 1);

        let err = store.create(Some("one too many")).unwrap_err();
        assert!(matches!(err, StoreError::IdsExhausted));
        assert_eq!(store.len(), 1);
        assert_eq!(store.backend().write_count(), 0);
        assert_eq!(store.next_id(), MAX_PROJECT_ID + 1);
    }

    #[test]
    fn blank_loaded_tasks_are_never_written_back() {
        let backend = MemoryBackend::new().with_slot(
            DEFAULT_SLOT,
            r#"[{"id":0,"title":"Old","tasks":[{"id":"a"},{"id":"b","text":"real"}]}]"#,
        );
        let mut store = ProjectStore::open(backend, DEFAULT_SLOT);
        store.create(Some("trigger a write")).unwrap();

        let saved: serde_json::Value =
            serde_json::from_str(&store.backend().slot(DEFAULT_SLOT).unwrap()).unwrap();
        let tasks = saved[0]["tasks"].as_array().unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0]["id"], json!("b"));
    }

    #[test]
    fn create_uses_default_title_and_persists() {
        let mut store = memory_store();
        let project = store.create(None).unwrap();
        assert_eq!(project.title, "New Project");
        assert!(project.tasks.is_empty());

        let saved: serde_json::Value =
            serde_json::from_str(&store.backend().slot(DEFAULT_SLOT).unwrap()).unwrap();
        assert_eq!(
            saved,
            json!([{ "id": 0, "title": "New Project", "tasks": [], "isCompletedVisible": false }])
        );
    }

    #[test]
    fn reads_are_isolated_copies() {
        let mut store = memory_store();
        let id = store.create(Some("Original")).unwrap().id;
        store
            .update(id, ProjectPatch::new().with_tasks(vec![Task::new("keep")]))
            .unwrap();

        let mut listed = store.list();
        listed[0].title = "Changed".to_string();
        listed[0].tasks.clear();

        let mut fetched = store.get_by_id(id).unwrap();
        fetched.tasks.push(Task::new("sneaky"));
        fetched.tasks[0].completed = true;

        let again = store.get_by_id(id).unwrap();
        assert_eq!(again.title, "Original");
        assert_eq!(again.tasks.len(), 1);
        assert!(!again.tasks[0].completed);
    }

    #[test]
    fn title_update_leaves_tasks_alone() {
        let mut store = memory_store();
        let id = store.create(Some("A")).unwrap().id;
        store
            .update(id, ProjectPatch::new().with_tasks(vec![sample_task()]))
            .unwrap();

        assert!(store.update(id, ProjectPatch::new().with_title("X")).unwrap());
        let project = store.get_by_id(id).unwrap();
        assert_eq!(project.title, "X");
        assert_eq!(project.tasks, vec![sample_task()]);
        assert!(!project.is_completed_visible);
    }

    #[test]
    fn missing_project_is_not_fatal() {
        let mut store = memory_store();
        store.create(Some("only")).unwrap();
        let before = store.list();
        let writes = store.backend().write_count();

        assert!(!store.update(999, ProjectPatch::new().with_title("nope")).unwrap());
        assert_eq!(store.list(), before);
        assert_eq!(store.backend().write_count(), writes);
        assert!(store.get_by_id(999).is_none());
    }

    #[test]
    fn legacy_project_without_tasks_loads_empty() {
        let backend = MemoryBackend::new()
            .with_slot(DEFAULT_SLOT, r#"[{"id":0,"title":"Read a book"},{"id":1,"title":"Play a game"}]"#);
        let store = ProjectStore::open(backend, DEFAULT_SLOT);
        let project = store.get_by_id(0).unwrap();
        assert_eq!(project.title, "Read a book");
        assert!(project.tasks.is_empty());
        assert_eq!(store.next_id(), 2);
    }

    #[test]
    fn round_trip_through_restart() {
        let mut store = memory_store();
        let id = store.create(Some("A")).unwrap().id;
        store
            .update(id, ProjectPatch::new().with_tasks(vec![sample_task()]))
            .unwrap();

        let store = restart(store);
        let project = store.get_by_id(id).unwrap();
        assert_eq!(project.title, "A");
        assert_eq!(project.tasks, vec![sample_task()]);
        assert_eq!(
            serde_json::to_value(&project.tasks[0]).unwrap(),
            json!({ "id": "t1", "text": "x", "completed": false, "priority": 2, "dueDate": "2024-01-01" })
        );
    }

    #[test]
    fn remove_is_idempotent() {
        let mut store = memory_store();
        let keep = store.create(Some("keep")).unwrap().id;
        let gone = store.create(Some("gone")).unwrap().id;

        store.remove(gone).unwrap();
        let after_first = store.list();
        store.remove(gone).unwrap();
        assert_eq!(store.list(), after_first);
        assert_eq!(after_first.len(), 1);
        assert_eq!(after_first[0].id, keep);
    }

    #[test]
    fn corrupt_slot_starts_empty() {
        let backend = MemoryBackend::new().with_slot(DEFAULT_SLOT, "{not json");
        let mut store = ProjectStore::open(backend, DEFAULT_SLOT);
        assert!(store.is_empty());
        assert_eq!(store.next_id(), 0);
        assert_eq!(store.create(None).unwrap().id, 0);
    }

    #[test]
    fn task_lists_are_sanitized_on_update() {
        let mut store = memory_store();
        let id = store.create(None).unwrap().id;

        let mut unnamed = Task::new("no id");
        unnamed.id.clear();
        let mut twin = Task::new("twin");
        twin.id = "t1".to_string();

        store
            .update(
                id,
                ProjectPatch::new().with_tasks(vec![sample_task(), Task::new("   "), unnamed, twin]),
            )
            .unwrap();

        let tasks = store.get_by_id(id).unwrap().tasks;
        assert_eq!(tasks.len(), 3);
        assert_eq!(tasks[0].id, "t1");
        assert!(!tasks[1].id.is_empty());
        assert_eq!(tasks[2].text, "twin");
        assert_ne!(tasks[2].id, "t1");
    }

    #[test]
    fn task_ids_survive_edits() {
        let mut store = memory_store();
        let id = store.create(None).unwrap().id;
        store
            .update(id, ProjectPatch::new().with_tasks(vec![Task::new("draft")]))
            .unwrap();

        let mut tasks = store.get_by_id(id).unwrap().tasks;
        let task_id = tasks[0].id.clone();
        tasks[0].text = "final".to_string();
        tasks[0].complete();
        store.update(id, ProjectPatch::new().with_tasks(tasks)).unwrap();

        let store = restart(store);
        let task = store.get_by_id(id).unwrap().tasks.remove(0);
        assert_eq!(task.id, task_id);
        assert_eq!(task.text, "final");
        assert!(task.completed);
    }

    #[test]
    fn blank_title_update_gets_placeholder() {
        let mut store = memory_store();
        let id = store.create(Some("Named")).unwrap().id;
        store.update(id, ProjectPatch::new().with_title("")).unwrap();
        assert_eq!(store.get_by_id(id).unwrap().title, "New Project");
    }

    #[test]
    fn failed_write_rolls_back_memory() {
        let mut store = memory_store();
        let id = store.create(Some("stable")).unwrap().id;

        store.backend_mut().set_fail_writes(true);
        assert!(store.create(Some("lost")).is_err());
        assert!(store.update(id, ProjectPatch::new().with_title("lost")).is_err());
        assert!(store.remove(id).is_err());

        assert_eq!(store.len(), 1);
        assert_eq!(store.get_by_id(id).unwrap().title, "stable");
        assert_eq!(store.get_by_id(id).unwrap().revision, 0);

        store.backend_mut().set_fail_writes(false);
        // The id handed to the failed create is not reused.
        assert_eq!(store.create(None).unwrap().id, 2);
    }

    #[test]
    fn stale_revision_is_rejected() {
        let mut store = memory_store();
        let id = store.create(Some("shared")).unwrap().id;

        let editor_a = store.get_by_id(id).unwrap();
        let editor_b = store.get_by_id(id).unwrap();

        let mut tasks = editor_a.tasks.clone();
        tasks.push(Task::new("from a"));
        let outcome = store
            .update_if_current(id, editor_a.revision, ProjectPatch::new().with_tasks(tasks))
            .unwrap();
        assert_eq!(outcome, UpdateOutcome::Updated(1));

        let mut tasks = editor_b.tasks.clone();
        tasks.push(Task::new("from b"));
        let outcome = store
            .update_if_current(id, editor_b.revision, ProjectPatch::new().with_tasks(tasks))
            .unwrap();
        assert_eq!(outcome, UpdateOutcome::Stale { current: 1 });

        let project = store.get_by_id(id).unwrap();
        assert_eq!(project.tasks.len(), 1);
        assert_eq!(project.tasks[0].text, "from a");

        assert_eq!(
            store
                .update_if_current(42, 0, ProjectPatch::new())
                .unwrap(),
            UpdateOutcome::NotFound
        );
    }

    #[test]
    fn file_backed_store_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = ProjectStore::open(FileBackend::new(dir.path()), DEFAULT_SLOT);
        let id = store.create(Some("On disk")).unwrap().id;
        store
            .update(id, ProjectPatch::new().with_completed_visible(true))
            .unwrap();
        drop(store);

        let store = ProjectStore::open(FileBackend::new(dir.path()), DEFAULT_SLOT);
        let project = store.get_by_id(id).unwrap();
        assert_eq!(project.title, "On disk");
        assert!(project.is_completed_visible);
        assert_eq!(store.next_id(), id + 1);
    }
}
