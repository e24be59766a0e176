//! Entity store: the flat cached snapshot and its persistence lifecycle.
//!
//! The snapshot lives in memory behind a lock and is persisted as a single
//! JSON aggregate in durable key-value storage, so a stale-but-available
//! cache survives restarts. Writes replace whole collections (never
//! individual elements) and rebuild a secondary index, keeping repeated
//! tree-build queries at O(children of node) instead of O(total entities).

use crate::entities::{Project, Section, Task};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use thiserror::Error;
use tracing::{debug, warn};

/// Key under which the serialized snapshot aggregate is stored.
pub const DATA_KEY: &str = "tasktree.data";
/// Key under which the currently selected task id is stored.
pub const SELECTED_TASK_KEY: &str = "tasktree.selectedTask";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage backend error: {0}")]
    Backend(String),

    #[error("corrupt snapshot: {0}")]
    Corrupt(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Durable key-value storage boundary.
///
/// Implementations:
/// - `InMemoryKv` - For testing
/// - The display host's own state storage, adapted by the embedder
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read the value stored under `key`, if any.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Store `value` under `key`, replacing any previous value.
    async fn put(&self, key: &str, value: &[u8]) -> Result<()>;

    /// Remove the value stored under `key`. Removing a missing key is not
    /// an error.
    async fn delete(&self, key: &str) -> Result<()>;
}

// Implement KeyValueStore for Arc<T> where T: KeyValueStore.
// This allows sharing a backend between store instances in tests.
#[async_trait]
impl<T: KeyValueStore + Send + Sync> KeyValueStore for Arc<T> {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        (**self).get(key).await
    }

    async fn put(&self, key: &str, value: &[u8]) -> Result<()> {
        (**self).put(key, value).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        (**self).delete(key).await
    }
}

/// In-memory key-value store for testing.
#[derive(Default)]
pub struct InMemoryKv {
    entries: RwLock<HashMap<String, Vec<u8>>>,
}

impl InMemoryKv {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for InMemoryKv {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.entries.read().unwrap().get(key).cloned())
    }

    async fn put(&self, key: &str, value: &[u8]) -> Result<()> {
        self.entries
            .write()
            .unwrap()
            .insert(key.to_string(), value.to_vec());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.write().unwrap().remove(key);
        Ok(())
    }
}

/// The full cached set of entities at a point in time.
///
/// The collections are internally consistent only immediately after a full
/// sync; partial syncs leave the others stale, which is an accepted
/// staleness window.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Snapshot {
    pub projects: Vec<Project>,
    pub sections: Vec<Section>,
    pub tasks: Vec<Task>,
    pub last_sync_time: Option<DateTime<Utc>>,
}

/// A partial snapshot: collections set here replace their cached
/// counterparts wholesale on write; `None` leaves a collection untouched.
#[derive(Debug, Default)]
pub struct SnapshotUpdate {
    pub projects: Option<Vec<Project>>,
    pub sections: Option<Vec<Section>>,
    pub tasks: Option<Vec<Task>>,
}

impl SnapshotUpdate {
    pub fn projects(projects: Vec<Project>) -> Self {
        Self {
            projects: Some(projects),
            ..Default::default()
        }
    }

    pub fn sections(sections: Vec<Section>) -> Self {
        Self {
            sections: Some(sections),
            ..Default::default()
        }
    }

    pub fn tasks(tasks: Vec<Task>) -> Self {
        Self {
            tasks: Some(tasks),
            ..Default::default()
        }
    }
}

/// Secondary index over one snapshot.
///
/// Rebuilt on every write and valid exactly as long as the snapshot it was
/// built from. Entries are positions into the snapshot's vectors, recorded
/// in input order, so index-backed listings preserve the original relative
/// order (which keeps the stable sorts meaningful).
#[derive(Debug, Default)]
pub struct SnapshotIndex {
    root_projects: Vec<usize>,
    child_projects: HashMap<String, Vec<usize>>,
    project_sections: HashMap<String, Vec<usize>>,
    project_root_tasks: HashMap<String, Vec<usize>>,
    section_tasks: HashMap<String, Vec<usize>>,
    subtasks: HashMap<String, Vec<usize>>,
    projects_by_id: HashMap<String, usize>,
    sections_by_id: HashMap<String, usize>,
    tasks_by_id: HashMap<String, usize>,
}

fn gather<'a, T>(map: &HashMap<String, Vec<usize>>, key: &str, items: &'a [T]) -> Vec<&'a T> {
    map.get(key)
        .map(|positions| positions.iter().map(|&pos| &items[pos]).collect())
        .unwrap_or_default()
}

impl SnapshotIndex {
    pub fn build(snapshot: &Snapshot) -> Self {
        let mut index = Self::default();

        for (pos, project) in snapshot.projects.iter().enumerate() {
            index.projects_by_id.insert(project.id.clone(), pos);
            match &project.parent_id {
                Some(parent_id) => index
                    .child_projects
                    .entry(parent_id.clone())
                    .or_default()
                    .push(pos),
                None => index.root_projects.push(pos),
            }
        }

        for (pos, section) in snapshot.sections.iter().enumerate() {
            index.sections_by_id.insert(section.id.clone(), pos);
            index
                .project_sections
                .entry(section.project_id.clone())
                .or_default()
                .push(pos);
        }

        // A task is indexed under exactly one relationship: its parent task
        // if it has one, else its section, else its project root.
        for (pos, task) in snapshot.tasks.iter().enumerate() {
            index.tasks_by_id.insert(task.id.clone(), pos);
            if let Some(parent_id) = &task.parent_id {
                index.subtasks.entry(parent_id.clone()).or_default().push(pos);
            } else if let Some(section_id) = &task.section_id {
                index
                    .section_tasks
                    .entry(section_id.clone())
                    .or_default()
                    .push(pos);
            } else {
                index
                    .project_root_tasks
                    .entry(task.project_id.clone())
                    .or_default()
                    .push(pos);
            }
        }

        index
    }

    pub fn project<'a>(&self, snapshot: &'a Snapshot, id: &str) -> Option<&'a Project> {
        self.projects_by_id.get(id).map(|&pos| &snapshot.projects[pos])
    }

    pub fn section<'a>(&self, snapshot: &'a Snapshot, id: &str) -> Option<&'a Section> {
        self.sections_by_id.get(id).map(|&pos| &snapshot.sections[pos])
    }

    pub fn task<'a>(&self, snapshot: &'a Snapshot, id: &str) -> Option<&'a Task> {
        self.tasks_by_id.get(id).map(|&pos| &snapshot.tasks[pos])
    }

    /// Projects with no parent (forest roots), in input order.
    pub fn root_projects<'a>(&self, snapshot: &'a Snapshot) -> Vec<&'a Project> {
        self.root_projects
            .iter()
            .map(|&pos| &snapshot.projects[pos])
            .collect()
    }

    /// Nested projects under `parent_id`, in input order.
    pub fn child_projects<'a>(&self, snapshot: &'a Snapshot, parent_id: &str) -> Vec<&'a Project> {
        gather(&self.child_projects, parent_id, &snapshot.projects)
    }

    /// Sections of a project, in input order.
    pub fn sections_of<'a>(&self, snapshot: &'a Snapshot, project_id: &str) -> Vec<&'a Section> {
        gather(&self.project_sections, project_id, &snapshot.sections)
    }

    /// Tasks sitting directly under a project (no section, no parent task).
    pub fn root_tasks_of<'a>(&self, snapshot: &'a Snapshot, project_id: &str) -> Vec<&'a Task> {
        gather(&self.project_root_tasks, project_id, &snapshot.tasks)
    }

    /// Tasks of a section, excluding sub-tasks (those surface only under
    /// their parent task).
    pub fn tasks_in_section<'a>(&self, snapshot: &'a Snapshot, section_id: &str) -> Vec<&'a Task> {
        gather(&self.section_tasks, section_id, &snapshot.tasks)
    }

    /// Sub-tasks of a task.
    pub fn subtasks_of<'a>(&self, snapshot: &'a Snapshot, task_id: &str) -> Vec<&'a Task> {
        gather(&self.subtasks, task_id, &snapshot.tasks)
    }

    pub fn has_subtasks(&self, task_id: &str) -> bool {
        self.subtasks.contains_key(task_id)
    }
}

struct CachedState {
    snapshot: Arc<Snapshot>,
    index: Arc<SnapshotIndex>,
}

/// Persistent store for the cached snapshot and the selected-task value.
///
/// The store performs no validation beyond structural shape; it is a dumb
/// persistent container. Every write persists to the backend before
/// returning to the caller. Mutation is whole-collection replacement only,
/// so readers always observe a fully-formed prior or current snapshot.
pub struct EntityStore {
    kv: Arc<dyn KeyValueStore>,
    state: RwLock<CachedState>,
    selected_task: RwLock<Option<String>>,
}

impl EntityStore {
    /// Read the persisted snapshot back from storage.
    ///
    /// Missing or corrupt data degrades to the empty snapshot: a
    /// stale-but-absent cache must not fail activation.
    pub async fn load(kv: Arc<dyn KeyValueStore>) -> Result<Self> {
        let snapshot = match kv.get(DATA_KEY).await? {
            Some(bytes) => match serde_json::from_slice::<Snapshot>(&bytes) {
                Ok(snapshot) => snapshot,
                Err(err) => {
                    warn!("discarding corrupt snapshot: {err}");
                    Snapshot::default()
                }
            },
            None => Snapshot::default(),
        };

        let selected_task = kv
            .get(SELECTED_TASK_KEY)
            .await?
            .and_then(|bytes| String::from_utf8(bytes).ok());

        debug!(
            projects = snapshot.projects.len(),
            sections = snapshot.sections.len(),
            tasks = snapshot.tasks.len(),
            "loaded cached snapshot"
        );

        let index = SnapshotIndex::build(&snapshot);
        Ok(Self {
            kv,
            state: RwLock::new(CachedState {
                snapshot: Arc::new(snapshot),
                index: Arc::new(index),
            }),
            selected_task: RwLock::new(selected_task),
        })
    }

    /// Current snapshot.
    pub fn read(&self) -> Arc<Snapshot> {
        Arc::clone(&self.state.read().unwrap().snapshot)
    }

    /// Current snapshot together with its index.
    pub fn read_indexed(&self) -> (Arc<Snapshot>, Arc<SnapshotIndex>) {
        let state = self.state.read().unwrap();
        (Arc::clone(&state.snapshot), Arc::clone(&state.index))
    }

    /// Replace the collections present in `update` wholesale, stamp the
    /// sync time, rebuild the index and persist.
    pub async fn write(&self, update: SnapshotUpdate) -> Result<()> {
        let mut snapshot = (*self.read()).clone();
        if let Some(projects) = update.projects {
            snapshot.projects = projects;
        }
        if let Some(sections) = update.sections {
            snapshot.sections = sections;
        }
        if let Some(tasks) = update.tasks {
            snapshot.tasks = tasks;
        }
        snapshot.last_sync_time = Some(Utc::now());
        self.replace(snapshot).await
    }

    /// Drop all cached entities (credential-revocation path).
    pub async fn clear(&self) -> Result<()> {
        self.replace(Snapshot::default()).await
    }

    async fn replace(&self, snapshot: Snapshot) -> Result<()> {
        // Persist first: if the backend write fails, the in-memory cache
        // still matches what is on disk.
        let bytes = serde_json::to_vec(&snapshot)?;
        self.kv.put(DATA_KEY, &bytes).await?;

        let index = SnapshotIndex::build(&snapshot);
        let mut state = self.state.write().unwrap();
        state.snapshot = Arc::new(snapshot);
        state.index = Arc::new(index);
        Ok(())
    }

    /// Task id the host last marked as selected, if any.
    pub fn selected_task(&self) -> Option<String> {
        self.selected_task.read().unwrap().clone()
    }

    pub async fn set_selected_task(&self, id: Option<String>) -> Result<()> {
        match &id {
            Some(id) => self.kv.put(SELECTED_TASK_KEY, id.as_bytes()).await?,
            None => self.kv.delete(SELECTED_TASK_KEY).await?,
        }
        *self.selected_task.write().unwrap() = id;
        Ok(())
    }
}
