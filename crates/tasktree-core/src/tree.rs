//! Tree construction: computes the ordered children of any node from the
//! current snapshot.
//!
//! The builder never fails: a render-path query degrades to an empty list.
//! When the cache is cold it kicks off a background fetch through the sync
//! coordinator and returns a partial result immediately; the change bus
//! fires once the fetch lands and the display host re-queries. This is an
//! eventual-consistency contract, not a blocking read.

use crate::entities::{Project, Section, Task};
use crate::events::ChangeBus;
use crate::sort::{SortSetting, sort_tasks};
use crate::store::{EntityStore, Snapshot, SnapshotIndex};
use crate::sync::SyncCoordinator;
use chrono::NaiveDate;
use std::sync::Arc;
use tracing::warn;

/// Render disposition of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// No children; render flat.
    Leaf,
    /// Has (or may have) children; rendered collapsed so deep subtrees are
    /// not computed eagerly.
    Collapsed,
    Expanded,
}

/// The entity a node was produced from.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeSource {
    Project(Project),
    Section(Section),
    Task(Task),
}

/// One display-tree element.
///
/// `id` is stable across rebuilds so the display host can diff; `source`
/// carries a copy of the entity for the detail projector.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: String,
    pub label: String,
    pub tooltip: Option<String>,
    pub disposition: Disposition,
    pub source: NodeSource,
}

impl Node {
    fn project(project: &Project) -> Self {
        Node {
            id: project.id.clone(),
            label: project.name.clone(),
            tooltip: Some(project.name.clone()),
            disposition: Disposition::Collapsed,
            source: NodeSource::Project(project.clone()),
        }
    }

    fn section(section: &Section) -> Self {
        Node {
            id: section.id.clone(),
            label: section.name.clone(),
            tooltip: Some(section.name.clone()),
            disposition: Disposition::Collapsed,
            source: NodeSource::Section(section.clone()),
        }
    }

    fn task(task: &Task, has_subtasks: bool) -> Self {
        Node {
            id: task.id.clone(),
            label: task.content.clone(),
            tooltip: Some(task.content.clone()),
            disposition: if has_subtasks {
                Disposition::Collapsed
            } else {
                Disposition::Leaf
            },
            source: NodeSource::Task(task.clone()),
        }
    }
}

/// Computes ordered child lists from the cached snapshot.
///
/// A plain builder serves the whole forest; `with_pinned_root` fixes the
/// root to a single project instead (the workspace-scoped view), same
/// builder by composition.
pub struct TreeBuilder {
    store: Arc<EntityStore>,
    sync: Arc<SyncCoordinator>,
    bus: Arc<ChangeBus>,
    sort: SortSetting,
    pinned_root: Option<String>,
}

impl TreeBuilder {
    pub fn new(
        store: Arc<EntityStore>,
        sync: Arc<SyncCoordinator>,
        bus: Arc<ChangeBus>,
        sort: SortSetting,
    ) -> Self {
        Self {
            store,
            sync,
            bus,
            sort,
            pinned_root: None,
        }
    }

    /// Root the builder at a single pinned project: `children(None)`
    /// returns that project's children instead of the forest roots, or
    /// nothing when the pinned id no longer resolves in the cache.
    pub fn with_pinned_root(mut self, project_id: impl Into<String>) -> Self {
        self.pinned_root = Some(project_id.into());
        self
    }

    /// Ordered children of `node`, or the forest roots when `node` is
    /// `None`. Never fails; an unresolvable query yields an empty list.
    pub fn children(&self, node: Option<&Node>) -> Vec<Node> {
        let (snapshot, index) = self.store.read_indexed();
        match node {
            Some(node) => self.children_of(&snapshot, &index, node),
            None => match &self.pinned_root {
                Some(project_id) => match index.project(&snapshot, project_id) {
                    Some(project) => {
                        let pinned = Node {
                            disposition: Disposition::Expanded,
                            ..Node::project(project)
                        };
                        self.children_of(&snapshot, &index, &pinned)
                    }
                    None => Vec::new(),
                },
                None => self.roots(&snapshot, &index),
            },
        }
    }

    /// Identity passthrough that re-derives the has-children disposition,
    /// so a task that gained sub-tasks since its node was built renders as
    /// collapsible.
    pub fn node(&self, node: &Node) -> Node {
        let (_, index) = self.store.read_indexed();
        let mut node = node.clone();
        if let NodeSource::Task(task) = &node.source {
            node.disposition = if index.has_subtasks(&task.id) {
                Disposition::Collapsed
            } else {
                Disposition::Leaf
            };
        }
        node
    }

    /// Flat list of tasks due on `date`, sorted per the current policy.
    pub fn tasks_due_on(&self, date: NaiveDate) -> Vec<Node> {
        let (snapshot, index) = self.store.read_indexed();
        let mut due: Vec<&Task> = snapshot
            .tasks
            .iter()
            .filter(|t| t.due.as_ref().is_some_and(|d| d.date == date))
            .collect();
        sort_tasks(&mut due, self.sort.get());
        due.into_iter()
            .map(|t| Node::task(t, index.has_subtasks(&t.id)))
            .collect()
    }

    fn roots(&self, snapshot: &Snapshot, index: &SnapshotIndex) -> Vec<Node> {
        if snapshot.projects.is_empty() {
            // First run: nothing cached yet. Fetch in the background and
            // let the change bus trigger a re-query.
            self.request_projects();
            return Vec::new();
        }
        let mut projects = index.root_projects(snapshot);
        projects.sort_by_key(|p| p.order);
        projects.iter().map(|p| Node::project(p)).collect()
    }

    fn children_of(&self, snapshot: &Snapshot, index: &SnapshotIndex, node: &Node) -> Vec<Node> {
        match &node.source {
            NodeSource::Project(project) => {
                let mut children = Vec::new();

                let mut nested = index.child_projects(snapshot, &project.id);
                nested.sort_by_key(|p| p.order);
                children.extend(nested.iter().map(|p| Node::project(p)));

                // Sections form their own group, distinct from child
                // projects and tasks.
                let mut sections = index.sections_of(snapshot, &project.id);
                sections.sort_by_key(|s| s.order);
                children.extend(sections.iter().map(|s| Node::section(s)));

                if snapshot.tasks.is_empty() {
                    // Partial result now; fetch completion re-notifies this
                    // node so the host re-queries.
                    self.request_tasks(node.clone());
                } else {
                    children.extend(
                        self.task_nodes(index.root_tasks_of(snapshot, &project.id), index),
                    );
                }
                children
            }
            NodeSource::Section(section) => {
                self.task_nodes(index.tasks_in_section(snapshot, &section.id), index)
            }
            NodeSource::Task(task) => {
                self.task_nodes(index.subtasks_of(snapshot, &task.id), index)
            }
        }
    }

    fn task_nodes(&self, mut tasks: Vec<&Task>, index: &SnapshotIndex) -> Vec<Node> {
        sort_tasks(&mut tasks, self.sort.get());
        tasks
            .into_iter()
            .map(|t| Node::task(t, index.has_subtasks(&t.id)))
            .collect()
    }

    fn request_projects(&self) {
        let sync = Arc::clone(&self.sync);
        let bus = Arc::clone(&self.bus);
        self.spawn(async move {
            match sync.fetch_projects().await {
                Ok(_) => bus.notify(None),
                Err(err) => warn!("background project fetch failed: {err}"),
            }
        });
    }

    fn request_tasks(&self, node: Node) {
        let sync = Arc::clone(&self.sync);
        let bus = Arc::clone(&self.bus);
        self.spawn(async move {
            match sync.fetch_active_tasks().await {
                Ok(_) => bus.notify(Some(node)),
                Err(err) => warn!("background task fetch failed: {err}"),
            }
        });
    }

    // The render path must never panic, so a missing runtime downgrades the
    // background fetch to a warning instead of crashing the query.
    fn spawn(&self, fut: impl Future<Output = ()> + Send + 'static) {
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(fut);
            }
            Err(_) => warn!("no async runtime available; skipping background fetch"),
        }
    }
}
