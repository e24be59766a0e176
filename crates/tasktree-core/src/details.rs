//! Detail projection: descriptive leaf facts for one selected task.
//!
//! Cross-references that no longer resolve in the cache are omitted rather
//! than rendered as missing: a stale cache degrades the projection, it
//! never breaks it.

use crate::store::EntityStore;
use std::sync::Arc;

/// Action attached to a fact row.
#[derive(Debug, Clone, PartialEq)]
pub enum FactAction {
    /// Open the task in the service's web UI.
    OpenUrl(String),
}

/// One descriptive row about the selected task.
#[derive(Debug, Clone, PartialEq)]
pub struct Fact {
    /// Stable row id, derived from the entity ids involved.
    pub id: String,
    pub label: String,
    pub value: Option<String>,
    pub tooltip: Option<String>,
    pub action: Option<FactAction>,
}

impl Fact {
    fn row(id: String, label: impl Into<String>) -> Self {
        Fact {
            id,
            label: label.into(),
            value: None,
            tooltip: None,
            action: None,
        }
    }

    fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    fn with_tooltip(mut self, tooltip: impl Into<String>) -> Self {
        self.tooltip = Some(tooltip.into());
        self
    }
}

/// Projects a single cached task into an ordered list of facts.
pub struct DetailProjector {
    store: Arc<EntityStore>,
}

impl DetailProjector {
    pub fn new(store: Arc<EntityStore>) -> Self {
        Self { store }
    }

    /// Facts for the store's persisted selected-task id, if one is set.
    pub fn selected_facts(&self) -> Vec<Fact> {
        match self.store.selected_task() {
            Some(task_id) => self.facts(&task_id),
            None => Vec::new(),
        }
    }

    /// Ordered facts for one task; empty when the id is not in the cache.
    ///
    /// Fixed order: title, due date, completion state, owning project,
    /// parent task, section, a spacer, then the open-in-browser action.
    /// The project/parent/section rows appear only when their id resolves.
    pub fn facts(&self, task_id: &str) -> Vec<Fact> {
        let (snapshot, index) = self.store.read_indexed();
        let Some(task) = index.task(&snapshot, task_id) else {
            return Vec::new();
        };

        let mut facts = Vec::new();

        facts.push(
            Fact::row(format!("{}_task", task.id), task.content.clone())
                .with_value(task.description.clone())
                .with_tooltip(task.content.clone()),
        );

        facts.push(match &task.due {
            Some(due) => Fact::row(format!("{}{}", task.id, due.date), "Due")
                .with_value(due.date.to_string())
                .with_tooltip(due.display.clone()),
            None => Fact::row(format!("{}nodue", task.id), "Due")
                .with_value("*not set*")
                .with_tooltip("*Due date not set*"),
        });

        let state = if task.is_completed { "Completed" } else { "Pending" };
        facts.push(
            Fact::row(format!("{}{}", task.id, task.is_completed), "Completed")
                .with_value(state)
                .with_tooltip(state),
        );

        if let Some(project) = index.project(&snapshot, &task.project_id) {
            facts.push(
                Fact::row(project.id.clone(), "Project")
                    .with_value(project.name.clone())
                    .with_tooltip(project.name.clone()),
            );
        }

        if let Some(parent) = task
            .parent_id
            .as_ref()
            .and_then(|id| index.task(&snapshot, id))
        {
            facts.push(
                Fact::row(parent.id.clone(), "Parent")
                    .with_value(parent.content.clone())
                    .with_tooltip(parent.content.clone()),
            );
        }

        if let Some(section) = task
            .section_id
            .as_ref()
            .and_then(|id| index.section(&snapshot, id))
        {
            facts.push(
                Fact::row(section.id.clone(), "Section")
                    .with_value(section.name.clone())
                    .with_tooltip(section.name.clone()),
            );
        }

        // Blank spacer before the trailing action row.
        facts.push(Fact::row("spacer".into(), ""));

        let mut open = Fact::row(format!("{}_browser", task.id), "Open in Browser")
            .with_tooltip("Open the task in your browser");
        open.action = Some(FactAction::OpenUrl(task.url.clone()));
        facts.push(open);

        facts
    }
}
