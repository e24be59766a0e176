//! Entity types returned by the remote task service.
//!
//! Entities are immutable once fetched: a sync cycle replaces whole
//! collections, it never mutates elements in place. Cross-entity
//! relationships are id-string references resolved at tree-build time,
//! never cached as direct pointers, because each collection can be
//! replaced independently.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A project: the top-level (or nested) container for sections and tasks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub name: String,
    pub color: String,
    #[serde(default)]
    pub is_shared: bool,
    #[serde(default)]
    pub is_favorite: bool,
    pub order: i64,
    /// Parent project for nested projects; `None` marks a forest root.
    #[serde(default)]
    pub parent_id: Option<String>,
}

impl Project {
    /// Label for picker-style consumers; favorites get a star prefix.
    pub fn display_label(&self) -> String {
        if self.is_favorite {
            format!("⭐ {}", self.name)
        } else {
            self.name.clone()
        }
    }
}

/// A section inside a project. Every section belongs to exactly one project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    pub id: String,
    pub name: String,
    pub order: i64,
    pub project_id: String,
}

/// Structured due date plus the service's human-readable rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DueDate {
    pub date: NaiveDate,
    /// Display string as produced by the service (e.g. "tomorrow").
    #[serde(rename = "string")]
    pub display: String,
}

/// A task. `section_id` and `parent_id` are both optional: a task sits
/// directly under its project, under a section, or under a parent task
/// (sub-task).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub content: String,
    #[serde(default)]
    pub description: String,
    pub order: i64,
    /// Small ordinal, higher = more urgent.
    pub priority: u8,
    #[serde(default)]
    pub is_completed: bool,
    #[serde(default)]
    pub due: Option<DueDate>,
    pub project_id: String,
    #[serde(default)]
    pub section_id: Option<String>,
    #[serde(default)]
    pub parent_id: Option<String>,
    /// Deep link to the task in the service's web UI.
    pub url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_label_plain() {
        let project = Project {
            id: "1".into(),
            name: "Inbox".into(),
            color: "grey".into(),
            is_shared: false,
            is_favorite: false,
            order: 0,
            parent_id: None,
        };
        assert_eq!(project.display_label(), "Inbox");
    }

    #[test]
    fn test_display_label_favorite() {
        let project = Project {
            id: "1".into(),
            name: "Inbox".into(),
            color: "grey".into(),
            is_shared: false,
            is_favorite: true,
            order: 0,
            parent_id: None,
        };
        assert_eq!(project.display_label(), "⭐ Inbox");
    }

    #[test]
    fn test_task_deserializes_camel_case() {
        let json = r#"{
            "id": "t1",
            "content": "Write report",
            "order": 3,
            "priority": 4,
            "isCompleted": false,
            "due": { "date": "2026-03-14", "string": "Mar 14" },
            "projectId": "p1",
            "sectionId": null,
            "parentId": null,
            "url": "https://tasks.example/t1"
        }"#;

        let task: Task = serde_json::from_str(json).unwrap();
        assert_eq!(task.content, "Write report");
        assert_eq!(task.priority, 4);
        assert_eq!(task.project_id, "p1");
        assert!(task.section_id.is_none());
        let due = task.due.unwrap();
        assert_eq!(due.date.to_string(), "2026-03-14");
        assert_eq!(due.display, "Mar 14");
    }

    #[test]
    fn test_task_optional_fields_default() {
        // The service omits nullable fields instead of sending null.
        let json = r#"{
            "id": "t2",
            "content": "Quick task",
            "order": 1,
            "priority": 1,
            "projectId": "p1",
            "url": "https://tasks.example/t2"
        }"#;

        let task: Task = serde_json::from_str(json).unwrap();
        assert!(!task.is_completed);
        assert!(task.due.is_none());
        assert!(task.parent_id.is_none());
        assert_eq!(task.description, "");
    }
}
