//! Remote task-service boundary.
//!
//! The core never talks HTTP itself: it consumes `TaskApi` (the remote
//! collaborator) and `SecretStore` (the credential collaborator) as traits.
//! `FakeApi` and `InMemorySecrets` are the in-process doubles used by tests.

use crate::entities::{Project, Section, Task};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicUsize, Ordering};
use thiserror::Error;

/// Failure taxonomy of the remote collaborator.
#[derive(Debug, Error)]
pub enum ApiError {
    /// No credential is configured at all.
    #[error("no API token configured")]
    MissingCredential,

    /// The service rejected the configured credential.
    #[error("the service rejected the API token")]
    InvalidCredential,

    /// Transport failure, malformed response, rate limit: anything else.
    #[error("request failed: {0}")]
    Request(String),
}

pub type Result<T> = std::result::Result<T, ApiError>;

/// Fields for creating a task.
#[derive(Debug, Clone, Default)]
pub struct NewTask {
    pub content: String,
    pub project_id: Option<String>,
}

/// Remote task-service collaborator.
///
/// `list_*` returns the full current collection of that entity class; the
/// service does not expose deltas.
#[async_trait]
pub trait TaskApi: Send + Sync {
    async fn list_projects(&self) -> Result<Vec<Project>>;

    async fn list_sections(&self) -> Result<Vec<Section>>;

    async fn list_tasks(&self) -> Result<Vec<Task>>;

    async fn create_project(&self, name: &str) -> Result<Project>;

    async fn create_task(&self, new_task: NewTask) -> Result<Task>;
}

// Implement TaskApi for Arc<T> so a fake can be shared with the coordinator
// while the test keeps a typed handle for its counters.
#[async_trait]
impl<T: TaskApi + Send + Sync> TaskApi for std::sync::Arc<T> {
    async fn list_projects(&self) -> Result<Vec<Project>> {
        (**self).list_projects().await
    }

    async fn list_sections(&self) -> Result<Vec<Section>> {
        (**self).list_sections().await
    }

    async fn list_tasks(&self) -> Result<Vec<Task>> {
        (**self).list_tasks().await
    }

    async fn create_project(&self, name: &str) -> Result<Project> {
        (**self).create_project(name).await
    }

    async fn create_task(&self, new_task: NewTask) -> Result<Task> {
        (**self).create_task(new_task).await
    }
}

/// Credential collaborator: named secrets, absent when unconfigured.
#[async_trait]
pub trait SecretStore: Send + Sync {
    async fn get(&self, name: &str) -> Option<String>;
}

/// In-memory secret store for testing.
#[derive(Default)]
pub struct InMemorySecrets {
    entries: RwLock<HashMap<String, String>>,
}

impl InMemorySecrets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, name: &str, value: &str) {
        self.entries
            .write()
            .unwrap()
            .insert(name.to_string(), value.to_string());
    }

    pub fn remove(&self, name: &str) {
        self.entries.write().unwrap().remove(name);
    }
}

#[async_trait]
impl SecretStore for InMemorySecrets {
    async fn get(&self, name: &str) -> Option<String> {
        self.entries.read().unwrap().get(name).cloned()
    }
}

/// Which error category the fake should produce.
#[derive(Debug, Clone, Copy)]
pub enum FailureMode {
    MissingCredential,
    InvalidCredential,
    Request,
}

impl FailureMode {
    fn to_error(self) -> ApiError {
        match self {
            FailureMode::MissingCredential => ApiError::MissingCredential,
            FailureMode::InvalidCredential => ApiError::InvalidCredential,
            FailureMode::Request => ApiError::Request("connection reset".into()),
        }
    }
}

/// In-memory task service double.
///
/// Serves whatever collections it holds and counts list calls, so tests can
/// assert that cached reads stop hitting the network. `fail_with` switches
/// every call to the given error category until cleared.
#[derive(Default)]
pub struct FakeApi {
    projects: RwLock<Vec<Project>>,
    sections: RwLock<Vec<Section>>,
    tasks: RwLock<Vec<Task>>,
    failure: RwLock<Option<FailureMode>>,
    list_calls: AtomicUsize,
    created: AtomicUsize,
}

impl FakeApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_projects(&self, projects: Vec<Project>) {
        *self.projects.write().unwrap() = projects;
    }

    pub fn set_sections(&self, sections: Vec<Section>) {
        *self.sections.write().unwrap() = sections;
    }

    pub fn set_tasks(&self, tasks: Vec<Task>) {
        *self.tasks.write().unwrap() = tasks;
    }

    pub fn fail_with(&self, mode: FailureMode) {
        *self.failure.write().unwrap() = Some(mode);
    }

    pub fn clear_failure(&self) {
        *self.failure.write().unwrap() = None;
    }

    /// Number of list requests served (or failed) so far.
    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::Relaxed)
    }

    fn check(&self) -> Result<()> {
        match *self.failure.read().unwrap() {
            Some(mode) => Err(mode.to_error()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl TaskApi for FakeApi {
    async fn list_projects(&self) -> Result<Vec<Project>> {
        self.list_calls.fetch_add(1, Ordering::Relaxed);
        self.check()?;
        Ok(self.projects.read().unwrap().clone())
    }

    async fn list_sections(&self) -> Result<Vec<Section>> {
        self.list_calls.fetch_add(1, Ordering::Relaxed);
        self.check()?;
        Ok(self.sections.read().unwrap().clone())
    }

    async fn list_tasks(&self) -> Result<Vec<Task>> {
        self.list_calls.fetch_add(1, Ordering::Relaxed);
        self.check()?;
        Ok(self.tasks.read().unwrap().clone())
    }

    async fn create_project(&self, name: &str) -> Result<Project> {
        self.check()?;
        let seq = self.created.fetch_add(1, Ordering::Relaxed);
        Ok(Project {
            id: format!("project-{seq}"),
            name: name.to_string(),
            color: "grey".into(),
            is_shared: false,
            is_favorite: false,
            order: 0,
            parent_id: None,
        })
    }

    async fn create_task(&self, new_task: NewTask) -> Result<Task> {
        self.check()?;
        let seq = self.created.fetch_add(1, Ordering::Relaxed);
        let id = format!("task-{seq}");
        Ok(Task {
            url: format!("https://tasks.example/{id}"),
            id,
            content: new_task.content,
            description: String::new(),
            order: 0,
            priority: 1,
            is_completed: false,
            due: None,
            project_id: new_task.project_id.unwrap_or_else(|| "inbox".into()),
            section_id: None,
            parent_id: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fake_api_counts_list_calls() {
        let api = FakeApi::new();
        api.list_projects().await.unwrap();
        api.list_tasks().await.unwrap();
        assert_eq!(api.list_calls(), 2);
    }

    #[tokio::test]
    async fn test_fake_api_failure_modes() {
        let api = FakeApi::new();

        api.fail_with(FailureMode::InvalidCredential);
        assert!(matches!(
            api.list_projects().await,
            Err(ApiError::InvalidCredential)
        ));

        api.clear_failure();
        assert!(api.list_projects().await.is_ok());
    }

    #[tokio::test]
    async fn test_in_memory_secrets() {
        let secrets = InMemorySecrets::new();
        assert!(secrets.get("apiToken").await.is_none());

        secrets.set("apiToken", "tok-123");
        assert_eq!(secrets.get("apiToken").await.as_deref(), Some("tok-123"));

        secrets.remove("apiToken");
        assert!(secrets.get("apiToken").await.is_none());
    }
}
