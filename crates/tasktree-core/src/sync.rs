//! Sync coordination: refreshing one entity class at a time from the
//! remote service into the entity store.
//!
//! An empty list from the service is ambiguous (it can mean "no entities"
//! or "a request that failed quietly"), so the class syncs never replace a
//! possibly-valid cache with it. Only the force-fetch paths, which have no
//! prior cache to fall back on, surface failures (including emptiness) to
//! the caller. Failed calls are terminal: no retry, no backoff; the user
//! re-issues the action after fixing credentials.

use crate::api::{ApiError, NewTask, TaskApi};
use crate::entities::{Project, Task};
use crate::events::ChangeBus;
use crate::store::{EntityStore, SnapshotUpdate, StoreError};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("API token is not set. Configure your token to enable syncing.")]
    TokenMissing,

    #[error("The service rejected your API token. Reconfigure the token and try again.")]
    TokenRejected,

    #[error("The request to the task service failed: {0}")]
    Request(String),

    #[error("The task service returned no {0}. Check your connection and token, then retry.")]
    NoData(&'static str),

    #[error("Something went wrong when creating the {0}.")]
    CreateFailed(&'static str),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<ApiError> for SyncError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::MissingCredential => SyncError::TokenMissing,
            ApiError::InvalidCredential => SyncError::TokenRejected,
            ApiError::Request(message) => SyncError::Request(message),
        }
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;

/// Orchestrates refreshes from the remote service into the entity store.
///
/// Each successful class sync replaces exactly one collection wholesale and
/// fires a whole-forest refresh on the change bus. In-flight calls are not
/// cancellable or sequenced against each other; last write wins.
pub struct SyncCoordinator {
    api: Arc<dyn TaskApi>,
    store: Arc<EntityStore>,
    bus: Arc<ChangeBus>,
}

impl SyncCoordinator {
    pub fn new(api: Arc<dyn TaskApi>, store: Arc<EntityStore>, bus: Arc<ChangeBus>) -> Self {
        Self { api, store, bus }
    }

    /// Refresh the cached projects. An empty response leaves the cache
    /// untouched: it cannot be told apart from a silent failure.
    pub async fn sync_projects(&self) -> Result<()> {
        let projects = self.api.list_projects().await?;
        if projects.is_empty() {
            debug!("project sync returned nothing; keeping cached projects");
            return Ok(());
        }
        info!(count = projects.len(), "synced projects");
        self.store.write(SnapshotUpdate::projects(projects)).await?;
        self.bus.notify(None);
        Ok(())
    }

    /// Refresh the cached sections; same empty-response policy as projects.
    pub async fn sync_sections(&self) -> Result<()> {
        let sections = self.api.list_sections().await?;
        if sections.is_empty() {
            debug!("section sync returned nothing; keeping cached sections");
            return Ok(());
        }
        info!(count = sections.len(), "synced sections");
        self.store.write(SnapshotUpdate::sections(sections)).await?;
        self.bus.notify(None);
        Ok(())
    }

    /// Refresh the cached active tasks; same empty-response policy.
    pub async fn sync_tasks(&self) -> Result<()> {
        let tasks = self.api.list_tasks().await?;
        if tasks.is_empty() {
            debug!("task sync returned nothing; keeping cached tasks");
            return Ok(());
        }
        info!(count = tasks.len(), "synced tasks");
        self.store.write(SnapshotUpdate::tasks(tasks)).await?;
        self.bus.notify(None);
        Ok(())
    }

    /// Run all three class syncs in sequence, stopping at the first error.
    pub async fn sync_all(&self) -> Result<()> {
        self.sync_projects().await?;
        self.sync_sections().await?;
        self.sync_tasks().await?;
        Ok(())
    }

    /// Fetch projects, cache them and return them in one call.
    ///
    /// Used before any background sync has populated the cache, so there is
    /// no safe fallback: failures, including an empty response, surface
    /// to the caller instead of silently no-opping.
    pub async fn fetch_projects(&self) -> Result<Vec<Project>> {
        let projects = self.api.list_projects().await?;
        if projects.is_empty() {
            return Err(SyncError::NoData("projects"));
        }
        self.store
            .write(SnapshotUpdate::projects(projects.clone()))
            .await?;
        Ok(projects)
    }

    /// Fetch active tasks, cache them and return them in one call.
    ///
    /// Unlike the class sync, the result is cached even when empty.
    pub async fn fetch_active_tasks(&self) -> Result<Vec<Task>> {
        let tasks = self.api.list_tasks().await?;
        self.store.write(SnapshotUpdate::tasks(tasks.clone())).await?;
        Ok(tasks)
    }

    /// Create a task on the remote service. The cache is not reconciled;
    /// the new task appears on the next sync.
    pub async fn create_task(&self, content: &str, project_id: Option<&str>) -> Result<Task> {
        self.api
            .create_task(NewTask {
                content: content.to_string(),
                project_id: project_id.map(String::from),
            })
            .await
            .map_err(|err| {
                debug!("task creation failed: {err}");
                SyncError::CreateFailed("task")
            })
    }

    /// Create a project on the remote service; not reconciled either.
    pub async fn create_project(&self, name: &str) -> Result<Project> {
        self.api.create_project(name).await.map_err(|err| {
            debug!("project creation failed: {err}");
            SyncError::CreateFailed("project")
        })
    }
}
