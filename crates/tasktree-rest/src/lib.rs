//! tasktree-rest: HTTP adapter for the core's remote-service boundary.
//!
//! `RestClient` implements `TaskApi` against the service's REST endpoint.
//! The bearer token comes from a `SecretStore` read per request, so a newly
//! configured token takes effect without rebuilding the client.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tasktree_core::api::{ApiError, NewTask, Result, SecretStore, TaskApi};
use tasktree_core::entities::{Project, Section, Task};
use thiserror::Error;
use tracing::debug;

/// Name under which the API token is stored in the credential collaborator.
pub const TOKEN_SECRET: &str = "apiToken";

/// Adapter configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the task service's REST endpoint.
    pub base_url: String,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("TASKTREE_API_URL environment variable not set")]
    MissingBaseUrl,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Required environment variables:
    /// - `TASKTREE_API_URL`: base URL of the task service REST endpoint
    pub fn from_env() -> std::result::Result<Self, ConfigError> {
        let base_url =
            std::env::var("TASKTREE_API_URL").map_err(|_| ConfigError::MissingBaseUrl)?;
        Ok(Self { base_url })
    }
}

/// Secret store backed by a single environment variable.
///
/// This adapter only ever holds one secret (the API token), so every name
/// resolves to the same variable.
pub struct EnvSecrets {
    var: String,
}

impl EnvSecrets {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl Default for EnvSecrets {
    fn default() -> Self {
        Self::new("TASKTREE_API_TOKEN")
    }
}

#[async_trait]
impl SecretStore for EnvSecrets {
    async fn get(&self, _name: &str) -> Option<String> {
        std::env::var(&self.var).ok().filter(|v| !v.is_empty())
    }
}

/// Map a non-success HTTP status to the collaborator failure taxonomy.
///
/// 400 is what the service answers when no usable token was presented;
/// 401/403 mean the token itself was rejected.
fn status_error(status: StatusCode) -> ApiError {
    match status {
        StatusCode::BAD_REQUEST => ApiError::MissingCredential,
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ApiError::InvalidCredential,
        status => ApiError::Request(format!("unexpected status {status}")),
    }
}

fn join_url(base_url: &str, path: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), path)
}

/// `TaskApi` over HTTP.
pub struct RestClient {
    http: reqwest::Client,
    base_url: String,
    secrets: Arc<dyn SecretStore>,
}

impl RestClient {
    pub fn new(base_url: impl Into<String>, secrets: Arc<dyn SecretStore>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            secrets,
        }
    }

    pub fn from_config(config: &Config, secrets: Arc<dyn SecretStore>) -> Self {
        Self::new(config.base_url.clone(), secrets)
    }

    async fn token(&self) -> Result<String> {
        self.secrets
            .get(TOKEN_SECRET)
            .await
            .ok_or(ApiError::MissingCredential)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let token = self.token().await?;
        let url = join_url(&self.base_url, path);
        debug!(%url, "GET");

        let response = self
            .http
            .get(&url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|err| ApiError::Request(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(status_error(status));
        }
        response
            .json::<T>()
            .await
            .map_err(|err| ApiError::Request(err.to_string()))
    }

    async fn post_json<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<T> {
        let token = self.token().await?;
        let url = join_url(&self.base_url, path);
        debug!(%url, "POST");

        let response = self
            .http
            .post(&url)
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .map_err(|err| ApiError::Request(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(status_error(status));
        }
        response
            .json::<T>()
            .await
            .map_err(|err| ApiError::Request(err.to_string()))
    }
}

#[async_trait]
impl TaskApi for RestClient {
    async fn list_projects(&self) -> Result<Vec<Project>> {
        self.get_json("projects").await
    }

    async fn list_sections(&self) -> Result<Vec<Section>> {
        self.get_json("sections").await
    }

    async fn list_tasks(&self) -> Result<Vec<Task>> {
        self.get_json("tasks").await
    }

    async fn create_project(&self, name: &str) -> Result<Project> {
        self.post_json("projects", &serde_json::json!({ "name": name }))
            .await
    }

    async fn create_task(&self, new_task: NewTask) -> Result<Task> {
        let mut body = serde_json::json!({ "content": new_task.content });
        if let Some(project_id) = &new_task.project_id {
            body["projectId"] = serde_json::json!(project_id);
        }
        self.post_json("tasks", &body).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_error_mapping() {
        assert!(matches!(
            status_error(StatusCode::BAD_REQUEST),
            ApiError::MissingCredential
        ));
        assert!(matches!(
            status_error(StatusCode::UNAUTHORIZED),
            ApiError::InvalidCredential
        ));
        assert!(matches!(
            status_error(StatusCode::FORBIDDEN),
            ApiError::InvalidCredential
        ));
        assert!(matches!(
            status_error(StatusCode::TOO_MANY_REQUESTS),
            ApiError::Request(_)
        ));
        assert!(matches!(
            status_error(StatusCode::INTERNAL_SERVER_ERROR),
            ApiError::Request(_)
        ));
    }

    #[test]
    fn test_join_url_normalizes_trailing_slash() {
        assert_eq!(
            join_url("https://api.tasks.example/rest/v2", "projects"),
            "https://api.tasks.example/rest/v2/projects"
        );
        assert_eq!(
            join_url("https://api.tasks.example/rest/v2/", "projects"),
            "https://api.tasks.example/rest/v2/projects"
        );
    }

    #[tokio::test]
    async fn test_missing_token_fails_before_any_request() {
        let secrets = Arc::new(tasktree_core::api::InMemorySecrets::new());
        let client = RestClient::new("https://api.tasks.example/rest/v2", secrets);

        // No token configured: the request must fail without touching the
        // network (the URL does not resolve anywhere).
        assert!(matches!(
            client.list_projects().await,
            Err(ApiError::MissingCredential)
        ));
    }
}
