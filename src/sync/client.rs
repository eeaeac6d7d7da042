use super::{SyncConfig, SyncError};
use crate::models::{RemoteProject, SessionPayload};
use reqwest::Method;
use std::time::Duration;
use tracing::{debug, warn};

/// Thin JSON client for the remote project API.
#[derive(Clone)]
pub struct RemoteClient {
    client: reqwest::Client,
    api_base_url: String,
    app_version: String,
}

impl RemoteClient {
    pub fn new(config: &SyncConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .build()
            .unwrap_or_else(|e| {
                warn!("[MIRROR] Failed to build HTTP client with timeout, using defaults: {}", e);
                reqwest::Client::new()
            });
        Self {
            client,
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
            app_version: config.app_version.clone(),
        }
    }

    fn request(&self, method: Method, path: &str, token: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.api_base_url, path);
        debug!("[MIRROR] {} {}", method, url);
        self.client
            .request(method, url)
            .header("Content-Type", "application/json")
            .header("Authorization", format!("Bearer {}", token))
            .header("X-App-Version", &self.app_version)
    }

    /// `POST /projects/{remoteId}/sessions`. Returns the updated project.
    pub async fn post_session(
        &self,
        remote_id: &str,
        payload: &SessionPayload,
        token: &str,
    ) -> Result<RemoteProject, SyncError> {
        let path = format!("/projects/{}/sessions", remote_id);
        let response = self
            .request(Method::POST, &path, token)
            .json(payload)
            .send()
            .await
            .map_err(|e| SyncError::Network(e.to_string()))?;
        Self::read_project(response).await
    }

    /// `POST /projects`. Creates the remote record for a local project.
    pub async fn create_project(
        &self,
        name: &str,
        description: &str,
        token: &str,
    ) -> Result<RemoteProject, SyncError> {
        let response = self
            .request(Method::POST, "/projects", token)
            .json(&serde_json::json!({ "name": name, "description": description }))
            .send()
            .await
            .map_err(|e| SyncError::Network(e.to_string()))?;
        Self::read_project(response).await
    }

    async fn read_project(response: reqwest::Response) -> Result<RemoteProject, SyncError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = if body.is_empty() {
                status.canonical_reason().unwrap_or("Unknown").into()
            } else {
                body
            };
            return Err(SyncError::Http {
                status: status.as_u16(),
                message,
            });
        }
        response
            .json::<RemoteProject>()
            .await
            .map_err(|e| SyncError::Decode(e.to_string()))
    }
}
