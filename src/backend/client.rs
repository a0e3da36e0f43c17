use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};

use super::models::{AnalysisPayload, AnalysisRequest, AnalysisResult};
use super::{Backend, BackendError, HealthStatus};
use crate::config::BackendConfig;
use crate::video::VideoReference;

/// HTTP client for the analysis backend
#[derive(Debug, Clone)]
pub struct HttpBackendClient {
    base_url: String,
    health_client: Client,
    client: Client,
}

impl HttpBackendClient {
    pub fn new(config: &BackendConfig) -> Result<Self> {
        let health_client = Client::builder()
            .timeout(Duration::from_secs(config.health_timeout_seconds))
            .build()?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.analyze_timeout_seconds))
            .build()?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            health_client,
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }
}

/// Best diagnostic from an error body: `error`, then `message`
fn server_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    ["error", "message"]
        .iter()
        .filter_map(|key| value.get(*key).and_then(|v| v.as_str()))
        .map(str::trim)
        .find(|message| !message.is_empty())
        .map(String::from)
}

fn transport_failure(error: reqwest::Error) -> BackendError {
    let message = if error.is_timeout() {
        "Transport failure: the analysis backend did not answer in time".to_string()
    } else {
        format!("Transport failure: {}", error)
    };
    BackendError::Transport { message }
}

#[async_trait]
impl Backend for HttpBackendClient {
    async fn probe_health(&self) -> HealthStatus {
        let url = self.endpoint("health");

        match self.health_client.get(&url).send().await {
            Ok(response) if response.status().is_success() => {
                debug!("Health probe {} -> {}", url, response.status());
                HealthStatus::Reachable
            }
            Ok(response) => {
                warn!("Health probe {} -> {}", url, response.status());
                HealthStatus::Unreachable
            }
            Err(e) => {
                warn!("Health probe {} failed: {}", url, e);
                HealthStatus::Unreachable
            }
        }
    }

    async fn analyze(&self, video: &VideoReference) -> Result<AnalysisResult, BackendError> {
        let url = self.endpoint("analyze");
        debug!("Sending analysis request for {} to {}", video, url);

        let response = self
            .client
            .post(&url)
            .json(&AnalysisRequest::from(video))
            .send()
            .await
            .map_err(transport_failure)?;

        let status = response.status();
        let body = response.text().await.map_err(transport_failure)?;

        if !status.is_success() {
            let message = server_message(&body).unwrap_or_else(|| format!("Server error {}", status.as_u16()));
            return Err(BackendError::Status {
                status: status.as_u16(),
                message,
            });
        }

        serde_json::from_str::<AnalysisPayload>(&body)
            .map_err(|e| format!("Malformed analysis response: {}", e))
            .and_then(AnalysisPayload::into_result)
            .map_err(|diagnostic| invalid_payload(status.as_u16(), &body, diagnostic))
    }
}

/// A server-supplied message wins over the locally generated diagnostic
fn invalid_payload(status: u16, body: &str, diagnostic: String) -> BackendError {
    BackendError::InvalidPayload {
        status,
        message: server_message(body).unwrap_or(diagnostic),
    }
}
