//! HTTP implementation of [`AgentClient`] over `reqwest`.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::config::AgentTransportConfig;

use super::{reported_waterdrops, AgentClient, ClientError};

/// Talks to agents over plain HTTP/JSON.
#[derive(Debug, Clone)]
pub struct HttpAgentClient {
    http: reqwest::Client,
    config: AgentTransportConfig,
}

impl HttpAgentClient {
    /// Build a client; the timeout applies to every request.
    pub fn new(config: AgentTransportConfig) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| ClientError::Transport(e.to_string()))?;
        Ok(Self { http, config })
    }

    fn url(base_url: &str, path: &str) -> String {
        format!(
            "{}/{}",
            base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    fn map_send_error(&self, err: reqwest::Error) -> ClientError {
        if err.is_timeout() {
            ClientError::Timeout(self.timeout())
        } else {
            ClientError::Transport(err.to_string())
        }
    }

    fn timeout(&self) -> Duration {
        self.config.timeout()
    }

    /// Read a response as a JSON object, mapping non-2xx to `Status`.
    async fn read_object(&self, resp: reqwest::Response) -> Result<Value, ClientError> {
        let status = resp.status();
        let text = resp.text().await.map_err(|e| self.map_send_error(e))?;

        if !status.is_success() {
            let waterdrops = serde_json::from_str::<Value>(&text)
                .ok()
                .as_ref()
                .and_then(reported_waterdrops);
            return Err(ClientError::Status {
                status: status.as_u16(),
                body: truncate(&text, 500),
                waterdrops,
            });
        }

        let body: Value = serde_json::from_str(&text)
            .map_err(|e| ClientError::MalformedBody(format!("{} ({})", e, truncate(&text, 200))))?;
        if !body.is_object() {
            return Err(ClientError::MalformedBody(format!(
                "expected a JSON object, got {}",
                truncate(&text, 200)
            )));
        }
        Ok(body)
    }

    async fn get_json(&self, url: &str) -> Result<Value, ClientError> {
        let resp = self
            .http
            .get(url)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;
        self.read_object(resp).await
    }
}

#[async_trait]
impl AgentClient for HttpAgentClient {
    async fn fetch_manifest(&self, base_url: &str) -> Result<Value, ClientError> {
        let url = Self::url(base_url, &self.config.manifest_path);
        log::debug!("Fetching manifest from: {}", url);
        self.get_json(&url).await
    }

    async fn invoke(
        &self,
        base_url: &str,
        capability: &str,
        input: &Value,
    ) -> Result<Value, ClientError> {
        let url = Self::url(base_url, &self.config.execute_path);
        log::debug!("Invoking '{}' at: {}", capability, url);

        let body = serde_json::json!({
            "capability": capability,
            "input": input,
        });
        let resp = self
            .http
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;
        self.read_object(resp).await
    }

    async fn fetch_metrics(&self, base_url: &str) -> Result<Value, ClientError> {
        let url = Self::url(base_url, &self.config.metrics_path);
        self.get_json(&url).await
    }
}

fn truncate(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}…", &text[..idx]),
        None => text.to_string(),
    }
}
