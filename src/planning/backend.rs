//! The external text-planning collaborator.
//!
//! The orchestrator only needs text in and text out, so the collaborator is
//! a trait. [`ChatCompletionsBackend`] speaks the OpenAI-compatible
//! `/chat/completions` protocol (Mistral by default).

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::config::PlannerConfig;
use crate::error::{OrchestratorError, Result};

/// System and user messages sent to the planner.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanningPrompt {
    pub system: String,
    pub user: String,
}

/// Text-in/text-out planning service.
#[async_trait]
pub trait PlanningBackend: Send + Sync {
    /// Return the raw completion text.
    ///
    /// Fails with `PlanningUnavailable` when the service cannot answer.
    async fn complete(&self, prompt: &PlanningPrompt) -> Result<String>;
}

/// OpenAI-compatible chat completions client.
#[derive(Debug, Clone)]
pub struct ChatCompletionsBackend {
    http: reqwest::Client,
    config: PlannerConfig,
    api_key: Option<String>,
}

impl ChatCompletionsBackend {
    /// Build a backend; the API key is read from `config.api_key_env`.
    pub fn new(config: PlannerConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| OrchestratorError::PlanningUnavailable(e.to_string()))?;
        let api_key = config.api_key();
        if api_key.is_none() {
            log::warn!(
                "{} is not set; planning requests will be sent without credentials",
                config.api_key_env
            );
        }
        Ok(Self {
            http,
            config,
            api_key,
        })
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.api_base.trim_end_matches('/'))
    }

    /// Request body for one planning call.
    pub fn build_request_body(&self, prompt: &PlanningPrompt) -> Value {
        json!({
            "model": self.config.model,
            "messages": [
                {"role": "system", "content": prompt.system},
                {"role": "user", "content": prompt.user},
            ],
            "temperature": self.config.temperature,
        })
    }

    fn parse_completion(response: &Value) -> Result<String> {
        if let Some(usage) = response.get("usage") {
            log::debug!(
                "Planner token usage: prompt={}, completion={}, total={}",
                usage.get("prompt_tokens").and_then(Value::as_i64).unwrap_or(0),
                usage.get("completion_tokens").and_then(Value::as_i64).unwrap_or(0),
                usage.get("total_tokens").and_then(Value::as_i64).unwrap_or(0),
            );
        }
        response
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|choice| choice.get("message"))
            .and_then(|message| message.get("content"))
            .and_then(Value::as_str)
            .map(|content| content.trim().to_string())
            .ok_or_else(|| {
                OrchestratorError::PlanningUnavailable(
                    "planner response has no choices[0].message.content".to_string(),
                )
            })
    }
}

#[async_trait]
impl PlanningBackend for ChatCompletionsBackend {
    async fn complete(&self, prompt: &PlanningPrompt) -> Result<String> {
        let endpoint = self.endpoint();
        log::debug!("Planning call: model={}, endpoint={}", self.config.model, endpoint);

        let mut request = self
            .http
            .post(&endpoint)
            .header("Content-Type", "application/json");
        if let Some(ref api_key) = self.api_key {
            request = request.header("Authorization", format!("Bearer {}", api_key));
        }

        let response = request
            .json(&self.build_request_body(prompt))
            .send()
            .await
            .map_err(|e| OrchestratorError::PlanningUnavailable(format!("request failed: {}", e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| OrchestratorError::PlanningUnavailable(format!("reading response: {}", e)))?;

        if !status.is_success() {
            return Err(OrchestratorError::PlanningUnavailable(format!(
                "planner returned {}: {}",
                status,
                text.chars().take(500).collect::<String>()
            )));
        }

        let body: Value = serde_json::from_str(&text).map_err(|e| {
            OrchestratorError::PlanningUnavailable(format!("invalid planner response: {}", e))
        })?;
        Self::parse_completion(&body)
    }
}
