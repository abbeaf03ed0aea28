//! Agent network contract.
//!
//! Every agent exposes the same three endpoints: its manifest, a uniform
//! `execute` dispatcher taking `{capability, input}`, and a metrics probe.
//! The orchestrator reaches them through the [`AgentClient`] trait so the
//! registry and executor can be driven by an in-process fake in tests.

pub mod http;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

pub use http::HttpAgentClient;

/// Failure talking to an agent.
#[derive(Debug, Clone, Error)]
pub enum ClientError {
    /// The agent did not answer within the configured timeout.
    #[error("timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// The agent answered with a non-success status.
    #[error("HTTP {status}: {body}")]
    Status {
        status: u16,
        body: String,
        /// Cost the agent reported in its error body, if any.
        waterdrops: Option<f64>,
    },

    /// Connection-level failure (DNS, refused, reset, ...).
    #[error("transport error: {0}")]
    Transport(String),

    /// The agent answered 2xx with a body that is not a JSON object.
    #[error("malformed response body: {0}")]
    MalformedBody(String),
}

impl ClientError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }

    /// Waterdrops the agent declared while failing (zero when unknown).
    pub fn reported_waterdrops(&self) -> f64 {
        match self {
            Self::Status { waterdrops, .. } => waterdrops.unwrap_or(0.0),
            _ => 0.0,
        }
    }
}

/// Uniform contract for reaching a registered agent.
#[async_trait]
pub trait AgentClient: Send + Sync {
    /// `GET <base_url>/manifest` → raw manifest document.
    async fn fetch_manifest(&self, base_url: &str) -> Result<Value, ClientError>;

    /// `POST <base_url>/execute` with `{capability, input}` → output object.
    async fn invoke(
        &self,
        base_url: &str,
        capability: &str,
        input: &Value,
    ) -> Result<Value, ClientError>;

    /// `GET <base_url>/metrics` → agent-defined metrics document.
    async fn fetch_metrics(&self, base_url: &str) -> Result<Value, ClientError>;
}

/// Extract the `waterdrops_used` figure an agent may report in a body.
pub fn reported_waterdrops(body: &Value) -> Option<f64> {
    body.get("waterdrops_used")
        .and_then(Value::as_f64)
        .filter(|w| w.is_finite() && *w >= 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_reported_waterdrops() {
        assert_eq!(reported_waterdrops(&json!({"waterdrops_used": 4})), Some(4.0));
        assert_eq!(reported_waterdrops(&json!({"waterdrops_used": "4"})), None);
        assert_eq!(reported_waterdrops(&json!({"waterdrops_used": -1})), None);
        assert_eq!(reported_waterdrops(&json!({})), None);
    }

    #[test]
    fn test_error_waterdrops() {
        let err = ClientError::Status {
            status: 500,
            body: "boom".into(),
            waterdrops: Some(0.5),
        };
        assert_eq!(err.reported_waterdrops(), 0.5);
        assert!(!err.is_timeout());
        assert_eq!(
            ClientError::Timeout(std::time::Duration::from_secs(1)).reported_waterdrops(),
            0.0
        );
    }
}
