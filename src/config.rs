//! Orchestrator configuration.
//!
//! Every field has a serde default, so a partial YAML file (or none at all)
//! yields a usable configuration. Environment variables are applied on top
//! by [`OrchestratorConfig::apply_env`].

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Agent transport
// ---------------------------------------------------------------------------

/// How the orchestrator talks to registered agents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentTransportConfig {
    /// Path appended to an agent's base URL to fetch its manifest.
    #[serde(default = "default_manifest_path")]
    pub manifest_path: String,
    /// Path appended to an agent's base URL to invoke a capability.
    #[serde(default = "default_execute_path")]
    pub execute_path: String,
    /// Path appended to an agent's base URL to read its metrics.
    #[serde(default = "default_metrics_path")]
    pub metrics_path: String,
    /// Per-request timeout in seconds (manifest fetch and step invocation).
    #[serde(default = "default_agent_timeout")]
    pub timeout_secs: u64,
}

fn default_manifest_path() -> String { "/manifest".to_string() }
fn default_execute_path() -> String { "/execute".to_string() }
fn default_metrics_path() -> String { "/metrics".to_string() }
fn default_agent_timeout() -> u64 { 10 }

impl Default for AgentTransportConfig {
    fn default() -> Self {
        Self {
            manifest_path: default_manifest_path(),
            execute_path: default_execute_path(),
            metrics_path: default_metrics_path(),
            timeout_secs: default_agent_timeout(),
        }
    }
}

impl AgentTransportConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

// ---------------------------------------------------------------------------
// Planner
// ---------------------------------------------------------------------------

/// Planning collaborator (OpenAI-compatible chat completions endpoint).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannerConfig {
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    /// Name of the environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_planner_timeout")]
    pub timeout_secs: u64,
    /// Include the compatibility graph in the planning prompt.
    #[serde(default = "default_true")]
    pub include_connections: bool,
}

fn default_api_base() -> String { "https://api.mistral.ai/v1".to_string() }
fn default_model() -> String { "mistral-small".to_string() }
fn default_temperature() -> f64 { 0.5 }
fn default_api_key_env() -> String { "MISTRAL_API_KEY".to_string() }
fn default_planner_timeout() -> u64 { 60 }
fn default_true() -> bool { true }

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            model: default_model(),
            temperature: default_temperature(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_planner_timeout(),
            include_connections: true,
        }
    }
}

impl PlannerConfig {
    /// Read the API key from the configured environment variable.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env).ok().filter(|k| !k.is_empty())
    }
}

// ---------------------------------------------------------------------------
// Costs
// ---------------------------------------------------------------------------

/// Fixed waterdrop charges recorded by the orchestrator itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostConfig {
    #[serde(default = "default_registration_cost")]
    pub registration: f64,
    #[serde(default = "default_planning_cost")]
    pub planning: f64,
    /// Charged once per executed plan, on top of the step costs.
    #[serde(default = "default_dispatch_overhead")]
    pub dispatch_overhead: f64,
}

fn default_registration_cost() -> f64 { 2.0 }
fn default_planning_cost() -> f64 { 1.0 }
fn default_dispatch_overhead() -> f64 { 0.02 }

impl Default for CostConfig {
    fn default() -> Self {
        Self {
            registration: default_registration_cost(),
            planning: default_planning_cost(),
            dispatch_overhead: default_dispatch_overhead(),
        }
    }
}

// ---------------------------------------------------------------------------
// Execution
// ---------------------------------------------------------------------------

/// How a step's output becomes the next step's input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForwardingMode {
    /// Keep only the fields the next capability declares in its `input_spec`.
    #[default]
    Select,
    /// Forward the previous output untouched.
    Passthrough,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionConfig {
    #[serde(default)]
    pub forwarding: ForwardingMode,
}

// ---------------------------------------------------------------------------
// OrchestratorConfig
// ---------------------------------------------------------------------------

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    #[serde(default)]
    pub agents: AgentTransportConfig,
    #[serde(default)]
    pub planner: PlannerConfig,
    #[serde(default)]
    pub costs: CostConfig,
    #[serde(default)]
    pub execution: ExecutionConfig,
}

fn default_bind_addr() -> String { "0.0.0.0:8000".to_string() }

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            agents: AgentTransportConfig::default(),
            planner: PlannerConfig::default(),
            costs: CostConfig::default(),
            execution: ExecutionConfig::default(),
        }
    }
}

/// Errors raised while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid value for {key}: {value}")]
    InvalidEnv { key: String, value: String },
}

impl OrchestratorConfig {
    /// Parse a YAML document.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Load a YAML configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Resolve the configuration the way the server binary does: optional
    /// file from `CLEARCORE_CONFIG`, then environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match std::env::var("CLEARCORE_CONFIG") {
            Ok(path) if !path.is_empty() => {
                log::info!("Loading configuration from {}", path);
                Self::from_file(path)?
            }
            _ => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply environment overrides through a lookup function.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(addr) = lookup("CLEARCORE_BIND") {
            self.bind_addr = addr;
        } else if let Some(port) = lookup("PORT") {
            self.bind_addr = format!("0.0.0.0:{}", port);
        }
        if let Some(raw) = lookup("CLEARCORE_AGENT_TIMEOUT") {
            self.agents.timeout_secs = raw.parse().map_err(|_| ConfigError::InvalidEnv {
                key: "CLEARCORE_AGENT_TIMEOUT".to_string(),
                value: raw.clone(),
            })?;
        }
        if let Some(base) = lookup("CLEARCORE_PLANNER_URL") {
            self.planner.api_base = base;
        }
        if let Some(model) = lookup("CLEARCORE_PLANNER_MODEL") {
            self.planner.model = model;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.bind_addr, "0.0.0.0:8000");
        assert_eq!(config.agents.manifest_path, "/manifest");
        assert_eq!(config.agents.execute_path, "/execute");
        assert_eq!(config.planner.model, "mistral-small");
        assert_eq!(config.costs.registration, 2.0);
        assert_eq!(config.costs.planning, 1.0);
        assert_eq!(config.execution.forwarding, ForwardingMode::Select);
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = r#"
costs:
  dispatch_overhead: 0.5
execution:
  forwarding: passthrough
"#;
        let config = OrchestratorConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.costs.dispatch_overhead, 0.5);
        assert_eq!(config.costs.planning, 1.0);
        assert_eq!(config.execution.forwarding, ForwardingMode::Passthrough);
        assert_eq!(config.agents.timeout_secs, 10);
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clearcore.yaml");
        std::fs::write(&path, "bind_addr: \"127.0.0.1:9100\"\nagents:\n  timeout_secs: 3\n").unwrap();

        let config = OrchestratorConfig::from_file(&path).unwrap();
        assert_eq!(config.bind_addr, "127.0.0.1:9100");
        assert_eq!(config.agents.timeout(), Duration::from_secs(3));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("PORT", "9000"),
            ("CLEARCORE_AGENT_TIMEOUT", "4"),
            ("CLEARCORE_PLANNER_MODEL", "mistral-large"),
        ]
        .into_iter()
        .collect();

        let mut config = OrchestratorConfig::default();
        config
            .apply_env(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:9000");
        assert_eq!(config.agents.timeout_secs, 4);
        assert_eq!(config.planner.model, "mistral-large");
    }

    #[test]
    fn test_invalid_env_value() {
        let mut config = OrchestratorConfig::default();
        let err = config
            .apply_env(|k| (k == "CLEARCORE_AGENT_TIMEOUT").then(|| "soon".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains("CLEARCORE_AGENT_TIMEOUT"));
    }
}
