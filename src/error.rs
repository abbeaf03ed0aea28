//! Orchestration error taxonomy.
//!
//! Every failure surfaced by the engine is an [`OrchestratorError`]. Each
//! variant knows which [`Stage`] produced it, so callers (and the HTTP layer)
//! can always tell registration, planning, parsing and execution failures
//! apart. A goal that cannot be satisfied is *not* an error: see
//! [`StructuredPlan::no_plan`](crate::planning::StructuredPlan::no_plan).

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::execution::{ExecutionTrace, StepFailure};

/// Pipeline stage an error originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Registration,
    Planning,
    Parsing,
    Execution,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Registration => "registration",
            Self::Planning => "planning",
            Self::Parsing => "parsing",
            Self::Execution => "execution",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors produced by the orchestration engine.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// A manifest document does not satisfy the schema template.
    #[error("invalid manifest: `{field}` {reason}")]
    InvalidManifest { field: String, reason: String },

    /// The agent's manifest endpoint could not be reached or answered badly.
    #[error("agent '{agent}' unreachable at {url}: {reason}")]
    UnreachableAgent {
        agent: String,
        url: String,
        reason: String,
    },

    /// No agent is registered under this name.
    #[error("unknown agent: {0}")]
    UnknownAgent(String),

    /// The planning collaborator could not produce an answer.
    #[error("planning unavailable: {0}")]
    PlanningUnavailable(String),

    /// Planning was requested for a blank goal.
    #[error("goal must be a non-empty string")]
    EmptyGoal,

    /// Plan text outside the step-list grammar.
    #[error("malformed plan at line {line}: {reason}")]
    MalformedPlan { line: usize, reason: String },

    /// A plan step names an agent or capability absent from the registry snapshot.
    #[error("step {ordinal}: unknown capability reference {agent} → {capability}")]
    UnknownCapabilityReference {
        ordinal: u32,
        agent: String,
        capability: String,
    },

    /// A step invocation failed; `trace` holds every result up to and
    /// including the failing step.
    #[error("step {ordinal} ({agent} → {capability}) failed: {failure}")]
    StepExecutionFailed {
        ordinal: u32,
        agent: String,
        capability: String,
        failure: StepFailure,
        trace: Box<ExecutionTrace>,
    },
}

impl OrchestratorError {
    pub(crate) fn invalid_manifest(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidManifest {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn malformed_plan(line: usize, reason: impl Into<String>) -> Self {
        Self::MalformedPlan {
            line,
            reason: reason.into(),
        }
    }

    /// The stage that failed.
    pub fn stage(&self) -> Stage {
        match self {
            Self::InvalidManifest { .. } | Self::UnreachableAgent { .. } => Stage::Registration,
            Self::UnknownAgent(_) => Stage::Registration,
            Self::PlanningUnavailable(_) | Self::EmptyGoal => Stage::Planning,
            Self::MalformedPlan { .. } => Stage::Parsing,
            Self::UnknownCapabilityReference { .. } | Self::StepExecutionFailed { .. } => {
                Stage::Execution
            }
        }
    }

    /// Offending step ordinal, for execution failures.
    pub fn ordinal(&self) -> Option<u32> {
        match self {
            Self::UnknownCapabilityReference { ordinal, .. }
            | Self::StepExecutionFailed { ordinal, .. } => Some(*ordinal),
            _ => None,
        }
    }

    /// Partial trace produced before the failure, if any.
    pub fn partial_trace(&self) -> Option<&ExecutionTrace> {
        match self {
            Self::StepExecutionFailed { trace, .. } => Some(&**trace),
            _ => None,
        }
    }

    /// Short machine-readable kind, stable across message wording.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidManifest { .. } => "invalid_manifest",
            Self::UnreachableAgent { .. } => "unreachable_agent",
            Self::UnknownAgent(_) => "unknown_agent",
            Self::PlanningUnavailable(_) => "planning_unavailable",
            Self::EmptyGoal => "empty_goal",
            Self::MalformedPlan { .. } => "malformed_plan",
            Self::UnknownCapabilityReference { .. } => "unknown_capability_reference",
            Self::StepExecutionFailed { .. } => "step_execution_failed",
        }
    }
}

pub type Result<T, E = OrchestratorError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_mapping() {
        assert_eq!(
            OrchestratorError::invalid_manifest("name", "is missing").stage(),
            Stage::Registration
        );
        assert_eq!(OrchestratorError::EmptyGoal.stage(), Stage::Planning);
        assert_eq!(
            OrchestratorError::malformed_plan(2, "bad").stage(),
            Stage::Parsing
        );
        let err = OrchestratorError::UnknownCapabilityReference {
            ordinal: 3,
            agent: "a".into(),
            capability: "c".into(),
        };
        assert_eq!(err.stage(), Stage::Execution);
        assert_eq!(err.ordinal(), Some(3));
        assert!(err.partial_trace().is_none());
    }

    #[test]
    fn test_display_names_field() {
        let err = OrchestratorError::invalid_manifest("capabilities[0].input_spec", "is missing");
        assert_eq!(
            err.to_string(),
            "invalid manifest: `capabilities[0].input_spec` is missing"
        );
        assert_eq!(err.kind(), "invalid_manifest");
    }
}
