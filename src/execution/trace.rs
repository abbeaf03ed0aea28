//! Execution traces.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::client::ClientError;

/// Why a step invocation failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StepFailure {
    /// The agent did not answer in time.
    #[error("timed out after {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },

    /// Transport error, non-success status or malformed body.
    #[error("{message}")]
    Invocation { message: String },
}

impl From<&ClientError> for StepFailure {
    fn from(err: &ClientError) -> Self {
        match err {
            ClientError::Timeout(after) => Self::Timeout {
                timeout_ms: u64::try_from(after.as_millis()).unwrap_or(u64::MAX),
            },
            other => Self::Invocation {
                message: other.to_string(),
            },
        }
    }
}

/// Outcome of one executed plan step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    pub ordinal: u32,
    pub agent_name: String,
    pub capability_name: String,
    pub input_sent: Value,
    pub output_received: Option<Value>,
    pub waterdrops_used: f64,
    /// Set when the step failed; terminal for the execution.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StepResult {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Ordered record of the steps of one execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionTrace {
    pub execution_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub steps: Vec<StepResult>,
    /// Per-plan overhead included in the execution charge.
    pub dispatch_overhead: f64,
}

impl ExecutionTrace {
    pub fn new(dispatch_overhead: f64) -> Self {
        Self {
            execution_id: Uuid::new_v4(),
            started_at: Utc::now(),
            finished_at: None,
            steps: Vec::new(),
            dispatch_overhead,
        }
    }

    pub(crate) fn push(&mut self, result: StepResult) {
        self.steps.push(result);
    }

    pub(crate) fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Sum of the step costs, in step order.
    pub fn step_cost(&self) -> f64 {
        self.steps.iter().map(|s| s.waterdrops_used).sum()
    }

    /// What the execution charges to the ledger.
    pub fn total_cost(&self) -> f64 {
        self.dispatch_overhead + self.step_cost()
    }

    /// Every recorded step succeeded.
    pub fn is_success(&self) -> bool {
        self.steps.iter().all(StepResult::is_success)
    }

    pub fn failed_step(&self) -> Option<&StepResult> {
        self.steps.iter().find(|s| !s.is_success())
    }

    /// Output of the last successful step.
    pub fn final_output(&self) -> Option<&Value> {
        self.steps
            .iter()
            .rev()
            .find_map(|s| s.output_received.as_ref())
    }
}
