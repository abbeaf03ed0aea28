//! Structured plans.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{OrchestratorError, Result};

/// The exact text a planner emits when no feasible sequence exists.
pub const NO_PLAN_SENTINEL: &str = "NO_PLAN";

/// One ordinal instruction: invoke `capability_name` on `agent_name`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanStep {
    /// 1-based position; defines execution order.
    pub ordinal: u32,
    pub agent_name: String,
    pub capability_name: String,
}

impl PlanStep {
    pub fn new(ordinal: u32, agent_name: impl Into<String>, capability_name: impl Into<String>) -> Self {
        Self {
            ordinal,
            agent_name: agent_name.into(),
            capability_name: capability_name.into(),
        }
    }
}

impl fmt::Display for PlanStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}. {} → {}", self.ordinal, self.agent_name, self.capability_name)
    }
}

/// Ordered list of plan steps.
///
/// An empty plan is the *no-plan* outcome: a valid negative result meaning
/// the current registry cannot satisfy the goal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuredPlan {
    steps: Vec<PlanStep>,
}

impl StructuredPlan {
    /// Build a plan, checking ordinals start at 1 and strictly increase.
    pub fn new(steps: Vec<PlanStep>) -> Result<Self> {
        let mut previous = 0u32;
        for (index, step) in steps.iter().enumerate() {
            if previous == 0 && step.ordinal != 1 {
                return Err(OrchestratorError::malformed_plan(
                    index + 1,
                    format!("first step must have ordinal 1, got {}", step.ordinal),
                ));
            }
            if step.ordinal <= previous {
                return Err(OrchestratorError::malformed_plan(
                    index + 1,
                    format!("ordinal {} does not follow {}", step.ordinal, previous),
                ));
            }
            previous = step.ordinal;
        }
        Ok(Self { steps })
    }

    /// Number `(agent, capability)` pairs 1..=n.
    pub fn sequential<I, A, C>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (A, C)>,
        A: Into<String>,
        C: Into<String>,
    {
        let steps = pairs
            .into_iter()
            .zip(1u32..)
            .map(|((agent, capability), ordinal)| PlanStep::new(ordinal, agent, capability))
            .collect();
        Self { steps }
    }

    pub fn no_plan() -> Self {
        Self::default()
    }

    pub fn is_no_plan(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn steps(&self) -> &[PlanStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Render to the line format accepted by [`parse_plan`](super::parse_plan).
    pub fn render(&self) -> String {
        if self.steps.is_empty() {
            return NO_PLAN_SENTINEL.to_string();
        }
        self.steps
            .iter()
            .map(PlanStep::to_string)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl fmt::Display for StructuredPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render() {
        let plan = StructuredPlan::sequential([
            ("fetch_articles", "fetch_static_articles"),
            ("summarize_articles", "structured_text_summarization"),
        ]);
        assert_eq!(
            plan.render(),
            "1. fetch_articles → fetch_static_articles\n2. summarize_articles → structured_text_summarization"
        );
        assert_eq!(StructuredPlan::no_plan().render(), NO_PLAN_SENTINEL);
    }

    #[test]
    fn test_new_checks_ordinals() {
        assert!(StructuredPlan::new(vec![PlanStep::new(1, "a", "x"), PlanStep::new(3, "b", "y")]).is_ok());

        let err = StructuredPlan::new(vec![PlanStep::new(2, "a", "x")]).unwrap_err();
        assert!(matches!(err, OrchestratorError::MalformedPlan { line: 1, .. }));

        let err = StructuredPlan::new(vec![PlanStep::new(1, "a", "x"), PlanStep::new(1, "b", "y")])
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::MalformedPlan { line: 2, .. }));
    }
}
