//! Plan generation: catalog-constrained calls to the planning backend.

use std::fmt::Write as _;
use std::sync::Arc;

use crate::compatibility;
use crate::error::{OrchestratorError, Result};
use crate::ledger::{Actor, OperationKind, ResourceLedger};
use crate::registry::RegistrySnapshot;

use super::backend::{PlanningBackend, PlanningPrompt};
use super::parser::parse_plan;
use super::plan::NO_PLAN_SENTINEL;

/// Turns goals into plan text using the current capability catalog.
pub struct PlanGenerator {
    backend: Arc<dyn PlanningBackend>,
    ledger: Arc<ResourceLedger>,
    planning_cost: f64,
    include_connections: bool,
}

impl std::fmt::Debug for PlanGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlanGenerator")
            .field("planning_cost", &self.planning_cost)
            .field("include_connections", &self.include_connections)
            .finish()
    }
}

impl PlanGenerator {
    pub fn new(backend: Arc<dyn PlanningBackend>, ledger: Arc<ResourceLedger>, planning_cost: f64) -> Self {
        Self {
            backend,
            ledger,
            planning_cost,
            include_connections: true,
        }
    }

    /// Whether the prompt lists compatibility edges.
    pub fn include_connections(mut self, include: bool) -> Self {
        self.include_connections = include;
        self
    }

    /// Produce plan text (or the `NO_PLAN` sentinel) for `goal`.
    ///
    /// The planning charge is recorded once the goal is accepted, whatever
    /// the outcome. An empty snapshot answers the sentinel without calling
    /// the backend. Text that parses but references capabilities outside
    /// the snapshot is replaced by the sentinel.
    pub async fn generate(&self, goal: &str, snapshot: &RegistrySnapshot) -> Result<String> {
        let goal = goal.trim();
        if goal.is_empty() {
            return Err(OrchestratorError::EmptyGoal);
        }

        self.ledger
            .charge(OperationKind::Planning, Actor::Orchestrator, self.planning_cost);

        if snapshot.is_empty() {
            log::info!("No agents registered; answering {} for goal '{}'", NO_PLAN_SENTINEL, goal);
            return Ok(NO_PLAN_SENTINEL.to_string());
        }

        let prompt = self.build_prompt(goal, snapshot);
        log::info!("Planning goal '{}' over {} agents", goal, snapshot.len());
        let text = self.backend.complete(&prompt).await.map_err(|err| {
            log::error!("Planning failed: {}", err);
            err
        })?;
        let text = text.trim().to_string();

        // Malformed text is left for the parser to reject.
        if let Ok(plan) = parse_plan(&text) {
            if let Some(step) = plan
                .steps()
                .iter()
                .find(|s| snapshot.resolve(&s.agent_name, &s.capability_name).is_none())
            {
                log::warn!(
                    "Planner referenced unregistered capability {} → {}; answering {}",
                    step.agent_name,
                    step.capability_name,
                    NO_PLAN_SENTINEL
                );
                return Ok(NO_PLAN_SENTINEL.to_string());
            }
        }

        log::debug!("Plan text:\n{}", text);
        Ok(text)
    }

    /// Build the catalog-constrained prompt for `goal`.
    pub fn build_prompt(&self, goal: &str, snapshot: &RegistrySnapshot) -> PlanningPrompt {
        let mut system = String::new();
        system.push_str(
            "You are the planning assistant of an agent orchestration system.\n\
             Produce a strictly step-by-step plan that fulfils the user goal using ONLY \
             the capabilities listed below.\n\n\
             Available capabilities (agent → capability: input → output):\n",
        );
        for entry in snapshot.catalog() {
            let cap = &entry.capability;
            let _ = write!(
                system,
                "- {} → {}: {} → {} (cost {})",
                entry.agent,
                cap.name,
                cap.input_spec.describe(),
                cap.output_spec.describe(),
                cap.cost_estimate.baseline()
            );
            if let Some(ref description) = cap.description {
                let _ = write!(system, " {}", description);
            }
            system.push('\n');
        }

        if self.include_connections {
            let connections = compatibility::analyze(snapshot).connections();
            if !connections.is_empty() {
                system.push_str("\nCompatible hand-offs (output of the first can feed the second):\n");
                for c in connections {
                    let _ = writeln!(system, "- {} ⇒ {}", c.from, c.to);
                }
            }
        }

        let _ = write!(
            system,
            "\nRules:\n\
             - Use the exact agent and capability names above.\n\
             - Do not add explanations, code, or external tools.\n\
             - Answer with one step per line, numbered from 1:\n\
             1. agent_name → capability_name\n\
             2. agent_name → capability_name\n\
             - If no sequence of the listed capabilities can fulfil the goal, answer exactly {}\n",
            NO_PLAN_SENTINEL
        );

        PlanningPrompt {
            system,
            user: format!("Goal: {}\n\nRespond strictly in the format above.", goal),
        }
    }
}
