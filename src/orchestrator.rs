//! The composed orchestration surface.
//!
//! [`Orchestrator`] wires the registry, planner, parser, executor and ledger
//! together and exposes the operations callers use: register agents, look
//! at the catalog and its connections, plan, parse, execute, and run a goal
//! end to end.

use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::client::{AgentClient, HttpAgentClient};
use crate::compatibility::{self, CompatibilityGraph};
use crate::config::OrchestratorConfig;
use crate::error::Result;
use crate::execution::{ExecutionTrace, PlanExecutor};
use crate::ledger::{LedgerSummary, ResourceLedger};
use crate::planning::{parse_plan, ChatCompletionsBackend, PlanGenerator, PlanningBackend, StructuredPlan};
use crate::registry::{AgentRecord, AgentRegistry};

/// Result of [`Orchestrator::run_goal`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum GoalOutcome {
    /// The registry cannot satisfy the goal. Not an error.
    NoPlan { plan_text: String },
    Executed {
        plan_text: String,
        plan: StructuredPlan,
        trace: ExecutionTrace,
    },
}

impl GoalOutcome {
    pub fn is_no_plan(&self) -> bool {
        matches!(self, Self::NoPlan { .. })
    }

    pub fn trace(&self) -> Option<&ExecutionTrace> {
        match self {
            Self::Executed { trace, .. } => Some(trace),
            Self::NoPlan { .. } => None,
        }
    }
}

/// Metrics reported by one agent, or why they could not be fetched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentMetrics {
    pub agent: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Orchestrator-level status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestratorStatus {
    pub version: String,
    pub uptime_secs: u64,
    pub agents: usize,
    pub total_waterdrops: f64,
}

/// Orchestration engine.
pub struct Orchestrator {
    config: OrchestratorConfig,
    ledger: Arc<ResourceLedger>,
    registry: AgentRegistry,
    generator: PlanGenerator,
    executor: PlanExecutor,
    started: Instant,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("registry", &self.registry)
            .field("ledger_entries", &self.ledger.len())
            .finish()
    }
}

impl Orchestrator {
    /// Build an orchestrator that talks HTTP to agents and the planner.
    pub fn from_config(config: OrchestratorConfig) -> Result<Self, anyhow::Error> {
        let client = HttpAgentClient::new(config.agents.clone())
            .map_err(|e| anyhow::anyhow!("agent client: {}", e))?;
        let backend = ChatCompletionsBackend::new(config.planner.clone())?;
        Ok(Self::with_parts(config, Arc::new(client), Arc::new(backend)))
    }

    /// Build an orchestrator over explicit collaborators.
    pub fn with_parts(
        config: OrchestratorConfig,
        client: Arc<dyn AgentClient>,
        backend: Arc<dyn PlanningBackend>,
    ) -> Self {
        let ledger = Arc::new(ResourceLedger::new());
        let registry = AgentRegistry::new(
            Arc::clone(&client),
            Arc::clone(&ledger),
            config.costs.registration,
        );
        let generator = PlanGenerator::new(backend, Arc::clone(&ledger), config.costs.planning)
            .include_connections(config.planner.include_connections);
        let executor = PlanExecutor::new(client, Arc::clone(&ledger), config.costs.dispatch_overhead)
            .with_forwarding(config.execution.forwarding);
        Self {
            config,
            ledger,
            registry,
            generator,
            executor,
            started: Instant::now(),
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn registry(&self) -> &AgentRegistry {
        &self.registry
    }

    pub fn ledger(&self) -> &ResourceLedger {
        &self.ledger
    }

    // -- registry -----------------------------------------------------------

    pub async fn register(&self, name: &str, base_url: &str) -> Result<AgentRecord> {
        self.registry.register(name, base_url).await
    }

    pub fn list_agents(&self) -> Vec<AgentRecord> {
        self.registry.list()
    }

    pub fn get_agent(&self, name: &str) -> Result<AgentRecord> {
        self.registry.get(name)
    }

    /// Compatibility graph of the current registry.
    pub fn connections(&self) -> CompatibilityGraph {
        compatibility::analyze(&self.registry.snapshot())
    }

    // -- planning -----------------------------------------------------------

    /// Plan text for `goal`, or the `NO_PLAN` sentinel.
    pub async fn generate_plan(&self, goal: &str) -> Result<String> {
        let snapshot = self.registry.snapshot();
        self.generator.generate(goal, &snapshot).await
    }

    pub fn parse_plan(&self, text: &str) -> Result<StructuredPlan> {
        parse_plan(text)
    }

    // -- execution ----------------------------------------------------------

    /// Execute `plan` against the registry as it is now.
    pub async fn execute_plan(&self, plan: &StructuredPlan, initial_input: Value) -> Result<ExecutionTrace> {
        let snapshot = self.registry.snapshot();
        self.executor.execute(plan, &snapshot, initial_input).await
    }

    /// Plan, parse and execute in one go.
    ///
    /// The same registry snapshot is used for planning and execution.
    pub async fn run_goal(&self, goal: &str, initial_input: Value) -> Result<GoalOutcome> {
        let snapshot = self.registry.snapshot();
        let plan_text = self.generator.generate(goal, &snapshot).await?;
        let plan = parse_plan(&plan_text)?;
        if plan.is_no_plan() {
            log::info!("No plan for goal '{}'", goal.trim());
            return Ok(GoalOutcome::NoPlan { plan_text });
        }
        let trace = self.executor.execute(&plan, &snapshot, initial_input).await?;
        Ok(GoalOutcome::Executed {
            plan_text,
            plan,
            trace,
        })
    }

    // -- accounting & status ------------------------------------------------

    /// Aggregated ledger view.
    pub fn total_cost(&self) -> LedgerSummary {
        self.ledger.summary()
    }

    pub fn status(&self) -> OrchestratorStatus {
        OrchestratorStatus {
            version: crate::VERSION.to_string(),
            uptime_secs: self.started.elapsed().as_secs(),
            agents: self.registry.len(),
            total_waterdrops: self.ledger.total(),
        }
    }

    /// Query every registered agent's metrics endpoint concurrently.
    ///
    /// Per-agent failures are reported inline.
    pub async fn agent_metrics(&self) -> Vec<AgentMetrics> {
        let snapshot = self.registry.snapshot();
        let client = self.registry.client();
        let probes = snapshot.iter().map(|record| async move {
            match client.fetch_metrics(&record.base_url).await {
                Ok(metrics) => AgentMetrics {
                    agent: record.name.clone(),
                    metrics: Some(metrics),
                    error: None,
                },
                Err(err) => {
                    log::warn!("Metrics for '{}' unavailable: {}", record.name, err);
                    AgentMetrics {
                        agent: record.name.clone(),
                        metrics: None,
                        error: Some(err.to_string()),
                    }
                }
            }
        });
        join_all(probes).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::error::OrchestratorError;
    use crate::ledger::OperationKind;

    const PLAN: &str = "1. fetch_articles → fetch_static_articles\n2. summarize_articles → structured_text_summarization";

    async fn fetch_agent() -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/manifest"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "fetch_articles",
                "version": "1.0.0",
                "capabilities": [{
                    "name": "fetch_static_articles",
                    "input_spec": {},
                    "output_spec": {"articles": "list"},
                    "cost_estimate": 0.25
                }]
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/execute"))
            .and(body_partial_json(json!({"capability": "fetch_static_articles"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "articles": [{"title": "A", "content": "aaa"}, {"title": "B", "content": "bbb"}],
                "source": "static"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/metrics"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"calls": 1})))
            .mount(&server)
            .await;
        server
    }

    async fn summarize_agent(execute: ResponseTemplate) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/manifest"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "summarize_articles",
                "version": "0.2.0",
                "capabilities": [{
                    "name": "structured_text_summarization",
                    "input_spec": {"articles": "list"},
                    "output_spec": {"summaries": "list", "waterdrops_used": "number"},
                    "cost_estimate": {"base": 0, "per_item": 0.5, "field": "articles"}
                }]
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/execute"))
            .and(body_partial_json(json!({
                "capability": "structured_text_summarization",
                "input": {"articles": [{"title": "A", "content": "aaa"}, {"title": "B", "content": "bbb"}]}
            })))
            .respond_with(execute)
            .mount(&server)
            .await;
        server
    }

    async fn planner(answer: &str) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": answer}}]
            })))
            .mount(&server)
            .await;
        server
    }

    fn orchestrator(planner: &MockServer) -> Orchestrator {
        let mut config = OrchestratorConfig::default();
        config.planner.api_base = planner.uri();
        config.planner.api_key_env = "CLEARCORE_TEST_UNSET_KEY".to_string();
        config.costs.dispatch_overhead = 0.5;
        Orchestrator::from_config(config).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_then_summarize_scenario() {
        let fetch = fetch_agent().await;
        let summarize = summarize_agent(ResponseTemplate::new(200).set_body_json(json!({
            "summaries": ["a.", "b."],
            "waterdrops_used": 1.0
        })))
        .await;
        let planner = planner(PLAN).await;
        let orchestrator = orchestrator(&planner);

        orchestrator.register("fetch_articles", &fetch.uri()).await.unwrap();
        orchestrator.register("summarize_articles", &summarize.uri()).await.unwrap();
        assert_eq!(orchestrator.total_cost().total, 4.0);

        let before = orchestrator.ledger().len();
        let outcome = orchestrator
            .run_goal("fetch articles and summarize them", json!({}))
            .await
            .unwrap();

        let GoalOutcome::Executed { plan_text, plan, trace } = outcome else {
            panic!("expected an executed plan");
        };
        assert_eq!(plan_text, PLAN);
        assert_eq!(plan.len(), 2);
        assert_eq!(trace.len(), 2);
        assert_eq!(trace.steps[0].input_sent, json!({}));
        assert_eq!(
            trace.steps[1].input_sent,
            json!({"articles": [{"title": "A", "content": "aaa"}, {"title": "B", "content": "bbb"}]})
        );
        assert_eq!(trace.steps[0].waterdrops_used, 0.25);
        assert_eq!(trace.steps[1].waterdrops_used, 1.0);

        // planning charge + one execution charge
        let new_entries = orchestrator.ledger().entries_since(before);
        assert_eq!(new_entries.len(), 2);
        assert_eq!(new_entries[0].operation, OperationKind::Planning);
        assert_eq!(new_entries[1].operation, OperationKind::Execution);
        assert_eq!(new_entries[1].amount, 0.25 + 1.0 + 0.5);
        assert_eq!(new_entries[1].amount, trace.step_cost() + trace.dispatch_overhead);
    }

    #[tokio::test]
    async fn test_failing_step_reports_partial_trace() {
        let fetch = fetch_agent().await;
        let summarize = summarize_agent(
            ResponseTemplate::new(500).set_body_json(json!({"detail": "Execution failed"})),
        )
        .await;
        let planner = planner(PLAN).await;
        let orchestrator = orchestrator(&planner);
        orchestrator.register("fetch_articles", &fetch.uri()).await.unwrap();
        orchestrator.register("summarize_articles", &summarize.uri()).await.unwrap();

        let err = orchestrator.run_goal("summarize", Value::Null).await.unwrap_err();
        assert_eq!(err.stage(), crate::error::Stage::Execution);
        assert_eq!(err.ordinal(), Some(2));
        let trace = err.partial_trace().unwrap();
        assert_eq!(trace.len(), 2);
        assert!(trace.steps[0].is_success());
        assert!(trace.steps[1].error.as_deref().unwrap().contains("500"));
    }

    #[tokio::test]
    async fn test_no_plan_outcome() {
        let fetch = fetch_agent().await;
        let planner = planner("NO_PLAN").await;
        let orchestrator = orchestrator(&planner);
        orchestrator.register("fetch_articles", &fetch.uri()).await.unwrap();

        let outcome = orchestrator.run_goal("book me a flight", json!({})).await.unwrap();
        assert!(outcome.is_no_plan());
        assert!(outcome.trace().is_none());
    }

    #[tokio::test]
    async fn test_malformed_plan_is_parsing_error() {
        let fetch = fetch_agent().await;
        let planner = planner("First, fetch the articles.").await;
        let orchestrator = orchestrator(&planner);
        orchestrator.register("fetch_articles", &fetch.uri()).await.unwrap();

        let err = orchestrator.run_goal("fetch", json!({})).await.unwrap_err();
        assert!(matches!(err, OrchestratorError::MalformedPlan { .. }));
        assert_eq!(err.stage(), crate::error::Stage::Parsing);
    }

    #[tokio::test]
    async fn test_connections_and_metrics() {
        let fetch = fetch_agent().await;
        let summarize = summarize_agent(ResponseTemplate::new(200)).await;
        let planner = planner(PLAN).await;
        let orchestrator = orchestrator(&planner);
        orchestrator.register("fetch_articles", &fetch.uri()).await.unwrap();
        orchestrator.register("summarize_articles", &summarize.uri()).await.unwrap();

        let graph = orchestrator.connections();
        assert!(graph.can_feed(
            &compatibility::CapabilityRef::new("fetch_articles", "fetch_static_articles"),
            &compatibility::CapabilityRef::new("summarize_articles", "structured_text_summarization"),
        ));

        // summarize has no /metrics mock: reported inline, not fatal
        let metrics = orchestrator.agent_metrics().await;
        assert_eq!(metrics.len(), 2);
        assert_eq!(metrics[0].metrics, Some(json!({"calls": 1})));
        assert!(metrics[1].error.is_some());

        let status = orchestrator.status();
        assert_eq!(status.agents, 2);
        assert_eq!(status.total_waterdrops, 4.0);
    }
}
