//! Sequential plan executor.
//!
//! Runs a [`StructuredPlan`] as a fold over its steps: the accumulator is
//! the last output, each step feeds the next, and the first failure stops
//! the run. Steps are resolved against one registry snapshot before any of
//! them is dispatched.

use std::sync::Arc;

use serde_json::{json, Value};

use crate::client::{reported_waterdrops, AgentClient};
use crate::config::ForwardingMode;
use crate::error::{OrchestratorError, Result};
use crate::ledger::{Actor, OperationKind, ResourceLedger};
use crate::manifest::ManifestCapability;
use crate::planning::{PlanStep, StructuredPlan};
use crate::registry::RegistrySnapshot;

use super::trace::{ExecutionTrace, StepFailure, StepResult};

/// A plan step bound to its endpoint and declared capability.
struct ResolvedStep<'a> {
    step: &'a PlanStep,
    base_url: &'a str,
    capability: &'a ManifestCapability,
}

/// Runs structured plans against live agents.
pub struct PlanExecutor {
    client: Arc<dyn AgentClient>,
    ledger: Arc<ResourceLedger>,
    dispatch_overhead: f64,
    forwarding: ForwardingMode,
}

impl std::fmt::Debug for PlanExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlanExecutor")
            .field("dispatch_overhead", &self.dispatch_overhead)
            .field("forwarding", &self.forwarding)
            .finish()
    }
}

impl PlanExecutor {
    pub fn new(client: Arc<dyn AgentClient>, ledger: Arc<ResourceLedger>, dispatch_overhead: f64) -> Self {
        Self {
            client,
            ledger,
            dispatch_overhead,
            forwarding: ForwardingMode::default(),
        }
    }

    pub fn with_forwarding(mut self, forwarding: ForwardingMode) -> Self {
        self.forwarding = forwarding;
        self
    }

    /// Execute `plan` in ordinal order.
    ///
    /// Step 1 receives `initial_input` (`null` counts as `{}`); each later
    /// step receives the previous output, reduced to the fields its
    /// capability declares when forwarding is [`ForwardingMode::Select`].
    ///
    /// One execution ledger entry (overhead plus step costs) is recorded
    /// after the last step or the failing one. A no-plan runs nothing and
    /// records nothing.
    ///
    /// # Errors
    ///
    /// - `UnknownCapabilityReference` when a step does not resolve; nothing
    ///   is dispatched.
    /// - `StepExecutionFailed` carrying the trace up to and including the
    ///   failing step.
    pub async fn execute(
        &self,
        plan: &StructuredPlan,
        snapshot: &RegistrySnapshot,
        initial_input: Value,
    ) -> Result<ExecutionTrace> {
        if plan.is_no_plan() {
            let mut trace = ExecutionTrace::new(0.0);
            trace.finish();
            return Ok(trace);
        }

        let resolved = Self::resolve(plan, snapshot)?;
        let mut trace = ExecutionTrace::new(self.dispatch_overhead);
        log::info!(
            "Execution {}: starting {} steps",
            trace.execution_id,
            resolved.len()
        );

        let mut carried = if initial_input.is_null() {
            json!({})
        } else {
            initial_input
        };

        for (index, resolved_step) in resolved.iter().enumerate() {
            let ResolvedStep {
                step,
                base_url,
                capability,
            } = resolved_step;
            let input = if index == 0 {
                carried
            } else {
                self.forward(&carried, capability)
            };

            log::debug!(
                "Execution {}: step {} {} → {} at {}",
                trace.execution_id,
                step.ordinal,
                step.agent_name,
                step.capability_name,
                base_url
            );

            match self.client.invoke(base_url, &step.capability_name, &input).await {
                Ok(output) => {
                    let waterdrops = reported_waterdrops(&output)
                        .unwrap_or_else(|| capability.cost_estimate.estimate(&input));
                    log::debug!(
                        "Execution {}: step {} completed ({:.4} waterdrops)",
                        trace.execution_id,
                        step.ordinal,
                        waterdrops
                    );
                    trace.push(StepResult {
                        ordinal: step.ordinal,
                        agent_name: step.agent_name.clone(),
                        capability_name: step.capability_name.clone(),
                        input_sent: input,
                        output_received: Some(output.clone()),
                        waterdrops_used: waterdrops,
                        error: None,
                    });
                    carried = output;
                }
                Err(err) => {
                    let failure = StepFailure::from(&err);
                    log::error!(
                        "Execution {}: step {} {} → {} failed: {}",
                        trace.execution_id,
                        step.ordinal,
                        step.agent_name,
                        step.capability_name,
                        err
                    );
                    trace.push(StepResult {
                        ordinal: step.ordinal,
                        agent_name: step.agent_name.clone(),
                        capability_name: step.capability_name.clone(),
                        input_sent: input,
                        output_received: None,
                        waterdrops_used: err.reported_waterdrops(),
                        error: Some(failure.to_string()),
                    });
                    self.settle(&mut trace);
                    return Err(OrchestratorError::StepExecutionFailed {
                        ordinal: step.ordinal,
                        agent: step.agent_name.clone(),
                        capability: step.capability_name.clone(),
                        failure,
                        trace: Box::new(trace),
                    });
                }
            }
        }

        self.settle(&mut trace);
        log::info!(
            "Execution {}: completed {} steps ({:.4} waterdrops)",
            trace.execution_id,
            trace.len(),
            trace.total_cost()
        );
        Ok(trace)
    }

    fn resolve<'a>(
        plan: &'a StructuredPlan,
        snapshot: &'a RegistrySnapshot,
    ) -> Result<Vec<ResolvedStep<'a>>> {
        plan.steps()
            .iter()
            .map(|step| {
                snapshot
                    .resolve(&step.agent_name, &step.capability_name)
                    .map(|(record, capability)| ResolvedStep {
                        step,
                        base_url: record.base_url.as_str(),
                        capability,
                    })
                    .ok_or_else(|| OrchestratorError::UnknownCapabilityReference {
                        ordinal: step.ordinal,
                        agent: step.agent_name.clone(),
                        capability: step.capability_name.clone(),
                    })
            })
            .collect()
    }

    fn forward(&self, previous: &Value, next: &ManifestCapability) -> Value {
        match self.forwarding {
            ForwardingMode::Select => next.input_spec.select(previous),
            ForwardingMode::Passthrough => previous.clone(),
        }
    }

    fn settle(&self, trace: &mut ExecutionTrace) {
        trace.finish();
        self.ledger
            .charge(OperationKind::Execution, Actor::Orchestrator, trace.total_cost());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use async_trait::async_trait;
    use parking_lot::Mutex;

    use crate::client::ClientError;
    use crate::manifest::{AgentManifest, CostEstimate, FieldSpec, FieldType, IoSpec};
    use crate::registry::AgentRecord;

    /// Answers by capability name and logs every call.
    #[derive(Default)]
    struct ScriptedAgents {
        replies: HashMap<String, std::result::Result<Value, ClientError>>,
        calls: Mutex<Vec<(String, String, Value)>>,
    }

    impl ScriptedAgents {
        fn reply(mut self, capability: &str, reply: std::result::Result<Value, ClientError>) -> Self {
            self.replies.insert(capability.to_string(), reply);
            self
        }
    }

    #[async_trait]
    impl AgentClient for ScriptedAgents {
        async fn fetch_manifest(&self, _: &str) -> std::result::Result<Value, ClientError> {
            Err(ClientError::Transport("unused".into()))
        }

        async fn invoke(
            &self,
            base_url: &str,
            capability: &str,
            input: &Value,
        ) -> std::result::Result<Value, ClientError> {
            self.calls
                .lock()
                .push((base_url.to_string(), capability.to_string(), input.clone()));
            self.replies
                .get(capability)
                .cloned()
                .unwrap_or_else(|| Err(ClientError::Transport("no reply scripted".into())))
        }

        async fn fetch_metrics(&self, _: &str) -> std::result::Result<Value, ClientError> {
            Ok(json!({}))
        }
    }

    fn cap(name: &str, input: IoSpec, output: IoSpec, cost: f64) -> ManifestCapability {
        ManifestCapability::new(name, input, output).with_cost(CostEstimate::Fixed(cost))
    }

    fn list(field: &str) -> IoSpec {
        IoSpec::new().with_field(field, FieldSpec::required(FieldType::List))
    }

    fn agent(name: &str, caps: Vec<ManifestCapability>) -> AgentRecord {
        AgentRecord::new(
            name,
            format!("http://{}", name),
            AgentManifest {
                name: name.into(),
                version: "1.0.0".into(),
                description: None,
                capabilities: caps,
            },
        )
    }

    fn snapshot() -> RegistrySnapshot {
        vec![
            agent("fetch", vec![cap("get", IoSpec::new(), list("articles"), 0.25)]),
            agent("sum", vec![cap("summarize", list("articles"), list("summaries"), 0.5)]),
            agent("audit", vec![cap("check", list("summaries"), IoSpec::new(), 1.0)]),
        ]
        .into_iter()
        .collect()
    }

    fn executor(agents: ScriptedAgents) -> (PlanExecutor, Arc<ScriptedAgents>, Arc<ResourceLedger>) {
        let agents = Arc::new(agents);
        let ledger = Arc::new(ResourceLedger::new());
        let executor = PlanExecutor::new(
            Arc::clone(&agents) as Arc<dyn AgentClient>,
            Arc::clone(&ledger),
            0.5,
        );
        (executor, agents, ledger)
    }

    #[tokio::test]
    async fn test_forwards_selected_fields() {
        let agents = ScriptedAgents::default()
            .reply("get", Ok(json!({"articles": ["a", "b"], "source": "static"})))
            .reply("summarize", Ok(json!({"summaries": ["s1", "s2"], "waterdrops_used": 1.0})));
        let (executor, agents, ledger) = executor(agents);
        let plan = StructuredPlan::sequential([("fetch", "get"), ("sum", "summarize")]);

        let trace = executor.execute(&plan, &snapshot(), Value::Null).await.unwrap();

        assert_eq!(trace.len(), 2);
        assert_eq!(trace.steps[0].input_sent, json!({}));
        assert_eq!(trace.steps[1].input_sent, json!({"articles": ["a", "b"]}));
        // declared cost when unreported, reported cost otherwise
        assert_eq!(trace.steps[0].waterdrops_used, 0.25);
        assert_eq!(trace.steps[1].waterdrops_used, 1.0);
        assert_eq!(trace.final_output(), Some(&json!({"summaries": ["s1", "s2"], "waterdrops_used": 1.0})));

        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.total(), 0.5 + 0.25 + 1.0);
        assert_eq!(ledger.total(), trace.total_cost());

        let calls = agents.calls.lock();
        assert_eq!(calls[0].0, "http://fetch");
        assert_eq!(calls[1].1, "summarize");
    }

    #[tokio::test]
    async fn test_passthrough_forwarding() {
        let agents = ScriptedAgents::default()
            .reply("get", Ok(json!({"articles": [], "source": "static"})))
            .reply("summarize", Ok(json!({"summaries": []})));
        let (executor, _, _) = executor(agents);
        let executor = executor.with_forwarding(ForwardingMode::Passthrough);
        let plan = StructuredPlan::sequential([("fetch", "get"), ("sum", "summarize")]);

        let trace = executor.execute(&plan, &snapshot(), json!({})).await.unwrap();
        assert_eq!(trace.steps[1].input_sent, json!({"articles": [], "source": "static"}));
    }

    #[tokio::test]
    async fn test_failure_keeps_earlier_results_and_stops() {
        let agents = ScriptedAgents::default()
            .reply("get", Ok(json!({"articles": ["a"]})))
            .reply(
                "summarize",
                Err(ClientError::Status {
                    status: 500,
                    body: "boom".into(),
                    waterdrops: Some(0.25),
                }),
            )
            .reply("check", Ok(json!({})));
        let (executor, agents, ledger) = executor(agents);
        let plan = StructuredPlan::sequential([("fetch", "get"), ("sum", "summarize"), ("audit", "check")]);

        let err = executor.execute(&plan, &snapshot(), json!({})).await.unwrap_err();
        let OrchestratorError::StepExecutionFailed { ordinal, failure, trace, .. } = err else {
            panic!("expected StepExecutionFailed");
        };
        assert_eq!(ordinal, 2);
        assert!(matches!(failure, StepFailure::Invocation { .. }));

        // k-1 successes followed by the failing step
        assert_eq!(trace.len(), 2);
        assert!(trace.steps[0].is_success());
        assert!(!trace.steps[1].is_success());
        assert_eq!(trace.steps[1].output_received, None);
        assert_eq!(trace.failed_step().map(|s| s.ordinal), Some(2));

        // step 3 never ran
        assert_eq!(agents.calls.lock().len(), 2);

        assert_eq!(ledger.total(), 0.5 + 0.25 + 0.25);
        assert_eq!(ledger.total(), trace.total_cost());
    }

    #[tokio::test]
    async fn test_timeout_is_distinguished() {
        let agents = ScriptedAgents::default()
            .reply("get", Err(ClientError::Timeout(std::time::Duration::from_secs(10))));
        let (executor, _, ledger) = executor(agents);
        let plan = StructuredPlan::sequential([("fetch", "get")]);

        let err = executor.execute(&plan, &snapshot(), json!({})).await.unwrap_err();
        match err {
            OrchestratorError::StepExecutionFailed { failure, .. } => {
                assert_eq!(failure, StepFailure::Timeout { timeout_ms: 10_000 });
            }
            other => panic!("unexpected {:?}", other),
        }
        // failed step reports no cost; only the overhead is charged
        assert_eq!(ledger.total(), 0.5);
    }

    #[tokio::test]
    async fn test_unresolved_step_dispatches_nothing() {
        let agents = ScriptedAgents::default().reply("get", Ok(json!({"articles": []})));
        let (executor, agents, ledger) = executor(agents);
        let plan = StructuredPlan::sequential([("fetch", "get"), ("sum", "translate")]);

        let err = executor.execute(&plan, &snapshot(), json!({})).await.unwrap_err();
        assert!(matches!(
            err,
            OrchestratorError::UnknownCapabilityReference { ordinal: 2, .. }
        ));
        assert!(agents.calls.lock().is_empty());
        assert!(ledger.is_empty());
    }

    #[tokio::test]
    async fn test_no_plan_runs_nothing() {
        let (executor, agents, ledger) = executor(ScriptedAgents::default());
        let trace = executor
            .execute(&StructuredPlan::no_plan(), &snapshot(), json!({}))
            .await
            .unwrap();
        assert!(trace.is_empty());
        assert!(trace.finished_at.is_some());
        assert!(agents.calls.lock().is_empty());
        assert!(ledger.is_empty());
    }

    #[tokio::test]
    async fn test_per_item_cost_estimate() {
        let per_item = ManifestCapability::new("summarize", list("articles"), list("summaries"))
            .with_cost(CostEstimate::PerItem {
                base: 0.5,
                per_item: 0.25,
                field: "articles".into(),
            });
        let snapshot: RegistrySnapshot = vec![
            agent("fetch", vec![cap("get", IoSpec::new(), list("articles"), 0.0)]),
            agent("sum", vec![per_item]),
        ]
        .into_iter()
        .collect();
        let agents = ScriptedAgents::default()
            .reply("get", Ok(json!({"articles": [1, 2, 3, 4]})))
            .reply("summarize", Ok(json!({"summaries": []})));
        let (executor, _, _) = executor(agents);
        let plan = StructuredPlan::sequential([("fetch", "get"), ("sum", "summarize")]);

        let trace = executor.execute(&plan, &snapshot, json!({})).await.unwrap();
        assert_eq!(trace.steps[1].waterdrops_used, 1.5);
    }
}
