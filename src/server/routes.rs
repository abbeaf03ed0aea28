//! Axum route handlers for the orchestrator HTTP server.
//!
//! # Routes
//!
//! - `GET  /health`             - Returns `{"status": "ok", "version": ..}`
//! - `POST /register_agent`     - `{agent_name, url}` → registered record
//! - `GET  /agents`             - Registered agents, in registration order
//! - `GET  /agents/connections` - Capability compatibility graph
//! - `GET  /agents/metrics`     - Every agent's `/metrics`, fetched concurrently
//! - `GET  /agents/:name`       - One registered agent
//! - `GET  /metrics`            - Orchestrator status
//! - `GET  /ledger`             - Waterdrop totals
//! - `POST /plan`               - `{goal}` → `{plan}`
//! - `POST /parse_plan`         - `{plan}` → structured plan
//! - `POST /execute_plan`       - `{plan, input?}` → execution trace
//! - `POST /run_goal`           - `{goal, input?}` → plan + trace

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::error::OrchestratorError;
use crate::orchestrator::{GoalOutcome, Orchestrator};
use crate::planning::StructuredPlan;

/// Shared application state for the HTTP server.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
}

impl AppState {
    pub fn new(orchestrator: Orchestrator) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
        }
    }
}

/// Build the axum router with all routes.
pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/register_agent", post(register_handler))
        .route("/agents", get(list_agents_handler))
        .route("/agents/connections", get(connections_handler))
        .route("/agents/metrics", get(agent_metrics_handler))
        .route("/agents/:name", get(get_agent_handler))
        .route("/metrics", get(metrics_handler))
        .route("/ledger", get(ledger_handler))
        .route("/plan", post(plan_handler))
        .route("/parse_plan", post(parse_plan_handler))
        .route("/execute_plan", post(execute_plan_handler))
        .route("/run_goal", post(run_goal_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// JSON rendering of an [`OrchestratorError`].
///
/// Body: `{stage, kind, error, ordinal?, trace?}`.
pub struct ApiError(pub OrchestratorError);

impl From<OrchestratorError> for ApiError {
    fn from(err: OrchestratorError) -> Self {
        Self(err)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match &self.0 {
            OrchestratorError::EmptyGoal => StatusCode::BAD_REQUEST,
            OrchestratorError::UnknownAgent(_) => StatusCode::NOT_FOUND,
            OrchestratorError::InvalidManifest { .. }
            | OrchestratorError::MalformedPlan { .. }
            | OrchestratorError::UnknownCapabilityReference { .. } => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            OrchestratorError::UnreachableAgent { .. }
            | OrchestratorError::StepExecutionFailed { .. } => StatusCode::BAD_GATEWAY,
            OrchestratorError::PlanningUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let err = &self.0;
        let mut body = json!({
            "stage": err.stage(),
            "kind": err.kind(),
            "error": err.to_string(),
        });
        if let Some(ordinal) = err.ordinal() {
            body["ordinal"] = json!(ordinal);
        }
        if let Some(trace) = err.partial_trace() {
            body["trace"] = json!(trace);
        }
        if status.is_server_error() {
            tracing::warn!(stage = %err.stage(), "{}", err);
        }
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

// ---------------------------------------------------------------------------
// Request bodies
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub agent_name: String,
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct GoalRequest {
    pub goal: String,
    #[serde(default)]
    pub input: Value,
}

#[derive(Debug, Deserialize)]
pub struct PlanTextRequest {
    pub plan: String,
    #[serde(default)]
    pub input: Value,
}

fn plan_json(plan: &StructuredPlan) -> Value {
    json!({
        "no_plan": plan.is_no_plan(),
        "steps": plan.steps(),
    })
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// GET /health - liveness probe.
async fn health_handler() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": crate::VERSION,
        "service": "clearcore",
    }))
}

/// POST /register_agent
async fn register_handler(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> ApiResult<Value> {
    let record = state
        .orchestrator
        .register(&request.agent_name, &request.url)
        .await?;
    Ok(Json(json!({
        "message": format!("Agent '{}' registered successfully.", record.name),
        "agent": record,
    })))
}

/// GET /agents
async fn list_agents_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!(state.orchestrator.list_agents()))
}

/// GET /agents/:name
async fn get_agent_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Value> {
    let record = state.orchestrator.get_agent(&name)?;
    Ok(Json(json!(record)))
}

/// GET /agents/connections
async fn connections_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!(state.orchestrator.connections()))
}

/// GET /agents/metrics
async fn agent_metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!(state.orchestrator.agent_metrics().await))
}

/// GET /metrics
async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!(state.orchestrator.status()))
}

/// GET /ledger
async fn ledger_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!(state.orchestrator.total_cost()))
}

/// POST /plan
async fn plan_handler(
    State(state): State<AppState>,
    Json(request): Json<GoalRequest>,
) -> ApiResult<Value> {
    let plan = state.orchestrator.generate_plan(&request.goal).await?;
    Ok(Json(json!({ "goal": request.goal, "plan": plan })))
}

/// POST /parse_plan
async fn parse_plan_handler(
    State(state): State<AppState>,
    Json(request): Json<PlanTextRequest>,
) -> ApiResult<Value> {
    let plan = state.orchestrator.parse_plan(&request.plan)?;
    Ok(Json(plan_json(&plan)))
}

/// POST /execute_plan
async fn execute_plan_handler(
    State(state): State<AppState>,
    Json(request): Json<PlanTextRequest>,
) -> ApiResult<Value> {
    let plan = state.orchestrator.parse_plan(&request.plan)?;
    let trace = state.orchestrator.execute_plan(&plan, request.input).await?;
    Ok(Json(json!({
        "plan": plan_json(&plan),
        "trace": trace,
    })))
}

/// POST /run_goal
async fn run_goal_handler(
    State(state): State<AppState>,
    Json(request): Json<GoalRequest>,
) -> ApiResult<Value> {
    let outcome = state.orchestrator.run_goal(&request.goal, request.input).await?;
    let body = match outcome {
        GoalOutcome::NoPlan { plan_text } => json!({
            "goal": request.goal,
            "no_plan": true,
            "plan": plan_text,
        }),
        GoalOutcome::Executed {
            plan_text,
            plan,
            trace,
        } => json!({
            "goal": request.goal,
            "no_plan": false,
            "plan": plan_text,
            "steps": plan.steps(),
            "trace": trace,
        }),
    };
    Ok(Json(body))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
