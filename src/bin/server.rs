//! ClearCore orchestrator HTTP server binary.
//!
//! Starts an axum HTTP server exposing agent registration, planning and
//! plan execution.
//!
//! # Environment Variables
//!
//! - `CLEARCORE_CONFIG` - Optional YAML configuration file
//! - `CLEARCORE_BIND` - Bind address (default: 0.0.0.0:8000)
//! - `PORT` - HTTP port, used when `CLEARCORE_BIND` is unset
//! - `CLEARCORE_AGENT_TIMEOUT` - Per-call agent timeout in seconds (default: 10)
//! - `CLEARCORE_PLANNER_URL` / `CLEARCORE_PLANNER_MODEL` - Planning service
//! - `MISTRAL_API_KEY` - Planning service key (name configurable)
//! - `RUST_LOG` - Tracing filter (default: "info,clearcore=debug")
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin server
//! ```

use anyhow::Context;
use clearcore::config::OrchestratorConfig;
use clearcore::server::{app_router, AppState};
use clearcore::Orchestrator;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,clearcore=debug".into()),
        )
        .init();

    let config = OrchestratorConfig::load().context("loading configuration")?;
    let bind_addr = config.bind_addr.clone();

    let orchestrator = Orchestrator::from_config(config).context("building orchestrator")?;
    let app = app_router(AppState::new(orchestrator));

    tracing::info!("clearcore orchestrator {} starting on {}", clearcore::VERSION, bind_addr);
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /health          - liveness probe");
    tracing::info!("  POST /register_agent  - register an agent by URL");
    tracing::info!("  GET  /agents          - registered agents");
    tracing::info!("  POST /run_goal        - plan and execute a goal");

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding {}", bind_addr))?;

    axum::serve(listener, app).await.context("server failed")?;
    Ok(())
}
