//! HTTP server for the orchestration engine.
//!
//! Exposes registration, catalog, planning and execution over JSON.
//!
//! # Endpoints
//!
//! - `GET  /health`  - Liveness probe
//! - `POST /register_agent`, `GET /agents[/..]` - Registry
//! - `POST /plan`, `/parse_plan`, `/execute_plan`, `/run_goal` - Pipeline
//! - `GET  /metrics`, `/ledger` - Accounting

pub mod routes;

pub use routes::{app_router, ApiError, AppState};
