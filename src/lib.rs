//! # ClearCore
//!
//! Orchestration engine for independently deployed, capability-declaring
//! agents. Agents register by URL and publish a manifest; a goal is turned
//! into an ordered plan by an external planning service, the plan text is
//! parsed strictly, and the steps are executed one after another against
//! the live agents, each output feeding the next input. Every registration,
//! planning call and execution is charged to a waterdrop ledger.
//!
//! ```text
//! registry ──► compatibility ──► planning (generate → parse) ──► execution
//!     └──────────────────────── ledger ◄─────────────────────────────┘
//! ```

pub mod client;
pub mod compatibility;
pub mod config;
pub mod error;
pub mod execution;
pub mod ledger;
pub mod manifest;
pub mod orchestrator;
pub mod planning;
pub mod registry;
pub mod server;

pub use config::OrchestratorConfig;
pub use error::{OrchestratorError, Result, Stage};
pub use execution::{ExecutionTrace, StepResult};
pub use ledger::{LedgerEntry, ResourceLedger};
pub use manifest::{AgentManifest, ManifestCapability};
pub use orchestrator::{GoalOutcome, Orchestrator};
pub use planning::{parse_plan, PlanStep, StructuredPlan};
pub use registry::{AgentRecord, AgentRegistry};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
