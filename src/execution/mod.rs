//! # Plan execution
//!
//! Runs structured plans step by step against live agents, forwarding each
//! output to the next step and recording an [`ExecutionTrace`].

pub mod executor;
pub mod trace;

pub use executor::PlanExecutor;
pub use trace::{ExecutionTrace, StepFailure, StepResult};
