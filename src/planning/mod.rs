//! # Planning
//!
//! Goal → plan text → [`StructuredPlan`]. Generation goes through an
//! external [`PlanningBackend`]; its text output is treated as a wire
//! protocol and parsed strictly by [`parse_plan`].

pub mod backend;
pub mod generator;
pub mod parser;
pub mod plan;

pub use backend::{ChatCompletionsBackend, PlanningBackend, PlanningPrompt};
pub use generator::PlanGenerator;
pub use parser::parse_plan;
pub use plan::{PlanStep, StructuredPlan, NO_PLAN_SENTINEL};
