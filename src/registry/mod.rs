//! # Agent registry
//!
//! Holds every registered agent with its validated manifest. It is the only
//! state shared and mutated across concurrent requests; planning and
//! execution work on an immutable [`RegistrySnapshot`].

pub mod agent_registry;
pub mod record;

pub use agent_registry::{AgentRegistry, RegistrySnapshot};
pub use record::{AgentRecord, CatalogEntry};
