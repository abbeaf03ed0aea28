//! # Agent manifests
//!
//! An agent describes itself with a manifest: its name, version and the
//! capabilities it offers, each with a structural input/output spec and a
//! cost estimate. Manifests arrive as untyped JSON from the network and are
//! validated once, at the registry boundary, into [`AgentManifest`].

pub mod types;
pub mod validator;

pub use types::{
    is_identifier, AgentManifest, CostEstimate, FieldSpec, FieldType, IoSpec, ManifestCapability,
};
pub use validator::{validate, ManifestTemplate, ManifestValidator};
