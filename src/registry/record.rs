//! Registered agent records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::manifest::{AgentManifest, ManifestCapability};

/// A registered agent: where to reach it and what it declared.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentRecord {
    /// Registry key; unique.
    pub name: String,
    pub base_url: String,
    pub manifest: AgentManifest,
    pub registered_at: DateTime<Utc>,
}

impl AgentRecord {
    pub fn new(name: impl Into<String>, base_url: impl Into<String>, manifest: AgentManifest) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            manifest,
            registered_at: Utc::now(),
        }
    }

    pub fn capability(&self, name: &str) -> Option<&ManifestCapability> {
        self.manifest.capability(name)
    }
}

/// One (agent, capability) pair of the capability catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub agent: String,
    pub capability: ManifestCapability,
}
