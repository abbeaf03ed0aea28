//! Concurrency-safe agent registry.
//!
//! The record list lives behind an `Arc` that is swapped wholesale on every
//! write. Writers serialize on the lock; readers only clone the `Arc`, so a
//! [`RegistrySnapshot`] is immutable, never blocks other readers, and is not
//! affected by registrations that happen after it was taken.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::client::{AgentClient, ClientError};
use crate::error::{OrchestratorError, Result};
use crate::ledger::{Actor, OperationKind, ResourceLedger};
use crate::manifest::{is_identifier, ManifestCapability, ManifestValidator};

use super::record::{AgentRecord, CatalogEntry};

type Records = Arc<Vec<Arc<AgentRecord>>>;

// ---------------------------------------------------------------------------
// RegistrySnapshot
// ---------------------------------------------------------------------------

/// Point-in-time view of the registry, in registration order.
#[derive(Debug, Clone, Default)]
pub struct RegistrySnapshot {
    records: Records,
}

impl RegistrySnapshot {
    pub fn get(&self, name: &str) -> Option<&AgentRecord> {
        self.records.iter().find(|r| r.name == name).map(Arc::as_ref)
    }

    /// Resolve an (agent, capability) reference.
    pub fn resolve(&self, agent: &str, capability: &str) -> Option<(&AgentRecord, &ManifestCapability)> {
        let record = self.get(agent)?;
        let cap = record.capability(capability)?;
        Some((record, cap))
    }

    pub fn iter(&self) -> impl Iterator<Item = &AgentRecord> {
        self.records.iter().map(Arc::as_ref)
    }

    /// Every (agent, capability) pair, agents in registration order and
    /// capabilities in manifest order.
    pub fn catalog(&self) -> Vec<CatalogEntry> {
        self.iter()
            .flat_map(|record| {
                record.manifest.capabilities.iter().map(|cap| CatalogEntry {
                    agent: record.name.clone(),
                    capability: cap.clone(),
                })
            })
            .collect()
    }

    /// Owned copies of every record.
    pub fn to_records(&self) -> Vec<AgentRecord> {
        self.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl FromIterator<AgentRecord> for RegistrySnapshot {
    fn from_iter<I: IntoIterator<Item = AgentRecord>>(iter: I) -> Self {
        Self {
            records: Arc::new(iter.into_iter().map(Arc::new).collect()),
        }
    }
}

// ---------------------------------------------------------------------------
// AgentRegistry
// ---------------------------------------------------------------------------

/// Shared registry of agents and their validated manifests.
pub struct AgentRegistry {
    records: RwLock<Records>,
    client: Arc<dyn AgentClient>,
    validator: ManifestValidator,
    ledger: Arc<ResourceLedger>,
    registration_cost: f64,
}

impl std::fmt::Debug for AgentRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentRegistry")
            .field("agents", &self.records.read().len())
            .field("validator", &self.validator)
            .field("registration_cost", &self.registration_cost)
            .finish()
    }
}

impl AgentRegistry {
    pub fn new(
        client: Arc<dyn AgentClient>,
        ledger: Arc<ResourceLedger>,
        registration_cost: f64,
    ) -> Self {
        Self {
            records: RwLock::new(Arc::new(Vec::new())),
            client,
            validator: ManifestValidator::default(),
            ledger,
            registration_cost,
        }
    }

    /// Replace the manifest validator (custom schema template).
    pub fn with_validator(mut self, validator: ManifestValidator) -> Self {
        self.validator = validator;
        self
    }

    /// Fetch, validate and store an agent's manifest.
    ///
    /// The network round trip happens without holding the lock; only the
    /// final swap is serialized. Re-registering a name replaces the previous
    /// record in place.
    ///
    /// # Errors
    ///
    /// - `UnreachableAgent` when the manifest cannot be fetched.
    /// - `InvalidManifest` when the document fails validation.
    pub async fn register(&self, name: &str, base_url: &str) -> Result<AgentRecord> {
        let name = name.trim();
        if !is_identifier(name) {
            return Err(OrchestratorError::invalid_manifest(
                "agent_name",
                "must be a non-empty name of letters, digits, '_', '-' or '.'",
            ));
        }

        log::info!("Registering agent '{}' from {}", name, base_url);
        let document = self
            .client
            .fetch_manifest(base_url)
            .await
            .map_err(|err| match err {
                ClientError::MalformedBody(reason) => {
                    OrchestratorError::invalid_manifest("$", reason)
                }
                other => OrchestratorError::UnreachableAgent {
                    agent: name.to_string(),
                    url: base_url.to_string(),
                    reason: other.to_string(),
                },
            })?;

        let manifest = self.validator.validate(&document)?;
        if manifest.name != name {
            log::warn!(
                "Agent registered as '{}' declares manifest name '{}'",
                name,
                manifest.name
            );
        }

        let record = AgentRecord::new(name, base_url, manifest);
        self.insert(record.clone());
        self.ledger.charge(
            OperationKind::Registration,
            Actor::Agent(name.to_string()),
            self.registration_cost,
        );
        log::info!(
            "Agent '{}' registered with {} capabilities",
            name,
            record.manifest.capabilities.len()
        );
        Ok(record)
    }

    /// Insert or replace an already-validated record.
    pub fn insert(&self, record: AgentRecord) {
        let mut guard = self.records.write();
        let mut next: Vec<Arc<AgentRecord>> = guard.as_ref().clone();
        match next.iter().position(|r| r.name == record.name) {
            Some(index) => {
                log::debug!("Replacing registration of '{}'", record.name);
                next[index] = Arc::new(record);
            }
            None => next.push(Arc::new(record)),
        }
        *guard = Arc::new(next);
    }

    /// Look up one agent.
    pub fn get(&self, name: &str) -> Result<AgentRecord> {
        self.snapshot()
            .get(name)
            .cloned()
            .ok_or_else(|| OrchestratorError::UnknownAgent(name.to_string()))
    }

    /// All records, in registration order.
    pub fn list(&self) -> Vec<AgentRecord> {
        self.snapshot().to_records()
    }

    /// Consistent, immutable view for one planning/execution request.
    pub fn snapshot(&self) -> RegistrySnapshot {
        RegistrySnapshot {
            records: Arc::clone(&self.records.read()),
        }
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    pub fn client(&self) -> &Arc<dyn AgentClient> {
        &self.client
    }
}
