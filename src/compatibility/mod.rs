//! # Compatibility analysis
//!
//! Derives which capabilities can feed which from their declared shapes.
//! Capability A can feed B when every *required* input field of B is
//! declared in A's output with a compatible coarse type. The graph is
//! advisory: the executor never re-checks it.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize, Serializer};

use crate::manifest::ManifestCapability;
use crate::registry::RegistrySnapshot;

/// Fully qualified capability reference.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CapabilityRef {
    pub agent: String,
    pub capability: String,
}

impl CapabilityRef {
    pub fn new(agent: impl Into<String>, capability: impl Into<String>) -> Self {
        Self {
            agent: agent.into(),
            capability: capability.into(),
        }
    }
}

impl fmt::Display for CapabilityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} → {}", self.agent, self.capability)
    }
}

/// One directed edge of the graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    pub from: CapabilityRef,
    pub to: CapabilityRef,
}

/// Directed graph: capability → capabilities it can feed.
///
/// Every capability in the analyzed snapshot is a node, including those
/// with no outgoing edge.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompatibilityGraph {
    edges: BTreeMap<CapabilityRef, BTreeSet<CapabilityRef>>,
}

impl CompatibilityGraph {
    /// Whether `from` can feed `to`.
    pub fn can_feed(&self, from: &CapabilityRef, to: &CapabilityRef) -> bool {
        self.edges.get(from).is_some_and(|targets| targets.contains(to))
    }

    /// Capabilities `from` can feed, in name order.
    pub fn successors(&self, from: &CapabilityRef) -> impl Iterator<Item = &CapabilityRef> {
        self.edges.get(from).into_iter().flatten()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &CapabilityRef> {
        self.edges.keys()
    }

    /// All edges, sorted by (from, to).
    pub fn connections(&self) -> Vec<Connection> {
        self.edges
            .iter()
            .flat_map(|(from, targets)| {
                targets.iter().map(move |to| Connection {
                    from: from.clone(),
                    to: to.clone(),
                })
            })
            .collect()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.values().map(BTreeSet::len).sum()
    }

    pub fn node_count(&self) -> usize {
        self.edges.len()
    }
}

impl Serialize for CompatibilityGraph {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Wire {
            nodes: Vec<CapabilityRef>,
            connections: Vec<Connection>,
        }
        Wire {
            nodes: self.nodes().cloned().collect(),
            connections: self.connections(),
        }
        .serialize(serializer)
    }
}

/// Whether `producer`'s declared output satisfies `consumer`'s required input.
///
/// A consumer with no required inputs is fed by anything.
pub fn is_compatible(producer: &ManifestCapability, consumer: &ManifestCapability) -> bool {
    consumer.input_spec.required_fields().all(|(name, wanted)| {
        producer
            .output_spec
            .get(name)
            .is_some_and(|produced| wanted.field_type.accepts(produced.field_type))
    })
}

/// Build the compatibility graph for every ordered pair of distinct
/// capabilities in the snapshot.
pub fn analyze(snapshot: &RegistrySnapshot) -> CompatibilityGraph {
    let catalog = snapshot.catalog();
    let mut edges: BTreeMap<CapabilityRef, BTreeSet<CapabilityRef>> = BTreeMap::new();

    for producer in &catalog {
        let from = CapabilityRef::new(&producer.agent, &producer.capability.name);
        let targets = edges.entry(from.clone()).or_default();
        for consumer in &catalog {
            let to = CapabilityRef::new(&consumer.agent, &consumer.capability.name);
            if to != from && is_compatible(&producer.capability, &consumer.capability) {
                targets.insert(to);
            }
        }
    }

    let graph = CompatibilityGraph { edges };
    log::debug!(
        "Compatibility graph: {} capabilities, {} connections",
        graph.node_count(),
        graph.edge_count()
    );
    graph
}
