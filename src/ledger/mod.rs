//! # Resource ledger
//!
//! Append-only record of waterdrop charges. Totals are always recomputed from
//! the entry log, so a total can never disagree with the entries behind it.
//! Appends are atomic per entry; a concurrent reader sees some prefix of the
//! log, never a half-written entry.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// What a charge was for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Registration,
    Planning,
    Execution,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Registration => "registration",
            Self::Planning => "planning",
            Self::Execution => "execution",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who a charge is attributed to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Actor {
    Orchestrator,
    Agent(String),
}

impl Actor {
    /// Grouping key for totals. Agents are prefixed so that an agent named
    /// `orchestrator` never merges with the orchestrator's own charges.
    pub fn key(&self) -> String {
        match self {
            Self::Orchestrator => "orchestrator".to_string(),
            Self::Agent(name) => format!("agent:{}", name),
        }
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Orchestrator => f.write_str("orchestrator"),
            Self::Agent(name) => f.write_str(name),
        }
    }
}

/// One immutable ledger line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub operation: OperationKind,
    pub actor: Actor,
    pub amount: f64,
    pub timestamp: DateTime<Utc>,
}

impl LedgerEntry {
    pub fn new(operation: OperationKind, actor: Actor, amount: f64) -> Self {
        Self {
            operation,
            actor,
            amount,
            timestamp: Utc::now(),
        }
    }
}

/// Aggregated view over the ledger.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LedgerSummary {
    pub total: f64,
    pub by_actor: BTreeMap<String, f64>,
    pub by_operation: BTreeMap<String, f64>,
    pub entry_count: usize,
}

/// Process-lifetime waterdrop ledger.
#[derive(Debug, Default)]
pub struct ResourceLedger {
    entries: RwLock<Vec<LedgerEntry>>,
}

impl ResourceLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry. Returns its position in the log.
    pub fn record(&self, entry: LedgerEntry) -> usize {
        log::debug!(
            "Ledger: {} charged to {} ({:.4} waterdrops)",
            entry.operation,
            entry.actor,
            entry.amount,
        );
        let mut entries = self.entries.write();
        entries.push(entry);
        entries.len() - 1
    }

    /// Convenience for `record(LedgerEntry::new(..))`.
    pub fn charge(&self, operation: OperationKind, actor: Actor, amount: f64) -> usize {
        self.record(LedgerEntry::new(operation, actor, amount))
    }

    /// Sum of every recorded amount.
    pub fn total(&self) -> f64 {
        self.entries.read().iter().map(|e| e.amount).sum()
    }

    /// Totals grouped by actor.
    pub fn total_by_actor(&self) -> BTreeMap<String, f64> {
        let mut totals = BTreeMap::new();
        for entry in self.entries.read().iter() {
            *totals.entry(entry.actor.key()).or_insert(0.0) += entry.amount;
        }
        totals
    }

    /// Totals grouped by operation kind.
    pub fn total_by_operation(&self) -> BTreeMap<String, f64> {
        let mut totals = BTreeMap::new();
        for entry in self.entries.read().iter() {
            *totals.entry(entry.operation.to_string()).or_insert(0.0) += entry.amount;
        }
        totals
    }

    /// Snapshot of every entry, oldest first.
    pub fn entries(&self) -> Vec<LedgerEntry> {
        self.entries.read().clone()
    }

    /// Entries appended at or after position `from`.
    pub fn entries_since(&self, from: usize) -> Vec<LedgerEntry> {
        let entries = self.entries.read();
        entries.get(from..).map(<[LedgerEntry]>::to_vec).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// All aggregates computed from one consistent read of the log.
    pub fn summary(&self) -> LedgerSummary {
        let entries = self.entries.read();
        let mut summary = LedgerSummary {
            entry_count: entries.len(),
            ..LedgerSummary::default()
        };
        for entry in entries.iter() {
            summary.total += entry.amount;
            *summary.by_actor.entry(entry.actor.key()).or_insert(0.0) += entry.amount;
            *summary
                .by_operation
                .entry(entry.operation.to_string())
                .or_insert(0.0) += entry.amount;
        }
        summary
    }
}
