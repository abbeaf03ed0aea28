//! Strongly-typed manifest records.
//!
//! A raw manifest arrives as JSON and is turned into these types by the
//! [`ManifestValidator`](super::ManifestValidator). Everything downstream
//! (registry, compatibility analysis, planning, execution) works with the
//! typed form only.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ---------------------------------------------------------------------------
// Field types
// ---------------------------------------------------------------------------

/// Coarse type of a declared input/output field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Number,
    Integer,
    Boolean,
    List,
    Object,
    Any,
}

impl FieldType {
    /// Parse a type name, accepting the common aliases.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "string" | "str" | "text" => Some(Self::String),
            "number" | "float" => Some(Self::Number),
            "integer" | "int" => Some(Self::Integer),
            "boolean" | "bool" => Some(Self::Boolean),
            "list" | "array" => Some(Self::List),
            "object" | "dict" | "map" => Some(Self::Object),
            "any" => Some(Self::Any),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
            Self::List => "list",
            Self::Object => "object",
            Self::Any => "any",
        }
    }

    /// Whether a field of type `produced` can fill a slot of this type.
    ///
    /// Best-effort: `any` on either side matches, and an integer is an
    /// acceptable number.
    pub fn accepts(&self, produced: FieldType) -> bool {
        match (self, produced) {
            (Self::Any, _) | (_, Self::Any) => true,
            (Self::Number, Self::Integer) => true,
            (expected, produced) => *expected == produced,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One declared field of an input or output spec.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default = "default_required")]
    pub required: bool,
}

fn default_required() -> bool {
    true
}

impl FieldSpec {
    pub fn required(field_type: FieldType) -> Self {
        Self {
            field_type,
            required: true,
        }
    }

    pub fn optional(field_type: FieldType) -> Self {
        Self {
            field_type,
            required: false,
        }
    }
}

// ---------------------------------------------------------------------------
// IoSpec
// ---------------------------------------------------------------------------

/// Structural schema of a capability's input or output: field name → type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IoSpec {
    fields: BTreeMap<String, FieldSpec>,
}

impl IoSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with_field(mut self, name: impl Into<String>, spec: FieldSpec) -> Self {
        self.fields.insert(name.into(), spec);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, spec: FieldSpec) {
        self.fields.insert(name.into(), spec);
    }

    pub fn get(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.get(name)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldSpec)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Fields that must be present for the capability to run.
    pub fn required_fields(&self) -> impl Iterator<Item = (&str, &FieldSpec)> {
        self.fields().filter(|(_, spec)| spec.required)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Keep only the declared fields of `payload`.
    ///
    /// Non-object payloads and empty specs are returned unchanged: there is
    /// nothing to select from, or nothing declared to select.
    pub fn select(&self, payload: &Value) -> Value {
        let Some(object) = payload.as_object() else {
            return payload.clone();
        };
        if self.fields.is_empty() {
            return payload.clone();
        }
        let selected: Map<String, Value> = object
            .iter()
            .filter(|(key, _)| self.fields.contains_key(key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        Value::Object(selected)
    }

    /// Compact one-line rendering used in planning prompts.
    pub fn describe(&self) -> String {
        if self.fields.is_empty() {
            return "{}".to_string();
        }
        let parts: Vec<String> = self
            .fields
            .iter()
            .map(|(name, spec)| {
                if spec.required {
                    format!("{}: {}", name, spec.field_type)
                } else {
                    format!("{}?: {}", name, spec.field_type)
                }
            })
            .collect();
        format!("{{{}}}", parts.join(", "))
    }
}

// ---------------------------------------------------------------------------
// Cost estimate
// ---------------------------------------------------------------------------

/// Declared per-call cost of a capability, in waterdrops.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CostEstimate {
    /// Same cost for every call.
    Fixed(f64),
    /// `base + per_item * len(input[field])`.
    PerItem {
        base: f64,
        per_item: f64,
        field: String,
    },
}

impl Default for CostEstimate {
    fn default() -> Self {
        Self::Fixed(0.0)
    }
}

impl CostEstimate {
    /// The per-call baseline, independent of input.
    pub fn baseline(&self) -> f64 {
        match self {
            Self::Fixed(amount) => *amount,
            Self::PerItem { base, .. } => *base,
        }
    }

    /// Estimated cost for one call with the given input.
    pub fn estimate(&self, input: &Value) -> f64 {
        match self {
            Self::Fixed(amount) => *amount,
            Self::PerItem {
                base,
                per_item,
                field,
            } => {
                let items = input
                    .get(field)
                    .and_then(Value::as_array)
                    .map_or(0, Vec::len);
                base + per_item * items as f64
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Capability + manifest
// ---------------------------------------------------------------------------

/// One unit of work an agent declares.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestCapability {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub input_spec: IoSpec,
    #[serde(default)]
    pub output_spec: IoSpec,
    #[serde(default)]
    pub cost_estimate: CostEstimate,
}

impl ManifestCapability {
    pub fn new(name: impl Into<String>, input_spec: IoSpec, output_spec: IoSpec) -> Self {
        Self {
            name: name.into(),
            description: None,
            input_spec,
            output_spec,
            cost_estimate: CostEstimate::default(),
        }
    }

    pub fn with_cost(mut self, cost: CostEstimate) -> Self {
        self.cost_estimate = cost;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// A validated agent manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentManifest {
    pub name: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub capabilities: Vec<ManifestCapability>,
}

impl AgentManifest {
    pub fn capability(&self, name: &str) -> Option<&ManifestCapability> {
        self.capabilities.iter().find(|c| c.name == name)
    }

    pub fn capability_names(&self) -> Vec<&str> {
        self.capabilities.iter().map(|c| c.name.as_str()).collect()
    }
}

/// Whether `name` is usable as an agent or capability name in plan text.
pub fn is_identifier(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}
