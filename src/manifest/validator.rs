//! Manifest validation against the shared schema template.
//!
//! Validation is pure: the same document always yields the same
//! [`AgentManifest`] or the same first error. A manifest is either accepted
//! as a whole or rejected; nothing is partially kept.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{OrchestratorError, Result};

use super::types::{
    is_identifier, AgentManifest, CostEstimate, FieldSpec, FieldType, IoSpec, ManifestCapability,
};

/// Keys every manifest (and every capability inside it) must carry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestTemplate {
    #[serde(default = "default_required_fields")]
    pub required_fields: Vec<String>,
    #[serde(default = "default_capability_fields")]
    pub capability_fields: Vec<String>,
}

fn default_required_fields() -> Vec<String> {
    vec!["name".into(), "version".into(), "capabilities".into()]
}

fn default_capability_fields() -> Vec<String> {
    vec!["name".into(), "input_spec".into(), "output_spec".into()]
}

impl Default for ManifestTemplate {
    fn default() -> Self {
        Self {
            required_fields: default_required_fields(),
            capability_fields: default_capability_fields(),
        }
    }
}

/// Validates raw manifest documents and normalizes them.
#[derive(Debug, Clone, Default)]
pub struct ManifestValidator {
    template: ManifestTemplate,
}

impl ManifestValidator {
    pub fn new(template: ManifestTemplate) -> Self {
        Self { template }
    }

    pub fn template(&self) -> &ManifestTemplate {
        &self.template
    }

    /// Validate a manifest document.
    ///
    /// # Errors
    ///
    /// `InvalidManifest` naming the first missing or malformed field, as a
    /// dotted path such as `capabilities[1].output_spec.summaries`.
    pub fn validate(&self, document: &Value) -> Result<AgentManifest> {
        let root = document
            .as_object()
            .ok_or_else(|| OrchestratorError::invalid_manifest("$", "must be a JSON object"))?;

        let mut name = None;
        let mut version = None;
        let mut description = None;
        let mut capabilities = None;

        // Template keys first, each checked for presence and shape before the next.
        let known = ["name", "version", "description", "capabilities"];
        let order = self
            .template
            .required_fields
            .iter()
            .map(String::as_str)
            .chain(known.iter().copied());
        for field in order {
            if self.template.required_fields.iter().any(|f| f == field) {
                require_present(root, field, field)?;
            }
            match field {
                "name" if name.is_none() => name = Some(non_empty_string(root, "name", "name")?),
                "version" if version.is_none() => {
                    version = Some(non_empty_string(root, "version", "version")?)
                }
                "description" if description.is_none() => {
                    description = Some(optional_string(root, "description", "description")?)
                }
                "capabilities" if capabilities.is_none() => {
                    capabilities = Some(self.validate_capabilities(root.get("capabilities"))?)
                }
                _ => {}
            }
        }

        let (Some(name), Some(version), Some(description), Some(capabilities)) =
            (name, version, description, capabilities)
        else {
            return Err(OrchestratorError::invalid_manifest("$", "incomplete manifest"));
        };

        Ok(AgentManifest {
            name,
            version,
            description,
            capabilities,
        })
    }

    fn validate_capabilities(&self, raw: Option<&Value>) -> Result<Vec<ManifestCapability>> {
        let raw_caps = raw
            .filter(|v| !v.is_null())
            .ok_or_else(|| OrchestratorError::invalid_manifest("capabilities", "is missing"))?
            .as_array()
            .ok_or_else(|| OrchestratorError::invalid_manifest("capabilities", "must be a list"))?;
        if raw_caps.is_empty() {
            return Err(OrchestratorError::invalid_manifest(
                "capabilities",
                "must declare at least one capability",
            ));
        }

        let mut seen = HashSet::new();
        let mut capabilities = Vec::with_capacity(raw_caps.len());
        for (index, raw) in raw_caps.iter().enumerate() {
            let path = format!("capabilities[{}]", index);
            let capability = self.validate_capability(&path, raw)?;
            if !seen.insert(capability.name.clone()) {
                return Err(OrchestratorError::invalid_manifest(
                    format!("{}.name", path),
                    format!("duplicates capability '{}'", capability.name),
                ));
            }
            capabilities.push(capability);
        }
        Ok(capabilities)
    }

    fn validate_capability(&self, path: &str, raw: &Value) -> Result<ManifestCapability> {
        let object = raw
            .as_object()
            .ok_or_else(|| OrchestratorError::invalid_manifest(path, "must be an object"))?;

        let mut name = None;
        let mut description = None;
        let mut input_spec = None;
        let mut output_spec = None;
        let mut cost_estimate = None;

        let known = ["name", "description", "input_spec", "output_spec", "cost_estimate"];
        let order = self
            .template
            .capability_fields
            .iter()
            .map(String::as_str)
            .chain(known.iter().copied());
        for field in order {
            let field_path = format!("{}.{}", path, field);
            if self.template.capability_fields.iter().any(|f| f == field) {
                require_present(object, field, &field_path)?;
            }
            match field {
                "name" if name.is_none() => {
                    let value = non_empty_string(object, "name", &field_path)?;
                    if !is_identifier(&value) {
                        return Err(OrchestratorError::invalid_manifest(
                            field_path,
                            "may only contain letters, digits, '_', '-' and '.'",
                        ));
                    }
                    name = Some(value);
                }
                "description" if description.is_none() => {
                    description = Some(optional_string(object, "description", &field_path)?)
                }
                "input_spec" if input_spec.is_none() => {
                    input_spec = Some(parse_io_spec(object.get("input_spec"), &field_path)?)
                }
                "output_spec" if output_spec.is_none() => {
                    output_spec = Some(parse_io_spec(object.get("output_spec"), &field_path)?)
                }
                "cost_estimate" if cost_estimate.is_none() => {
                    cost_estimate = Some(parse_cost(object.get("cost_estimate"), &field_path)?)
                }
                _ => {}
            }
        }

        let (Some(name), Some(description), Some(input_spec), Some(output_spec), Some(cost_estimate)) =
            (name, description, input_spec, output_spec, cost_estimate)
        else {
            return Err(OrchestratorError::invalid_manifest(path, "incomplete capability"));
        };

        Ok(ManifestCapability {
            name,
            description,
            input_spec,
            output_spec,
            cost_estimate,
        })
    }
}

/// Validate with the default template.
pub fn validate(document: &Value) -> Result<AgentManifest> {
    ManifestValidator::default().validate(document)
}

// ---------------------------------------------------------------------------
// Field helpers
// ---------------------------------------------------------------------------

fn require_present(object: &Map<String, Value>, key: &str, path: &str) -> Result<()> {
    match object.get(key) {
        None | Some(Value::Null) => Err(OrchestratorError::invalid_manifest(path, "is missing")),
        Some(_) => Ok(()),
    }
}

fn non_empty_string(object: &Map<String, Value>, key: &str, path: &str) -> Result<String> {
    match object.get(key) {
        None | Some(Value::Null) => Err(OrchestratorError::invalid_manifest(path, "is missing")),
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        Some(Value::String(_)) => Err(OrchestratorError::invalid_manifest(path, "must not be empty")),
        Some(_) => Err(OrchestratorError::invalid_manifest(path, "must be a string")),
    }
}

fn optional_string(object: &Map<String, Value>, key: &str, path: &str) -> Result<Option<String>> {
    match object.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.trim().to_string())),
        Some(_) => Err(OrchestratorError::invalid_manifest(path, "must be a string")),
    }
}

fn parse_io_spec(raw: Option<&Value>, path: &str) -> Result<IoSpec> {
    let object = match raw {
        None | Some(Value::Null) => return Ok(IoSpec::new()),
        Some(Value::Object(object)) => object,
        Some(_) => {
            return Err(OrchestratorError::invalid_manifest(
                path,
                "must be a mapping of field name to type",
            ))
        }
    };

    let mut spec = IoSpec::new();
    for (field, declared) in object {
        let field_path = format!("{}.{}", path, field);
        if field.trim().is_empty() {
            return Err(OrchestratorError::invalid_manifest(field_path, "field name must not be empty"));
        }
        if spec.get(field.trim()).is_some() {
            return Err(OrchestratorError::invalid_manifest(
                field_path,
                format!("duplicates field '{}'", field.trim()),
            ));
        }
        spec.insert(field.trim(), parse_field_spec(declared, &field_path)?);
    }
    Ok(spec)
}

fn parse_field_spec(declared: &Value, path: &str) -> Result<FieldSpec> {
    match declared {
        Value::String(type_name) => parse_type(type_name, path).map(FieldSpec::required),
        Value::Object(object) => {
            let type_name = match object.get("type") {
                Some(Value::String(t)) => t,
                Some(_) => {
                    return Err(OrchestratorError::invalid_manifest(
                        format!("{}.type", path),
                        "must be a string",
                    ))
                }
                None => {
                    return Err(OrchestratorError::invalid_manifest(
                        format!("{}.type", path),
                        "is missing",
                    ))
                }
            };
            let field_type = parse_type(type_name, &format!("{}.type", path))?;
            let required = match object.get("required") {
                None | Some(Value::Null) => true,
                Some(Value::Bool(b)) => *b,
                Some(_) => {
                    return Err(OrchestratorError::invalid_manifest(
                        format!("{}.required", path),
                        "must be a boolean",
                    ))
                }
            };
            Ok(FieldSpec {
                field_type,
                required,
            })
        }
        _ => Err(OrchestratorError::invalid_manifest(
            path,
            "must be a type name or {type, required}",
        )),
    }
}

fn parse_type(name: &str, path: &str) -> Result<FieldType> {
    FieldType::parse(name).ok_or_else(|| {
        OrchestratorError::invalid_manifest(path, format!("unknown type '{}'", name))
    })
}

fn parse_cost(raw: Option<&Value>, path: &str) -> Result<CostEstimate> {
    match raw {
        None | Some(Value::Null) => Ok(CostEstimate::default()),
        Some(Value::Number(n)) => {
            let amount = n.as_f64().unwrap_or_default();
            non_negative(amount, path).map(CostEstimate::Fixed)
        }
        Some(Value::Object(object)) => {
            let number = |key: &str| -> Result<f64> {
                let sub_path = format!("{}.{}", path, key);
                match object.get(key) {
                    None | Some(Value::Null) => Ok(0.0),
                    Some(Value::Number(n)) => non_negative(n.as_f64().unwrap_or_default(), &sub_path),
                    Some(_) => Err(OrchestratorError::invalid_manifest(sub_path, "must be a number")),
                }
            };
            let base = number("base")?;
            match object.get("per_item") {
                None | Some(Value::Null) => Ok(CostEstimate::Fixed(base)),
                Some(_) => {
                    let per_item = number("per_item")?;
                    let field = non_empty_string(object, "field", &format!("{}.field", path))?;
                    Ok(CostEstimate::PerItem {
                        base,
                        per_item,
                        field,
                    })
                }
            }
        }
        Some(_) => Err(OrchestratorError::invalid_manifest(
            path,
            "must be a number or {base, per_item, field}",
        )),
    }
}

fn non_negative(amount: f64, path: &str) -> Result<f64> {
    if amount.is_finite() && amount >= 0.0 {
        Ok(amount)
    } else {
        Err(OrchestratorError::invalid_manifest(path, "must be a non-negative number"))
    }
}
