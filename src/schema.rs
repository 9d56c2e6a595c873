use std::collections::{BTreeMap, BTreeSet};

use jsonschema::validator_for;
use serde_json::{json, Map, Value};

use crate::error::ConfigError;

/// Name of a JSON value's type, for error messages.
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SchemaValidationError {
    #[error("schema compile error: {0}")]
    SchemaCompile(String),
    #[error("arguments failed schema validation")]
    ValidationFailed,
}

/// Declarative description of the arguments a capability accepts.
///
/// `properties` maps argument names to opaque schema fragments; `required`
/// names the subset that must be present at call time. `required` is not
/// checked against `properties` at construction — a stray required name only
/// surfaces when a call is validated.
///
/// Equality is canonical-form equality: key presence and required-set
/// membership, independent of insertion order (the ordered containers make
/// this structural).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputSchema {
    properties: BTreeMap<String, Value>,
    required: BTreeSet<String>,
}

impl InputSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an argument with its schema fragment (e.g. `{"type": "string"}`).
    pub fn property(mut self, name: impl Into<String>, fragment: Value) -> Self {
        self.properties.insert(name.into(), fragment);
        self
    }

    /// Mark an argument name as required.
    pub fn require(mut self, name: impl Into<String>) -> Self {
        self.required.insert(name.into());
        self
    }

    pub fn properties(&self) -> &BTreeMap<String, Value> {
        &self.properties
    }

    pub fn required(&self) -> &BTreeSet<String> {
        &self.required
    }

    /// Normalize a schema-shaped JSON value into an `InputSchema`.
    ///
    /// Accepts an object carrying `properties` and/or `required`, with or
    /// without the canonical `"type": "object"` wrapper. Anything else is a
    /// configuration error naming the offending JSON type — never a silent
    /// coercion.
    pub fn from_value(value: &Value) -> Result<Self, ConfigError> {
        let Some(obj) = value.as_object() else {
            return Err(ConfigError::InvalidSchemaShape {
                found: json_type_name(value),
            });
        };

        let mut schema = Self::new();

        if let Some(props) = obj.get("properties") {
            let Some(map) = props.as_object() else {
                return Err(ConfigError::InvalidSchemaShape {
                    found: json_type_name(props),
                });
            };
            for (name, fragment) in map {
                schema.properties.insert(name.clone(), fragment.clone());
            }
        }

        if let Some(req) = obj.get("required") {
            let Some(items) = req.as_array() else {
                return Err(ConfigError::InvalidSchemaShape {
                    found: json_type_name(req),
                });
            };
            for item in items {
                let Some(name) = item.as_str() else {
                    return Err(ConfigError::InvalidSchemaShape {
                        found: json_type_name(item),
                    });
                };
                schema.required.insert(name.to_string());
            }
        }

        Ok(schema)
    }

    /// Canonical external form: `{"type": "object", "properties", "required"}`.
    ///
    /// Pure and deterministic; property keys and required names come out in
    /// sorted order.
    pub fn to_canonical(&self) -> Value {
        let mut props = Map::new();
        for (name, fragment) in &self.properties {
            props.insert(name.clone(), fragment.clone());
        }
        json!({
            "type": "object",
            "properties": props,
            "required": self.required.iter().cloned().collect::<Vec<_>>(),
        })
    }

    /// Every required name absent from `args`'s key set.
    pub fn missing_required(&self, args: &Map<String, Value>) -> BTreeSet<String> {
        self.required
            .iter()
            .filter(|name| !args.contains_key(name.as_str()))
            .cloned()
            .collect()
    }

    pub fn has_missing_required(&self, args: &Map<String, Value>) -> bool {
        !self.missing_required(args).is_empty()
    }

    /// Validate an argument object against the full canonical schema
    /// (draft 2020-12). Used only when strict argument checking is enabled;
    /// the required-keys check above is the core contract.
    pub fn validate_instance(&self, args: &Value) -> Result<(), SchemaValidationError> {
        let canonical = self.to_canonical();
        let validator = validator_for(&canonical)
            .map_err(|e| SchemaValidationError::SchemaCompile(e.to_string()))?;

        if validator.is_valid(args) {
            Ok(())
        } else {
            Err(SchemaValidationError::ValidationFailed)
        }
    }
}
