//! Input/output validation against caller-declared schemas.
//!
//! The lifecycle manager only talks to the [`SchemaGate`] trait; schemas are
//! opaque JSON documents to the rest of the engine. [`JsonSchemaGate`] is the
//! shipped implementation, backed by the `jsonschema` crate, with compiled
//! validators memoized per schema document.

use std::sync::Arc;

use dashmap::DashMap;
use jsonschema::Validator;
use serde_json::Value;

/// A single schema violation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaViolation {
    /// Where in the value the violation sits, rendered as `a -> b -> 0`,
    /// or `root` for the value itself.
    pub path: String,
    /// The validator's message.
    pub message: String,
}

/// Validation seam used by the lifecycle manager.
pub trait SchemaGate: Send + Sync {
    /// Checks that `schema` is itself a usable schema document.
    fn check_schema(&self, schema: &Value) -> Result<(), String>;

    /// Validates `value` against `schema`, reporting the first violation.
    fn validate(&self, value: &Value, schema: &Value) -> Result<(), SchemaViolation>;
}

/// [`SchemaGate`] backed by the `jsonschema` crate.
///
/// # Examples
///
/// ```
/// use fnstore::{JsonSchemaGate, SchemaGate};
/// use serde_json::json;
///
/// let gate = JsonSchemaGate::new();
/// let schema = json!({
///     "type": "object",
///     "properties": {"x": {"type": "number"}},
///     "required": ["x"]
/// });
///
/// assert!(gate.validate(&json!({"x": 1}), &schema).is_ok());
///
/// let violation = gate.validate(&json!({"x": "a"}), &schema).unwrap_err();
/// assert_eq!(violation.path, "x");
/// ```
#[derive(Default)]
pub struct JsonSchemaGate {
    compiled: DashMap<String, Arc<Validator>>,
}

impl std::fmt::Debug for JsonSchemaGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonSchemaGate")
            .field("compiled", &self.compiled.len())
            .finish()
    }
}

impl JsonSchemaGate {
    /// Creates a gate with an empty validator cache.
    pub fn new() -> Self {
        Self::default()
    }

    fn validator(&self, schema: &Value) -> Result<Arc<Validator>, String> {
        let key = schema.to_string();
        if let Some(validator) = self.compiled.get(&key) {
            return Ok(Arc::clone(validator.value()));
        }
        let validator = Arc::new(jsonschema::validator_for(schema).map_err(|e| e.to_string())?);
        self.compiled.insert(key, Arc::clone(&validator));
        Ok(validator)
    }
}

impl SchemaGate for JsonSchemaGate {
    fn check_schema(&self, schema: &Value) -> Result<(), String> {
        self.validator(schema).map(|_| ())
    }

    fn validate(&self, value: &Value, schema: &Value) -> Result<(), SchemaViolation> {
        let validator = self.validator(schema).map_err(|message| SchemaViolation {
            path: "root".to_string(),
            message: format!("schema does not compile: {message}"),
        })?;
        validator.validate(value).map_err(|error| SchemaViolation {
            path: render_pointer(&error.instance_path().to_string()),
            message: error.to_string(),
        })
    }
}

/// Renders a JSON pointer (`/a/b/0`) as `a -> b -> 0`; the empty pointer is
/// `root`.
pub fn render_pointer(pointer: &str) -> String {
    let trimmed = pointer.trim_start_matches('/');
    if trimmed.is_empty() {
        return "root".to_string();
    }
    trimmed
        .split('/')
        .map(|segment| segment.replace("~1", "/").replace("~0", "~"))
        .collect::<Vec<_>>()
        .join(" -> ")
}
