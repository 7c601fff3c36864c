//! Registered functions.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::ids::FunctionId;

/// The caller-supplied description of a function to register.
///
/// The type tag selects the executor (see
/// [`ExecutorRegistry`](crate::executor::ExecutorRegistry)) and the target
/// tells that executor what to invoke: `<path>:<symbol>` for local code, a
/// URL for remote functions.
///
/// # Examples
///
/// ```
/// use fnstore::{FunctionSpec, LOCAL_CODE_TYPE};
/// use serde_json::json;
///
/// let spec = FunctionSpec::new("addXY", LOCAL_CODE_TYPE, "math.rs:add")
///     .with_description("Adds x and y")
///     .with_input_schema(json!({
///         "type": "object",
///         "properties": {"x": {"type": "number"}, "y": {"type": "number"}},
///         "required": ["x", "y"]
///     }))
///     .with_tags(["math", "cacheable"]);
///
/// assert_eq!(spec.type_tag, "local.code");
/// assert_eq!(spec.tags.as_deref().map(<[String]>::len), Some(2));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionSpec {
    /// Human-readable name.
    pub name: String,

    /// Free-form description.
    #[serde(default)]
    pub description: String,

    /// Executor type tag, e.g. `local.code` or `remote.network`.
    #[serde(rename = "type")]
    pub type_tag: String,

    /// What the executor invokes.
    #[serde(alias = "url")]
    pub target: String,

    /// JSON Schema every input must satisfy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_schema: Option<Value>,

    /// JSON Schema the wrapped output (`{"result": ...}`) must satisfy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<Value>,

    /// Labels used by tag search.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

impl FunctionSpec {
    /// Creates a spec with no description, schemas, or tags.
    pub fn new(
        name: impl Into<String>,
        type_tag: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            type_tag: type_tag.into(),
            target: target.into(),
            input_schema: None,
            output_schema: None,
            tags: None,
        }
    }

    /// Sets the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Declares an input schema.
    pub fn with_input_schema(mut self, schema: Value) -> Self {
        self.input_schema = Some(schema);
        self
    }

    /// Declares an output schema.
    pub fn with_output_schema(mut self, schema: Value) -> Self {
        self.output_schema = Some(schema);
        self
    }

    /// Sets the tags.
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = Some(tags.into_iter().map(Into::into).collect());
        self
    }
}

/// A function as stored, with its assigned identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Function {
    /// Store-assigned identity.
    pub id: FunctionId,

    /// Human-readable name.
    pub name: String,

    /// Free-form description.
    #[serde(default)]
    pub description: String,

    /// Executor type tag.
    #[serde(rename = "type")]
    pub type_tag: String,

    /// What the executor invokes.
    pub target: String,

    /// JSON Schema every input must satisfy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_schema: Option<Value>,

    /// JSON Schema the wrapped output must satisfy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<Value>,

    /// Labels used by tag search.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

impl Function {
    /// Builds the stored form of `spec` under `id`.
    pub fn from_spec(id: FunctionId, spec: FunctionSpec) -> Self {
        Self {
            id,
            name: spec.name,
            description: spec.description,
            type_tag: spec.type_tag,
            target: spec.target,
            input_schema: spec.input_schema,
            output_schema: spec.output_schema,
            tags: spec.tags,
        }
    }

    /// Returns `true` if the function carries `tag`.
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags
            .as_ref()
            .is_some_and(|tags| tags.iter().any(|t| t == tag))
    }

    /// Tag search predicate.
    ///
    /// With `match_all` every requested tag must be present, otherwise any
    /// one suffices. A function without tags never matches.
    ///
    /// ```
    /// use fnstore::{Function, FunctionId, FunctionSpec};
    ///
    /// let f = Function::from_spec(
    ///     FunctionId::new(1),
    ///     FunctionSpec::new("f", "local.code", "f.rs:f").with_tags(["a", "b"]),
    /// );
    /// assert!(f.matches_tags(&["a", "z"], false));
    /// assert!(!f.matches_tags(&["a", "z"], true));
    /// assert!(f.matches_tags(&["b", "a"], true));
    /// ```
    pub fn matches_tags<S: AsRef<str>>(&self, tags: &[S], match_all: bool) -> bool {
        if self.tags.as_ref().is_none_or(Vec::is_empty) {
            return false;
        }
        if match_all {
            tags.iter().all(|tag| self.has_tag(tag.as_ref()))
        } else {
            tags.iter().any(|tag| self.has_tag(tag.as_ref()))
        }
    }
}
