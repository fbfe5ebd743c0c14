use super::parse::ArgValue;
use once_cell::sync::Lazy;
use serde_json::{json, Value};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// Schema for a JSON number.
pub static NUMBER_TYPE: Lazy<Value> = Lazy::new(|| json!({ "type": "number" }));

/// Schema for a JSON string.
pub static STRING_TYPE: Lazy<Value> = Lazy::new(|| json!({ "type": "string" }));

/// Schema for a lowercase, hyphenated UUID string.
pub static UUID_TYPE: Lazy<Value> = Lazy::new(|| {
    json!({
        "type": "string",
        "pattern": "^[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}$"
    })
});

/// Errors in a parameter declaration. These surface when an endpoint is
/// built, never while serving a request.
#[derive(Debug, thiserror::Error)]
pub enum ParamSpecError {
    #[error("parameter {0:?}: required parameters can't have a default")]
    RequiredWithDefault(String),
    #[error("parameter {0:?}: enum parameters need at least one allowed value")]
    EmptyEnum(String),
    #[error("parameter {name:?}: minimum {min} is greater than maximum {max}")]
    InvalidBounds { name: String, min: i64, max: i64 },
    #[error("parameter {0:?} is declared twice")]
    Duplicate(String),
    #[error("invalid JSON schema: {0}")]
    InvalidSchema(String),
}

/// A compiled JSON schema used to validate JSON parameters.
#[derive(Clone)]
pub struct JsonSchema {
    schema: Arc<Value>,
    validator: Arc<jsonschema::Validator>,
}

impl JsonSchema {
    /// Compile `schema`, checking it against its meta-schema first.
    ///
    /// # Errors
    ///
    /// Returns [`ParamSpecError::InvalidSchema`] if the schema is malformed.
    pub fn compile(schema: Value) -> Result<Self, ParamSpecError> {
        let validator = jsonschema::validator_for(&schema)
            .map_err(|e| ParamSpecError::InvalidSchema(e.to_string()))?;
        Ok(Self {
            schema: Arc::new(schema),
            validator: Arc::new(validator),
        })
    }

    #[must_use]
    pub fn schema(&self) -> &Value {
        &self.schema
    }

    /// Validate `instance`, returning the first violation as text.
    pub(crate) fn check(&self, instance: &Value) -> Result<(), String> {
        self.validator.validate(instance).map_err(|e| e.to_string())
    }
}

impl fmt::Debug for JsonSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("JsonSchema").field(&self.schema).finish()
    }
}

/// Build the schema of a JSON array parameter.
///
/// ```rust
/// use jsonroute::params::{json_array, ParamSpec, NUMBER_TYPE};
///
/// let schema = json_array(Some(NUMBER_TYPE.clone()), None, Some(10));
/// assert_eq!(schema["maxItems"], 10);
/// let spec = ParamSpec::json_with_schema(schema).unwrap();
/// ```
#[must_use]
pub fn json_array(items: Option<Value>, min_items: Option<u64>, max_items: Option<u64>) -> Value {
    let mut schema = serde_json::Map::new();
    schema.insert("type".to_string(), json!("array"));
    if let Some(items) = items {
        schema.insert("items".to_string(), items);
    }
    if let Some(min) = min_items {
        schema.insert("minItems".to_string(), json!(min));
    }
    if let Some(max) = max_items {
        schema.insert("maxItems".to_string(), json!(max));
    }
    Value::Object(schema)
}

/// How a raw parameter value is coerced.
#[derive(Debug, Clone)]
pub enum ParamKind {
    /// Passed through unchanged.
    String,
    /// `"true"` or `"false"`.
    Bool,
    /// Signed 64-bit integer with optional inclusive bounds.
    Int { min: Option<i64>, max: Option<i64> },
    /// One of a fixed set of strings.
    Enum(BTreeSet<String>),
    /// Language tag from the parameter, else from `Accept-Language`.
    Lang,
    /// Dot-separated version such as `5.10`, compared component-wise.
    Version,
    /// JSON text, optionally validated against a schema.
    Json(Option<JsonSchema>),
    /// RFC 4122 UUID.
    Uuid,
}

/// Declaration of one request parameter.
#[derive(Debug, Clone)]
pub struct ParamSpec {
    pub kind: ParamKind,
    pub required: bool,
    pub default: Option<ArgValue>,
    /// Lookup key in the request, when it differs from the parameter name.
    pub key: Option<String>,
}

impl ParamSpec {
    #[must_use]
    pub fn new(kind: ParamKind) -> Self {
        Self {
            kind,
            required: false,
            default: None,
            key: None,
        }
    }

    #[must_use]
    pub fn string() -> Self {
        Self::new(ParamKind::String)
    }

    #[must_use]
    pub fn bool() -> Self {
        Self::new(ParamKind::Bool)
    }

    #[must_use]
    pub fn int() -> Self {
        Self::new(ParamKind::Int {
            min: None,
            max: None,
        })
    }

    #[must_use]
    pub fn bounded_int(min: Option<i64>, max: Option<i64>) -> Self {
        Self::new(ParamKind::Int { min, max })
    }

    #[must_use]
    pub fn enumeration<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(ParamKind::Enum(values.into_iter().map(Into::into).collect()))
    }

    #[must_use]
    pub fn lang() -> Self {
        Self::new(ParamKind::Lang)
    }

    #[must_use]
    pub fn version() -> Self {
        Self::new(ParamKind::Version)
    }

    /// JSON parameter without schema validation.
    #[must_use]
    pub fn json() -> Self {
        Self::new(ParamKind::Json(None))
    }

    /// JSON parameter validated against `schema`.
    ///
    /// # Errors
    ///
    /// Returns [`ParamSpecError::InvalidSchema`] if `schema` is not a valid
    /// JSON schema.
    pub fn json_with_schema(schema: Value) -> Result<Self, ParamSpecError> {
        Ok(Self::new(ParamKind::Json(Some(JsonSchema::compile(schema)?))))
    }

    #[must_use]
    pub fn uuid() -> Self {
        Self::new(ParamKind::Uuid)
    }

    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    #[must_use]
    pub fn default(mut self, value: impl Into<ArgValue>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Look the value up under `key` instead of the parameter name, e.g. when
    /// the query key is awkward as an identifier (`class`, `type`).
    #[must_use]
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    fn validate(&self, name: &str) -> Result<(), ParamSpecError> {
        if self.required && self.default.is_some() {
            return Err(ParamSpecError::RequiredWithDefault(name.to_string()));
        }
        match &self.kind {
            ParamKind::Enum(values) if values.is_empty() => {
                Err(ParamSpecError::EmptyEnum(name.to_string()))
            }
            ParamKind::Int {
                min: Some(min),
                max: Some(max),
            } if min > max => Err(ParamSpecError::InvalidBounds {
                name: name.to_string(),
                min: *min,
                max: *max,
            }),
            _ => Ok(()),
        }
    }
}

/// Ordered set of parameter declarations for one endpoint.
#[derive(Debug, Clone, Default)]
pub struct ParamSet {
    specs: Vec<(String, ParamSpec)>,
}

impl ParamSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a parameter.
    ///
    /// # Errors
    ///
    /// Returns a [`ParamSpecError`] if the declaration is inconsistent or the
    /// name is already taken.
    pub fn insert(&mut self, name: &str, spec: ParamSpec) -> Result<(), ParamSpecError> {
        spec.validate(name)?;
        if self.specs.iter().any(|(n, _)| n == name) {
            return Err(ParamSpecError::Duplicate(name.to_string()));
        }
        self.specs.push((name.to_string(), spec));
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamSpec)> {
        self.specs.iter().map(|(n, s)| (n.as_str(), s))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.specs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}
