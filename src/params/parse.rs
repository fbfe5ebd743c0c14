use super::args::{RawArg, RequestArgs};
use super::lang::infer_language;
use super::spec::{ParamKind, ParamSet, ParamSpec};
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use tracing::debug;
use uuid::Uuid;

/// A coerced parameter value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ArgValue {
    /// Optional parameter that was absent and has no default.
    Null,
    Bool(bool),
    Int(i64),
    Str(String),
    /// Version components, e.g. `[5, 10]` for `5.10`.
    Version(Vec<u64>),
    Uuid(Uuid),
    Json(Value),
}

impl ArgValue {
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, ArgValue::Null)
    }
}

impl From<&str> for ArgValue {
    fn from(v: &str) -> Self {
        ArgValue::Str(v.to_string())
    }
}

impl From<String> for ArgValue {
    fn from(v: String) -> Self {
        ArgValue::Str(v)
    }
}

impl From<bool> for ArgValue {
    fn from(v: bool) -> Self {
        ArgValue::Bool(v)
    }
}

impl From<i32> for ArgValue {
    fn from(v: i32) -> Self {
        ArgValue::Int(i64::from(v))
    }
}

impl From<i64> for ArgValue {
    fn from(v: i64) -> Self {
        ArgValue::Int(v)
    }
}

impl From<Uuid> for ArgValue {
    fn from(v: Uuid) -> Self {
        ArgValue::Uuid(v)
    }
}

impl From<Value> for ArgValue {
    fn from(v: Value) -> Self {
        ArgValue::Json(v)
    }
}

/// Parameter name to coerced value, for one request.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ParsedArgs {
    values: BTreeMap<String, ArgValue>,
}

impl ParsedArgs {
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ArgValue> {
        self.values.get(name)
    }

    #[must_use]
    pub fn get_str(&self, name: &str) -> Option<&str> {
        match self.values.get(name) {
            Some(ArgValue::Str(s)) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn get_bool(&self, name: &str) -> Option<bool> {
        match self.values.get(name) {
            Some(ArgValue::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    #[must_use]
    pub fn get_int(&self, name: &str) -> Option<i64> {
        match self.values.get(name) {
            Some(ArgValue::Int(i)) => Some(*i),
            _ => None,
        }
    }

    #[must_use]
    pub fn get_version(&self, name: &str) -> Option<&[u64]> {
        match self.values.get(name) {
            Some(ArgValue::Version(v)) => Some(v),
            _ => None,
        }
    }

    #[must_use]
    pub fn get_uuid(&self, name: &str) -> Option<Uuid> {
        match self.values.get(name) {
            Some(ArgValue::Uuid(u)) => Some(*u),
            _ => None,
        }
    }

    #[must_use]
    pub fn get_json(&self, name: &str) -> Option<&Value> {
        match self.values.get(name) {
            Some(ArgValue::Json(v)) => Some(v),
            _ => None,
        }
    }

    pub fn insert(&mut self, name: impl Into<String>, value: ArgValue) {
        self.values.insert(name.into(), value);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ArgValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Why a single parameter was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParamErrorKind {
    #[error("Required")]
    Required,
    #[error("Pass exactly one argument")]
    NotExactlyOne,
    #[error("Boolean parameter must be 'true' or 'false'")]
    InvalidBool,
    #[error("Invalid integer: {0}")]
    InvalidInt(String),
    #[error("Minimum value {0}")]
    BelowMinimum(i64),
    #[error("Maximum value {0}")]
    AboveMaximum(i64),
    #[error("Parameter must be one of {}", format_choices(.0))]
    NotInEnum(Vec<String>),
    #[error("Invalid version literal")]
    InvalidVersion,
    #[error("Invalid JSON: {0}")]
    InvalidJson(String),
    #[error("JSON schema error: {0}")]
    SchemaViolation(String),
    #[error("Malformed UUID")]
    MalformedUuid,
}

fn format_choices(choices: &[String]) -> String {
    let quoted: Vec<String> = choices.iter().map(|c| format!("'{c}'")).collect();
    format!("[{}]", quoted.join(", "))
}

/// A rejected parameter.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{name}: {kind}")]
pub struct ParamError {
    pub name: String,
    pub kind: ParamErrorKind,
}

/// Every parameter rejected for one request.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParamErrors(pub Vec<ParamError>);

impl ParamErrors {
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The error for `name`, if that parameter was rejected.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ParamErrorKind> {
        self.0.iter().find(|e| e.name == name).map(|e| &e.kind)
    }
}

impl fmt::Display for ParamErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, err) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{err}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ParamErrors {}

/// Apply `params` to a request.
///
/// Every declared parameter is evaluated; failures are collected rather than
/// stopping at the first one.
///
/// # Arguments
///
/// * `params` - Declared parameters of the endpoint
/// * `args` - Raw values gathered from query, form and JSON body
/// * `headers` - Request headers with lowercase names
///
/// # Errors
///
/// Returns [`ParamErrors`] listing each parameter that was missing or could
/// not be coerced.
pub fn parse_args(
    params: &ParamSet,
    args: &RequestArgs,
    headers: &HashMap<String, String>,
) -> Result<ParsedArgs, ParamErrors> {
    let mut parsed = ParsedArgs::default();
    let mut errors = Vec::new();

    for (name, spec) in params.iter() {
        match parse_one(name, spec, args, headers) {
            Ok(value) => parsed.insert(name, value),
            Err(kind) => errors.push(ParamError {
                name: name.to_string(),
                kind,
            }),
        }
    }

    if errors.is_empty() {
        Ok(parsed)
    } else {
        debug!(
            failed = errors.len(),
            declared = params.len(),
            "Parameter parsing failed"
        );
        Err(ParamErrors(errors))
    }
}

fn parse_one(
    name: &str,
    spec: &ParamSpec,
    args: &RequestArgs,
    headers: &HashMap<String, String>,
) -> Result<ArgValue, ParamErrorKind> {
    let key = spec.key.as_deref().unwrap_or(name);

    let Some(values) = args.get_all(key) else {
        if matches!(spec.kind, ParamKind::Lang) {
            if let Some(lang) = infer_language(headers.get("accept-language").map(String::as_str))
            {
                return Ok(ArgValue::Str(lang));
            }
        }
        return match (&spec.default, spec.required) {
            (Some(default), _) => Ok(default.clone()),
            (None, true) => Err(ParamErrorKind::Required),
            (None, false) => Ok(ArgValue::Null),
        };
    };

    match values {
        [raw] => coerce(&spec.kind, raw),
        _ => Err(ParamErrorKind::NotExactlyOne),
    }
}

fn coerce(kind: &ParamKind, arg: &RawArg) -> Result<ArgValue, ParamErrorKind> {
    let raw = arg.text.as_str();
    match kind {
        ParamKind::String | ParamKind::Lang => Ok(ArgValue::Str(raw.to_string())),
        ParamKind::Bool => match raw {
            "true" => Ok(ArgValue::Bool(true)),
            "false" => Ok(ArgValue::Bool(false)),
            _ => Err(ParamErrorKind::InvalidBool),
        },
        ParamKind::Int { min, max } => {
            let value: i64 = raw
                .trim()
                .parse()
                .map_err(|_| ParamErrorKind::InvalidInt(raw.to_string()))?;
            if let Some(min) = min.filter(|min| value < *min) {
                return Err(ParamErrorKind::BelowMinimum(min));
            }
            if let Some(max) = max.filter(|max| value > *max) {
                return Err(ParamErrorKind::AboveMaximum(max));
            }
            Ok(ArgValue::Int(value))
        }
        ParamKind::Enum(allowed) => {
            if allowed.contains(raw) {
                Ok(ArgValue::Str(raw.to_string()))
            } else {
                Err(ParamErrorKind::NotInEnum(allowed.iter().cloned().collect()))
            }
        }
        ParamKind::Version => raw
            .split('.')
            .map(|part| part.trim().parse::<u64>())
            .collect::<Result<Vec<_>, _>>()
            .map(ArgValue::Version)
            .map_err(|_| ParamErrorKind::InvalidVersion),
        ParamKind::Json(schema) => {
            let data: Value = match &arg.json {
                Some(value) => value.clone(),
                None => serde_json::from_str(raw)
                    .map_err(|e| ParamErrorKind::InvalidJson(e.to_string()))?,
            };
            if let Some(schema) = schema {
                schema.check(&data).map_err(ParamErrorKind::SchemaViolation)?;
            }
            Ok(ArgValue::Json(data))
        }
        ParamKind::Uuid => Uuid::parse_str(raw)
            .map(ArgValue::Uuid)
            .map_err(|_| ParamErrorKind::MalformedUuid),
    }
}
