use serde::{Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeMap;

/// One raw value of a request argument.
///
/// `text` is what string-typed parameters see. Values taken from a JSON body
/// also keep their parsed form in `json`, so JSON parameters validate the
/// body value itself instead of re-parsing its text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawArg {
    pub text: String,
    pub json: Option<Value>,
}

impl RawArg {
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            json: None,
        }
    }

    /// A JSON body member. Strings keep their content as text, other values
    /// their JSON encoding.
    #[must_use]
    pub fn json(value: Value) -> Self {
        let text = match &value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        Self {
            text,
            json: Some(value),
        }
    }
}

impl Serialize for RawArg {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match &self.json {
            Some(value) => value.serialize(serializer),
            None => serializer.serialize_str(&self.text),
        }
    }
}

/// Raw request arguments: every key seen in the request with all of its
/// values, in arrival order.
///
/// A key given with a blank value (`?parent_id=` or `{"parent_id": ""}`) is
/// recorded with no values, so it counts as present but is rejected by the
/// parser as "Pass exactly one argument".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RequestArgs {
    values: BTreeMap<String, Vec<RawArg>>,
}

impl RequestArgs {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a URL query string (without the leading `?`).
    #[must_use]
    pub fn from_query(query: &str) -> Self {
        let mut args = Self::new();
        args.extend_urlencoded(query.as_bytes());
        args
    }

    /// Merge `application/x-www-form-urlencoded` pairs.
    pub fn extend_urlencoded(&mut self, input: &[u8]) {
        for (k, v) in url::form_urlencoded::parse(input) {
            let entry = self.values.entry(k.into_owned()).or_default();
            if !v.is_empty() {
                entry.push(RawArg::text(v.into_owned()));
            }
        }
    }

    /// Merge the top-level members of a JSON object body.
    ///
    /// `null` members are skipped and empty strings count as blank values.
    /// Non-object bodies contribute nothing.
    pub fn extend_json(&mut self, body: &Value) {
        let Some(object) = body.as_object() else {
            return;
        };
        for (k, v) in object {
            if v.is_null() {
                continue;
            }
            let entry = self.values.entry(k.clone()).or_default();
            if v.as_str() != Some("") {
                entry.push(RawArg::json(v.clone()));
            }
        }
    }

    /// Append one value for `key`.
    pub fn add(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values
            .entry(key.into())
            .or_default()
            .push(RawArg::text(value));
    }

    /// Remove `key` and all of its values.
    pub fn remove(&mut self, key: &str) -> Option<Vec<RawArg>> {
        self.values.remove(key)
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// All values recorded for `key`; `None` if the key never appeared.
    #[must_use]
    pub fn get_all(&self, key: &str) -> Option<&[RawArg]> {
        self.values.get(key).map(Vec::as_slice)
    }

    /// The text of `key` if it was given exactly once.
    #[must_use]
    pub fn get_one(&self, key: &str) -> Option<&str> {
        match self.values.get(key).map(Vec::as_slice) {
            Some([value]) => Some(value.text.as_str()),
            _ => None,
        }
    }

    /// Number of distinct keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
