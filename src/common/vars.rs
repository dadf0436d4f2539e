//! JSON-backed variable map used for node configs and outputs.

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};

/// An ordered map of named JSON values.
///
/// `Vars` is the loosely-typed payload flowing through the engine: function
/// node configs, workflow env, and record-store documents all use it. Typed
/// access goes through [`Vars::get`], which deserializes on the way out.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct Vars {
    inner: Map<String, Value>,
}

#[allow(unused)]
impl Vars {
    /// create an empty variable map
    pub fn new() -> Self {
        Self::default()
    }

    /// get a value through `key`, deserialized into `T`
    pub fn get<T: DeserializeOwned>(
        &self,
        key: &str,
    ) -> Option<T> {
        self.inner.get(key).and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// get a string value through `key`, stringifying non-string scalars
    pub fn get_str(
        &self,
        key: &str,
    ) -> Option<String> {
        match self.inner.get(key) {
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Null) | None => None,
            Some(v) => Some(v.to_string()),
        }
    }

    /// set a value through `key`
    pub fn set<T: Serialize>(
        &mut self,
        key: &str,
        value: T,
    ) {
        if let Ok(v) = serde_json::to_value(value) {
            self.inner.insert(key.to_string(), v);
        }
    }

    /// builder-style `set`
    pub fn with<T: Serialize>(
        mut self,
        key: &str,
        value: T,
    ) -> Self {
        self.set(key, value);
        self
    }

    /// insert a raw JSON value
    pub fn insert(
        &mut self,
        key: String,
        value: Value,
    ) {
        self.inner.insert(key, value);
    }

    /// true when the map holds no entries
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// iterate over entries
    pub fn iter(&self) -> serde_json::map::Iter<'_> {
        self.inner.iter()
    }
}

impl From<Value> for Vars {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(map) => Self {
                inner: map,
            },
            _ => Self::default(),
        }
    }
}

impl From<Vars> for Value {
    fn from(vars: Vars) -> Self {
        Value::Object(vars.inner)
    }
}
