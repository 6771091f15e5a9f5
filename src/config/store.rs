//! Key/value configuration store.

use std::collections::BTreeMap;

use serde_json::Value;

/// Application configuration: string keys mapped to JSON values.
///
/// Keys are conventionally upper-case and namespaced by prefix
/// (`APP_`, `RATELIMIT_`). Values keep whatever shape the config file gave
/// them, so an explicitly empty object or list stays distinguishable from an
/// absent key.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    values: BTreeMap<String, Value>,
}

impl Config {
    /// A store seeded with the base keys every application carries.
    pub fn new() -> Self {
        let mut config = Self::empty();
        config.insert("DEBUG", false);
        config.insert("TESTING", false);
        config
    }

    /// A store with no keys at all.
    pub fn empty() -> Self {
        Self {
            values: BTreeMap::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.values.get_mut(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Insert a value, returning the previous one.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.values.insert(key.into(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.values.remove(key)
    }

    /// Insert `value` only if `key` is absent, then return the stored value.
    pub fn set_default(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Value {
        self.values.entry(key.into()).or_insert_with(|| value.into())
    }

    /// Truthiness of a key; absent keys are false.
    pub fn get_bool(&self, key: &str) -> bool {
        self.get(key).is_some_and(truthy)
    }

    /// String value of a key, if it holds a string.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    /// Whether the application runs in debug mode.
    pub fn debug(&self) -> bool {
        self.get_bool("DEBUG")
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Into<String>, V: Into<Value>> Extend<(K, V)> for Config {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.insert(key, value);
        }
    }
}

/// Loose truthiness: null, false, zero and empty containers are false.
fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}
