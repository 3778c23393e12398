//! Event payloads
//!
//! A payload is an immutable mapping from string keys to loosely typed
//! values, built incrementally and frozen before publication.

use serde_json::{Map, Value};

/// Immutable key/value data attached to one event occurrence
#[derive(Debug, Clone, Default)]
pub struct EventPayload {
    data: Map<String, Value>,
}

impl EventPayload {
    /// Empty payload, for events that carry no data
    pub fn empty() -> Self {
        Self::default()
    }

    /// Start building a payload
    pub fn builder() -> PayloadBuilder {
        PayloadBuilder::new()
    }

    /// Raw value for a key
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Value for a key as u64, if present and numeric
    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.data.get(key).and_then(Value::as_u64)
    }

    /// Value for a key as i64, if present and numeric
    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.data.get(key).and_then(Value::as_i64)
    }

    /// Value for a key as a string slice, if present and textual
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(Value::as_str)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Iterate over all key/value pairs
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.data.iter()
    }
}

impl std::fmt::Display for EventPayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", Value::Object(self.data.clone()))
    }
}

/// Fluent accumulator for [`EventPayload`]
#[derive(Debug, Default)]
pub struct PayloadBuilder {
    data: Map<String, Value>,
}

impl PayloadBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a key/value pair, returning self for chaining
    pub fn set(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    /// Finalize into an immutable payload
    pub fn build(self) -> EventPayload {
        EventPayload { data: self.data }
    }
}
