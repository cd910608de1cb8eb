//! Feature record carried in a payload's `features` array.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One geospatial feature.
///
/// Only `id`, `collection` and `links` are interpreted here; every other key
/// round-trips untouched through `extra`. `id` is kept as raw JSON: it is only
/// required to be a string when a payload id is derived from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub id: Value,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection: Option<String>,

    /// Always present after deserialization (defaults to empty).
    #[serde(default)]
    pub links: Vec<Value>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Feature {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: Value::String(id.into()),
            collection: None,
            links: Vec::new(),
            extra: Map::new(),
        }
    }

    /// The id, when it is a string.
    pub fn id(&self) -> Option<&str> {
        self.id.as_str()
    }

    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = Some(collection.into());
        self
    }

    pub fn with_property(mut self, key: &str, value: Value) -> Self {
        let properties = self
            .extra
            .entry("properties")
            .or_insert_with(|| Value::Object(Map::new()));
        if let Value::Object(props) = properties {
            props.insert(key.to_string(), value);
        }
        self
    }

    /// Look up `properties.{key}`.
    pub fn property(&self, key: &str) -> Option<&Value> {
        self.extra.get("properties")?.get(key)
    }

    /// JSON view used by chain filters and message bodies.
    pub fn to_value(&self) -> Value {
        let mut map = self.extra.clone();
        if !self.id.is_null() {
            map.insert("id".into(), self.id.clone());
        }
        if let Some(collection) = &self.collection {
            map.insert("collection".into(), Value::String(collection.clone()));
        }
        map.insert("links".into(), Value::Array(self.links.clone()));
        Value::Object(map)
    }
}
