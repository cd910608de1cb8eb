//! Message attributes attached to topic messages.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::domain::Feature;

/// Provider hard limit on attributes per message.
pub const MAX_MESSAGE_ATTRIBUTES: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MessageAttribute {
    pub data_type: String,
    pub string_value: String,
}

impl MessageAttribute {
    pub fn string(value: impl Into<String>) -> Self {
        Self {
            data_type: "String".into(),
            string_value: value.into(),
        }
    }

    pub fn number(value: &serde_json::Number) -> Self {
        Self {
            data_type: "Number".into(),
            string_value: value.to_string(),
        }
    }
}

pub type MessageAttributes = BTreeMap<String, MessageAttribute>;

const STRING_PROPERTIES: [&str; 5] = [
    "datetime",
    "start_datetime",
    "end_datetime",
    "platform",
    "constellation",
];

const NUMBER_PROPERTIES: [&str; 1] = ["eo:cloud_cover"];

/// Filterable attributes for one feature: its collection plus a fixed set
/// of properties, each only when present with the expected JSON type.
pub fn feature_attributes(feature: &Feature) -> MessageAttributes {
    let mut attrs = MessageAttributes::new();
    if let Some(collection) = &feature.collection {
        attrs.insert("collection".into(), MessageAttribute::string(collection));
    }
    for key in STRING_PROPERTIES {
        if let Some(Value::String(s)) = feature.property(key) {
            attrs.insert(key.into(), MessageAttribute::string(s));
        }
    }
    for key in NUMBER_PROPERTIES {
        if let Some(Value::Number(n)) = feature.property(key) {
            attrs.insert(key.into(), MessageAttribute::number(n));
        }
    }
    attrs
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn projects_known_properties() {
        let feature = Feature::new("a")
            .with_collection("sentinel-2-l2a")
            .with_property("datetime", json!("2024-01-01T00:00:00Z"))
            .with_property("eo:cloud_cover", json!(12.5))
            .with_property("platform", json!(7))
            .with_property("unrelated", json!("x"));

        let attrs = feature_attributes(&feature);
        assert_eq!(attrs.len(), 3);
        assert_eq!(attrs["collection"], MessageAttribute::string("sentinel-2-l2a"));
        assert_eq!(attrs["eo:cloud_cover"].data_type, "Number");
        assert_eq!(attrs["eo:cloud_cover"].string_value, "12.5");
        assert!(!attrs.contains_key("platform"));
        assert!(attrs.len() <= MAX_MESSAGE_ATTRIBUTES);
    }

    #[test]
    fn serializes_in_provider_shape() {
        let value = serde_json::to_value(MessageAttribute::string("succeeded")).unwrap();
        assert_eq!(value, json!({"DataType": "String", "StringValue": "succeeded"}));
    }
}
