//! Domain identifiers.
//!
//! A payload id has the shape `{collections}/workflow-{workflow}/{items}`.
//! Both `collections` and `items` may themselves contain `/`, so the
//! `workflow-` segment is the only reliable anchor.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::errors::ValidationError;

/// Marker every payload id must carry.
pub const WORKFLOW_MARKER: &str = "workflow-";

/// Identity of one workflow invocation.
///
/// Immutable once assigned; equality is plain string equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PayloadId(String);

impl PayloadId {
    /// Validate and wrap an id string.
    pub fn parse(s: impl Into<String>) -> Result<Self, ValidationError> {
        let s = s.into();
        if !s.contains(WORKFLOW_MARKER) {
            return Err(ValidationError::InvalidId(s));
        }
        Ok(Self(s))
    }

    /// Build an id from its three components.
    pub fn from_parts(collections: &str, workflow: &str, items: &str) -> Self {
        Self(format!("{collections}/{WORKFLOW_MARKER}{workflow}/{items}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Location of the authoritative execution input for this payload.
    pub fn payload_url(&self, bucket: &str) -> String {
        format!("s3://{bucket}/{}/input.json", self.0)
    }
}

impl TryFrom<String> for PayloadId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<PayloadId> for String {
    fn from(id: PayloadId) -> Self {
        id.0
    }
}

impl fmt::Display for PayloadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_requires_workflow_marker() {
        assert!(PayloadId::parse("sentinel-2/workflow-cog/S2A_1").is_ok());
        assert_eq!(
            PayloadId::parse("sentinel-2/cog/S2A_1"),
            Err(ValidationError::InvalidId("sentinel-2/cog/S2A_1".into()))
        );
    }

    #[test]
    fn from_parts_keeps_slashes_in_collections_and_items() {
        let id = PayloadId::from_parts("a/b", "mirror", "x/y");
        assert_eq!(id.as_str(), "a/b/workflow-mirror/x/y");
    }

    #[test]
    fn payload_url_is_keyed_by_id() {
        let id = PayloadId::parse("c/workflow-w/i").unwrap();
        assert_eq!(id.payload_url("payloads"), "s3://payloads/c/workflow-w/i/input.json");
    }

    #[test]
    fn deserialization_validates() {
        let ok: PayloadId = serde_json::from_str("\"c/workflow-w/i\"").unwrap();
        assert_eq!(ok.as_str(), "c/workflow-w/i");
        assert!(serde_json::from_str::<PayloadId>("\"nope\"").is_err());
    }
}
