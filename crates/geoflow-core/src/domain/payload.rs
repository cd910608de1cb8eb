//! ProcessPayload - one workflow invocation envelope.
//!
//! Design:
//! - Required fields are typed (`process[0]`, `features`, `id`).
//! - Everything else round-trips through `extra` untouched.
//! - Steps after the active one stay raw JSON until they are promoted;
//!   they are validated when `next_payloads` builds a successor.

use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::BTreeSet;

use super::errors::{ConfigurationError, ValidationError};
use super::event::extract_event_records;
use super::feature::Feature;
use super::ids::PayloadId;
use super::step::ProcessStep;
use crate::ports::{BlobError, BlobStore, IdGenerator};
use crate::publish::{MessageAttributes, feature_attributes};

/// Default inline size limit for an execution input.
pub const MAX_PAYLOAD_LENGTH: usize = 250_000;

/// Failures of payload operations that touch external storage.
#[derive(Debug, thiserror::Error)]
pub enum PayloadError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Blob(#[from] BlobError),
}

/// What actually travels to the execution engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TransportPayload {
    /// Stand-in for an envelope spilled to blob storage.
    Pointer { url: String },
    Inline(Value),
}

impl TransportPayload {
    pub fn to_bytes(&self) -> Vec<u8> {
        // A string or an in-memory JSON value always serializes.
        serde_json::to_vec(self).unwrap_or_default()
    }

    pub fn url(&self) -> Option<&str> {
        match self {
            TransportPayload::Pointer { url } => Some(url),
            TransportPayload::Inline(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProcessPayload {
    pub(crate) id: Option<PayloadId>,
    pub(crate) step: ProcessStep,
    /// `process[1..]`, unvalidated.
    pub(crate) pending: Vec<Value>,
    pub(crate) features: Vec<Feature>,
    pub(crate) extra: Map<String, Value>,
}

impl ProcessPayload {
    /// Validate a raw envelope.
    ///
    /// With `assign_id_if_missing` unset, an envelope without `id` is
    /// rejected; with it set, the id is derived from the features.
    pub fn new(raw: Value, assign_id_if_missing: bool) -> Result<Self, ValidationError> {
        let Value::Object(mut obj) = raw else {
            return Err(ValidationError::NotAnObject);
        };

        let process = match obj.remove("process") {
            None => return Err(ValidationError::MissingProcess),
            Some(Value::Array(steps)) if !steps.is_empty() => steps,
            Some(_) => return Err(ValidationError::EmptyProcess),
        };
        let mut process = process.into_iter();
        let step = match process.next() {
            Some(first) => ProcessStep::from_value(&first)?,
            None => return Err(ValidationError::EmptyProcess),
        };
        let pending: Vec<Value> = process.collect();

        let features = match obj.remove("features") {
            None | Some(Value::Null) => Vec::new(),
            Some(value) => serde_json::from_value::<Vec<Feature>>(value)
                .map_err(|e| ValidationError::InvalidFeatures(e.to_string()))?,
        };

        let id = match obj.remove("id") {
            Some(Value::String(s)) => Some(PayloadId::parse(s)?),
            Some(other) => return Err(ValidationError::InvalidId(other.to_string())),
            None => None,
        };

        let mut payload = Self {
            id,
            step,
            pending,
            features,
            extra: obj,
        };
        if payload.id.is_none() {
            if !assign_id_if_missing {
                return Err(ValidationError::MissingId);
            }
            payload.derive_id()?;
        }
        Ok(payload)
    }

    /// Parse an inbound event holding exactly one envelope (or a `{url}`
    /// pointer to one).
    pub async fn from_event(
        event: &Value,
        blob_store: &dyn BlobStore,
        assign_id_if_missing: bool,
    ) -> Result<Self, PayloadError> {
        let mut records = extract_event_records(event)?;
        let record = match records.len() {
            0 => return Err(ValidationError::NoRecords(event.to_string()).into()),
            1 => records.remove(0),
            n => return Err(ValidationError::MultipleRecords(n).into()),
        };

        let record = match record.get("url").and_then(Value::as_str) {
            Some(url) => blob_store.get_json(url).await?,
            None => record,
        };

        Ok(Self::new(record, assign_id_if_missing)?)
    }

    /// Derive `{collections}/workflow-{workflow}/{items}` from the features.
    ///
    /// No-op when an id is already present.
    pub fn derive_id(&mut self) -> Result<&PayloadId, ValidationError> {
        if self.id.is_none() {
            self.id = Some(self.compute_id()?);
        }
        self.require_id()
    }

    fn compute_id(&self) -> Result<PayloadId, ValidationError> {
        if self.features.is_empty() {
            return Err(ValidationError::NoFeatures);
        }

        let collections = match &self.step.collections {
            Some(over) => over.clone(),
            None => {
                let cols: BTreeSet<&str> = self
                    .features
                    .iter()
                    .filter_map(|f| f.collection.as_deref())
                    .collect();
                if cols.is_empty() {
                    "none".to_string()
                } else {
                    cols.into_iter().collect::<Vec<_>>().join("/")
                }
            }
        };

        let mut items = self
            .features
            .iter()
            .map(|f| {
                f.id()
                    .ok_or_else(|| ValidationError::FeatureWithoutId(f.to_value().to_string()))
            })
            .collect::<Result<Vec<&str>, _>>()?;
        items.sort_unstable();

        Ok(PayloadId::from_parts(
            &collections,
            &self.step.workflow,
            &items.join("/"),
        ))
    }

    pub fn id(&self) -> Option<&PayloadId> {
        self.id.as_ref()
    }

    pub fn require_id(&self) -> Result<&PayloadId, ValidationError> {
        self.id.as_ref().ok_or(ValidationError::MissingId)
    }

    /// The active step.
    pub fn process(&self) -> &ProcessStep {
        &self.step
    }

    pub fn tasks(&self) -> &Value {
        &self.step.tasks
    }

    pub fn workflow(&self) -> &str {
        &self.step.workflow
    }

    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    pub fn extra(&self) -> &Map<String, Value> {
        &self.extra
    }

    /// Number of entries in `process`, including the active one.
    pub fn process_len(&self) -> usize {
        1 + self.pending.len()
    }

    pub fn to_value(&self) -> Value {
        let mut obj = self.extra.clone();
        if let Some(id) = &self.id {
            obj.insert("id".into(), Value::String(id.to_string()));
        }
        let mut process = Vec::with_capacity(self.process_len());
        process.push(self.step.to_value());
        process.extend(self.pending.iter().cloned());
        obj.insert("process".into(), Value::Array(process));
        obj.insert(
            "features".into(),
            Value::Array(self.features.iter().map(Feature::to_value).collect()),
        );
        Value::Object(obj)
    }

    /// Inline encoding when it fits `max_length`, otherwise spill to
    /// `bucket` and hand back a `{url}` pointer.
    pub async fn transport_payload(
        &self,
        max_length: usize,
        bucket: Option<&str>,
        blob_store: &dyn BlobStore,
        ids: &dyn IdGenerator,
    ) -> Result<TransportPayload, PayloadError> {
        let value = self.to_value();
        let length = serde_json::to_vec(&value).map(|b| b.len()).unwrap_or(usize::MAX);
        if length <= max_length {
            return Ok(TransportPayload::Inline(value));
        }

        let Some(bucket) = bucket else {
            return Err(ConfigurationError::PayloadTooLarge {
                actual: length,
                max: max_length,
            }
            .into());
        };

        let url = upload_payload(&value, bucket, blob_store, ids).await?;
        tracing::debug!(payload_id = ?self.id, length, %url, "payload spilled to blob storage");
        Ok(TransportPayload::Pointer { url })
    }

    /// One `(body, attributes)` message per feature.
    pub fn feature_messages(&self) -> Vec<(String, MessageAttributes)> {
        self.features
            .iter()
            .map(|f| (f.to_value().to_string(), feature_attributes(f)))
            .collect()
    }
}

impl TryFrom<Value> for ProcessPayload {
    type Error = ValidationError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::new(value, false)
    }
}

impl Serialize for ProcessPayload {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

/// Upload a JSON document under `s3://{bucket}/payloads/`.
///
/// A document that already carries a `url` was uploaded before and is not
/// uploaded again.
pub async fn upload_payload(
    payload: &Value,
    bucket: &str,
    blob_store: &dyn BlobStore,
    ids: &dyn IdGenerator,
) -> Result<String, BlobError> {
    if let Some(url) = payload.get("url").and_then(Value::as_str) {
        return Ok(url.to_string());
    }
    let url = format!("s3://{bucket}/payloads/{}.json", ids.generate_object_key());
    blob_store.put_json(payload, &url).await?;
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impls::InMemoryBlobStore;
    use crate::ports::{SystemClock, UlidGenerator};
    use rstest::rstest;
    use serde_json::json;

    fn raw(features: Value) -> Value {
        json!({
            "type": "FeatureCollection",
            "features": features,
            "process": [{
                "upload_options": {"bucket": "out"},
                "workflow": "cog",
                "tasks": {"copy-assets": {}},
            }],
        })
    }

    #[test]
    fn construct_assigns_id_and_links() {
        let payload = ProcessPayload::new(
            raw(json!([
                {"id": "b", "collection": "landsat"},
                {"id": "a", "collection": "sentinel"},
                {"id": "c", "collection": "landsat"},
            ])),
            true,
        )
        .unwrap();

        assert_eq!(
            payload.id().unwrap().as_str(),
            "landsat/sentinel/workflow-cog/a/b/c"
        );
        assert!(payload.features().iter().all(|f| f.links.is_empty()));
        assert_eq!(payload.to_value()["features"][0]["links"], json!([]));
        assert_eq!(payload.workflow(), "cog");
        assert_eq!(payload.tasks(), &json!({"copy-assets": {}}));
        assert_eq!(payload.extra()["type"], json!("FeatureCollection"));
    }

    #[test]
    fn collections_default_to_none_and_override_wins() {
        let payload = ProcessPayload::new(raw(json!([{"id": "x"}])), true).unwrap();
        assert_eq!(payload.id().unwrap().as_str(), "none/workflow-cog/x");

        let mut value = raw(json!([{"id": "x", "collection": "c"}]));
        value["process"][0]["collections"] = json!("override");
        let payload = ProcessPayload::new(value, true).unwrap();
        assert_eq!(payload.id().unwrap().as_str(), "override/workflow-cog/x");
    }

    #[test]
    fn derived_id_ignores_feature_order() {
        let a = ProcessPayload::new(raw(json!([{"id": "1"}, {"id": "2"}])), true).unwrap();
        let b = ProcessPayload::new(raw(json!([{"id": "2"}, {"id": "1"}])), true).unwrap();
        assert_eq!(a.id(), b.id());
    }

    #[test]
    fn derive_id_is_idempotent() {
        let mut payload = ProcessPayload::new(raw(json!([{"id": "1"}])), true).unwrap();
        let first = payload.id().cloned().unwrap();
        payload.features.push(Feature::new("2"));
        assert_eq!(payload.derive_id().unwrap(), &first);
    }

    #[test]
    fn existing_id_is_validated() {
        let mut value = raw(json!([]));
        value["id"] = json!("c/workflow-cog/x");
        assert!(ProcessPayload::new(value.clone(), false).is_ok());

        value["id"] = json!("not-an-id");
        assert_eq!(
            ProcessPayload::new(value, true),
            Err(ValidationError::InvalidId("not-an-id".into()))
        );
    }

    #[rstest]
    #[case::missing(json!({"collection": "c"}))]
    #[case::numeric(json!({"id": 5}))]
    fn features_without_string_ids_need_a_supplied_id(#[case] feature: Value) {
        let mut value = raw(json!([feature]));
        value["id"] = json!("c/workflow-cog/x");
        let payload = ProcessPayload::new(value.clone(), false).unwrap();
        assert_eq!(payload.id().unwrap().as_str(), "c/workflow-cog/x");
        assert_eq!(payload.to_value()["features"][0].get("id"), feature.get("id"));

        value.as_object_mut().unwrap().remove("id");
        assert!(matches!(
            ProcessPayload::new(value, true),
            Err(ValidationError::FeatureWithoutId(_))
        ));
    }

    #[test]
    fn id_cannot_be_derived_without_features() {
        assert_eq!(
            ProcessPayload::new(raw(json!([])), true),
            Err(ValidationError::NoFeatures)
        );
        assert_eq!(
            ProcessPayload::new(raw(json!([{"id": "a"}])), false),
            Err(ValidationError::MissingId)
        );
    }

    #[test]
    fn process_is_required_and_non_empty() {
        assert_eq!(
            ProcessPayload::new(json!({"features": []}), true),
            Err(ValidationError::MissingProcess)
        );
        assert_eq!(
            ProcessPayload::new(json!({"process": []}), true),
            Err(ValidationError::EmptyProcess)
        );
        assert_eq!(
            ProcessPayload::new(json!({"process": {"workflow": "w"}}), true),
            Err(ValidationError::EmptyProcess)
        );
        assert_eq!(
            ProcessPayload::new(json!([1, 2]), true),
            Err(ValidationError::NotAnObject)
        );
    }

    #[test]
    fn serialization_round_trips() {
        let mut value = raw(json!([{"id": "a", "links": [{"rel": "self"}]}]));
        value["process"]
            .as_array_mut()
            .unwrap()
            .push(json!({"workflow": "next"}));
        let payload = ProcessPayload::new(value, true).unwrap();
        let again = ProcessPayload::try_from(serde_json::to_value(&payload).unwrap()).unwrap();
        assert_eq!(payload, again);
        assert_eq!(again.process_len(), 2);
    }

    #[tokio::test]
    async fn small_payload_stays_inline() {
        let payload = ProcessPayload::new(raw(json!([{"id": "a"}])), true).unwrap();
        let blobs = InMemoryBlobStore::new();
        let ids = UlidGenerator::new(SystemClock);

        let encoded = payload
            .transport_payload(MAX_PAYLOAD_LENGTH, None, &blobs, &ids)
            .await
            .unwrap();
        assert_eq!(encoded, TransportPayload::Inline(payload.to_value()));
        assert!(blobs.is_empty().await);
    }

    fn oversized() -> ProcessPayload {
        let mut payload = ProcessPayload::new(raw(json!([{"id": "a"}])), true).unwrap();
        payload
            .extra
            .insert("blob".into(), Value::String("x".repeat(MAX_PAYLOAD_LENGTH)));
        payload
    }

    #[tokio::test]
    async fn oversized_without_bucket_is_a_configuration_error() {
        let payload = oversized();
        let blobs = InMemoryBlobStore::new();
        let ids = UlidGenerator::new(SystemClock);

        let err = payload
            .transport_payload(MAX_PAYLOAD_LENGTH, None, &blobs, &ids)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PayloadError::Configuration(ConfigurationError::PayloadTooLarge { max: MAX_PAYLOAD_LENGTH, .. })
        ));
    }

    #[tokio::test]
    async fn oversized_with_bucket_returns_resolvable_pointer() {
        let payload = oversized();
        let blobs = InMemoryBlobStore::new();
        let ids = UlidGenerator::new(SystemClock);

        let encoded = payload
            .transport_payload(MAX_PAYLOAD_LENGTH, Some("payloads"), &blobs, &ids)
            .await
            .unwrap();
        let url = encoded.url().unwrap().to_string();
        assert!(url.starts_with("s3://payloads/payloads/"));
        assert_eq!(
            serde_json::from_slice::<Value>(&encoded.to_bytes()).unwrap(),
            json!({"url": url})
        );
        assert_eq!(blobs.get_json(&url).await.unwrap(), payload.to_value());
    }

    #[tokio::test]
    async fn upload_skips_documents_that_already_point_somewhere() {
        let blobs = InMemoryBlobStore::new();
        let ids = UlidGenerator::new(SystemClock);
        let url = upload_payload(&json!({"url": "s3://x/y.json"}), "b", &blobs, &ids)
            .await
            .unwrap();
        assert_eq!(url, "s3://x/y.json");
        assert!(blobs.is_empty().await);
    }

    #[tokio::test]
    async fn from_event_dereferences_url_records() {
        let blobs = InMemoryBlobStore::new();
        blobs
            .put_json(&raw(json!([{"id": "a"}])), "s3://payloads/in.json")
            .await
            .unwrap();
        let event = json!({"Records": [{"body": "{\"url\": \"s3://payloads/in.json\"}"}]});

        let payload = ProcessPayload::from_event(&event, &blobs, true).await.unwrap();
        assert_eq!(payload.id().unwrap().as_str(), "none/workflow-cog/a");
    }

    #[tokio::test]
    async fn from_event_requires_exactly_one_record() {
        let blobs = InMemoryBlobStore::new();

        let err = ProcessPayload::from_event(&json!({"Records": []}), &blobs, true)
            .await
            .unwrap_err();
        assert!(matches!(err, PayloadError::Validation(ValidationError::NoRecords(_))));

        let two = json!({"Records": [
            {"body": raw(json!([{"id": "a"}])).to_string()},
            {"body": raw(json!([{"id": "b"}])).to_string()},
        ]});
        let err = ProcessPayload::from_event(&two, &blobs, true).await.unwrap_err();
        assert!(matches!(
            err,
            PayloadError::Validation(ValidationError::MultipleRecords(2))
        ));
    }

    #[test]
    fn feature_messages_carry_attributes() {
        let payload = ProcessPayload::new(
            raw(json!([{"id": "a", "collection": "c", "properties": {"platform": "p"}}])),
            true,
        )
        .unwrap();
        let messages = payload.feature_messages();
        assert_eq!(messages.len(), 1);
        let (body, attrs) = &messages[0];
        assert_eq!(serde_json::from_str::<Value>(body).unwrap()["id"], json!("a"));
        assert_eq!(attrs["collection"].string_value, "c");
        assert_eq!(attrs["platform"].string_value, "p");
    }
}
