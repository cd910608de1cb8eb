//! Inbound event unwrapping.
//!
//! Events arrive either bare or wrapped by the delivering service:
//! - queue delivery: `{"Records": [{"body": "<json>"}]}`
//! - topic delivery: `{"Records": [{"Sns": {"Message": "<json>"}}]}`
//! - topic-to-queue: the queue `body` is itself a topic envelope with `Message`

use serde_json::Value;

use super::errors::ValidationError;

/// Pull the payload records out of an inbound event.
pub fn extract_event_records(event: &Value) -> Result<Vec<Value>, ValidationError> {
    let records = match event {
        Value::Null => return Ok(Vec::new()),
        Value::Object(obj) => match obj.get("Records") {
            Some(Value::Array(records)) => records,
            Some(other) => {
                return Err(ValidationError::MalformedRecord(format!(
                    "`Records` must be an array, got {other}"
                )));
            }
            None => return Ok(vec![event.clone()]),
        },
        other => return Ok(vec![other.clone()]),
    };

    records.iter().map(unwrap_record).collect()
}

fn unwrap_record(record: &Value) -> Result<Value, ValidationError> {
    if let Some(body) = record.get("body") {
        let body = parse_if_string(body)?;
        return match body.get("Message") {
            Some(message) if body.get("TopicArn").is_some() || body.get("Type").is_some() => {
                parse_if_string(message)
            }
            _ => Ok(body),
        };
    }
    if let Some(message) = record.get("Sns").and_then(|sns| sns.get("Message")) {
        return parse_if_string(message);
    }
    Ok(record.clone())
}

fn parse_if_string(value: &Value) -> Result<Value, ValidationError> {
    match value {
        Value::String(s) => {
            serde_json::from_str(s).map_err(|e| ValidationError::MalformedRecord(e.to_string()))
        }
        other => Ok(other.clone()),
    }
}
