//! ProcessStep - one entry of a payload's `process` chain.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::errors::ValidationError;
use super::filter::ChainFilter;

/// Definition of one workflow step.
///
/// `upload_options` and `tasks` are opaque to orchestration and are handed to
/// the workflow as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessStep {
    pub upload_options: Value,
    pub workflow: String,
    pub tasks: Value,

    /// Force a re-run regardless of the stored state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replace: Option<bool>,

    /// Predicate restricting which parent features enter this step.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_filter: Option<String>,

    /// Overrides the collections component of the derived id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collections: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ProcessStep {
    pub fn new(workflow: impl Into<String>) -> Self {
        Self {
            upload_options: Value::Object(Map::new()),
            workflow: workflow.into(),
            tasks: Value::Object(Map::new()),
            replace: None,
            chain_filter: None,
            collections: None,
            extra: Map::new(),
        }
    }

    /// Validate a raw `process` entry.
    ///
    /// Required keys are checked one by one so the error names the first
    /// missing field, in the order `upload_options`, `workflow`, `tasks`.
    pub fn from_value(value: &Value) -> Result<Self, ValidationError> {
        let Value::Object(obj) = value else {
            return Err(ValidationError::StepNotObject);
        };
        for field in ["upload_options", "workflow", "tasks"] {
            if !obj.contains_key(field) {
                return Err(ValidationError::MissingStepField(field));
            }
        }
        let step: ProcessStep =
            serde_json::from_value(value.clone()).map_err(|e| ValidationError::InvalidStepField {
                field: "process",
                message: e.to_string(),
            })?;
        if let Some(expression) = &step.chain_filter {
            ChainFilter::parse(expression)?;
        }
        Ok(step)
    }

    pub fn replace(&self) -> bool {
        self.replace.unwrap_or(false)
    }

    pub fn to_value(&self) -> Value {
        // Derived Serialize on a struct of JSON values cannot fail.
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}
