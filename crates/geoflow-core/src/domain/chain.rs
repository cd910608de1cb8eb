//! Chain expansion: successor payloads for multi-step workflows.

use serde_json::Value;

use super::errors::ValidationError;
use super::filter::ChainFilter;
use super::payload::ProcessPayload;
use super::step::ProcessStep;

/// Lazy iterator over the next generation of payloads.
///
/// `process[1]` is either one step (one successor) or an array of steps
/// (one successor per entry). Each successor:
/// - has no id (callers derive a fresh one)
/// - drops the consumed step and promotes its own step to the front
/// - keeps only the parent features matching the successor step's
///   `chain_filter`, if it declares one
///
/// The parent payload is never mutated.
pub struct NextPayloads<'a> {
    parent: &'a ProcessPayload,
    successors: std::slice::Iter<'a, Value>,
}

impl<'a> Iterator for NextPayloads<'a> {
    type Item = Result<ProcessPayload, ValidationError>;

    fn next(&mut self) -> Option<Self::Item> {
        let raw = self.successors.next()?;
        Some(successor(self.parent, raw))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.successors.size_hint()
    }
}

impl ProcessPayload {
    /// Successor payloads; empty when this is the last step.
    pub fn next_payloads(&self) -> NextPayloads<'_> {
        let successors: &[Value] = match self.pending.first() {
            None => &[],
            Some(Value::Array(steps)) => steps,
            Some(single) => std::slice::from_ref(single),
        };
        NextPayloads {
            parent: self,
            successors: successors.iter(),
        }
    }
}

fn successor(parent: &ProcessPayload, raw: &Value) -> Result<ProcessPayload, ValidationError> {
    let step = ProcessStep::from_value(raw)?;

    let features = match &step.chain_filter {
        Some(expression) => ChainFilter::parse(expression)?.apply(&parent.features),
        None => parent.features.clone(),
    };

    Ok(ProcessPayload {
        id: None,
        step,
        pending: parent.pending[1..].to_vec(),
        features,
        extra: parent.extra.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Feature;
    use serde_json::json;

    fn step(workflow: &str) -> Value {
        json!({"upload_options": {}, "workflow": workflow, "tasks": {}})
    }

    fn payload(process: Vec<Value>) -> ProcessPayload {
        ProcessPayload::new(
            json!({
                "features": [
                    {"id": "a", "collection": "c", "properties": {"cloud": 5}},
                    {"id": "b", "collection": "c", "properties": {"cloud": 50}},
                ],
                "process": process,
            }),
            true,
        )
        .unwrap()
    }

    #[test]
    fn single_step_has_no_successors() {
        let p = payload(vec![step("one")]);
        assert_eq!(p.next_payloads().count(), 0);
    }

    #[test]
    fn single_successor_is_promoted() {
        let p = payload(vec![step("one"), step("two"), step("three")]);
        let next: Vec<_> = p.next_payloads().collect::<Result<_, _>>().unwrap();
        assert_eq!(next.len(), 1);

        let child = &next[0];
        assert!(child.id().is_none());
        assert_eq!(child.workflow(), "two");
        assert_eq!(child.process_len(), 2);
        assert_eq!(child.features().len(), 2);

        // parent untouched
        assert_eq!(p.workflow(), "one");
        assert_eq!(p.process_len(), 3);
        assert!(p.id().is_some());
    }

    #[test]
    fn fan_out_yields_one_per_entry() {
        let p = payload(vec![step("one"), json!([step("left"), step("right")])]);
        let workflows: Vec<String> = p
            .next_payloads()
            .map(|r| r.unwrap().workflow().to_string())
            .collect();
        assert_eq!(workflows, vec!["left", "right"]);
    }

    #[test]
    fn chain_filter_restricts_features() {
        let mut filtered = step("two");
        filtered["chain_filter"] = json!("@.properties.cloud < 10");
        let p = payload(vec![step("one"), filtered]);

        let mut child = p.next_payloads().next().unwrap().unwrap();
        let ids: Vec<&str> = child.features().iter().filter_map(Feature::id).collect();
        assert_eq!(ids, vec!["a"]);
        assert_eq!(child.derive_id().unwrap().as_str(), "c/workflow-two/a");
    }

    #[test]
    fn filter_matching_nothing_yields_empty_features() {
        let mut filtered = step("two");
        filtered["chain_filter"] = json!("@.properties.cloud > 100");
        let p = payload(vec![step("one"), filtered]);

        let child = p.next_payloads().next().unwrap().unwrap();
        assert!(child.features().is_empty());
    }

    #[test]
    fn invalid_successor_step_is_reported() {
        let p = payload(vec![step("one"), json!({"workflow": "two"})]);
        let err = p.next_payloads().next().unwrap().unwrap_err();
        assert_eq!(err, ValidationError::MissingStepField("upload_options"));
    }
}
