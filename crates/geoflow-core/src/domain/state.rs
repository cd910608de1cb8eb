//! State - payload lifecycle states and the events recorded against them.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::ids::PayloadId;

/// Lifecycle state of a payload in the state store.
///
/// State transitions:
/// - (absent) -> CLAIMED -> PROCESSING -> COMPLETED
/// - PROCESSING -> FAILED | ABORTED | INVALID
/// - FAILED | ABORTED -> CLAIMED (retry)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StateEnum {
    Processing,
    Claimed,
    Completed,
    Failed,
    Aborted,
    Invalid,
}

impl StateEnum {
    /// States from which a new launch is attempted without `replace`.
    pub fn is_retryable(self) -> bool {
        matches!(self, StateEnum::Failed | StateEnum::Aborted)
    }

    /// States that block a conditional claim.
    pub fn is_in_flight(self) -> bool {
        matches!(self, StateEnum::Processing | StateEnum::Claimed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StateEnum::Processing => "PROCESSING",
            StateEnum::Claimed => "CLAIMED",
            StateEnum::Completed => "COMPLETED",
            StateEnum::Failed => "FAILED",
            StateEnum::Aborted => "ABORTED",
            StateEnum::Invalid => "INVALID",
        }
    }
}

impl fmt::Display for StateEnum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Caller-supplied state row (skips the batched lookup).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateItem {
    pub payload_id: PayloadId,
    pub state: StateEnum,
}

/// Audit record of one transition written to the state store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkflowEvent {
    Claimed {
        payload_id: PayloadId,
        execution_name: String,
        payload_url: String,
    },
    Started {
        payload_id: PayloadId,
        execution: String,
        payload_url: String,
    },
    Failed {
        payload_id: PayloadId,
        message: String,
        payload_url: String,
    },
    Skipped {
        payload_id: PayloadId,
        state: StateEnum,
        payload_url: String,
    },
    Duplicated {
        payload_id: PayloadId,
        payload_url: String,
    },
}

impl WorkflowEvent {
    pub fn payload_id(&self) -> &PayloadId {
        match self {
            WorkflowEvent::Claimed { payload_id, .. }
            | WorkflowEvent::Started { payload_id, .. }
            | WorkflowEvent::Failed { payload_id, .. }
            | WorkflowEvent::Skipped { payload_id, .. }
            | WorkflowEvent::Duplicated { payload_id, .. } => payload_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(StateEnum::Failed, true, false)]
    #[case(StateEnum::Aborted, true, false)]
    #[case(StateEnum::Processing, false, true)]
    #[case(StateEnum::Claimed, false, true)]
    #[case(StateEnum::Completed, false, false)]
    #[case(StateEnum::Invalid, false, false)]
    fn classification(#[case] state: StateEnum, #[case] retryable: bool, #[case] in_flight: bool) {
        assert_eq!(state.is_retryable(), retryable);
        assert_eq!(state.is_in_flight(), in_flight);
    }

    #[test]
    fn serializes_screaming_snake_case() {
        assert_eq!(serde_json::to_string(&StateEnum::Completed).unwrap(), "\"COMPLETED\"");
        let parsed: StateEnum = serde_json::from_str("\"ABORTED\"").unwrap();
        assert_eq!(parsed, StateEnum::Aborted);
        assert_eq!(StateEnum::Processing.to_string(), "PROCESSING");
    }
}
