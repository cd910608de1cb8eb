//! Errors - エラー型と分類
//!
//! Construction-time failures (`ValidationError`, `ConfigurationError`) are
//! never recorded to the state store. Launch failures carry an `ErrorKind`
//! so callers can tell terminal from transient without matching internals.

use thiserror::Error;

/// ErrorKind は実行エラーの分類
///
/// - Validation: 不正な payload（リトライ無意味）
/// - Configuration: 設定不足（リトライ無意味）
/// - Terminal: 実行対象が存在しない（DLQ へ流す）
/// - Transient: 一時的なエラー（リトライ推奨）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    Configuration,
    Terminal,
    Transient,
}

impl ErrorKind {
    /// Should the surrounding infrastructure redrive this failure?
    pub fn is_retryable(self) -> bool {
        matches!(self, ErrorKind::Transient)
    }
}

/// Malformed envelope, step, feature or inbound event.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("payload must have a `process` array of process definitions")]
    MissingProcess,

    #[error("payload `process` must be an array with at least one process definition")]
    EmptyProcess,

    #[error("payload process definition must be an object")]
    StepNotObject,

    #[error("payload process must have `{0}` defined")]
    MissingStepField(&'static str),

    #[error("payload process field `{field}` is invalid: {message}")]
    InvalidStepField { field: &'static str, message: String },

    #[error("payload `features` must be an array of objects: {0}")]
    InvalidFeatures(String),

    #[error("payload has no `id` specified and one cannot be constructed without `features`")]
    NoFeatures,

    #[error("feature has no string `id`; cannot construct payload id: {0}")]
    FeatureWithoutId(String),

    #[error("payload has no `id`")]
    MissingId,

    #[error("invalid payload id: {0}")]
    InvalidId(String),

    #[error("payload must be a JSON object")]
    NotAnObject,

    #[error("invalid chain filter `{expression}`: {message}")]
    InvalidFilter { expression: String, message: String },

    #[error("failed to extract record from event: {0}")]
    NoRecords(String),

    #[error("multiple payloads are not supported ({0} records)")]
    MultipleRecords(usize),

    #[error("event record is not valid JSON: {0}")]
    MalformedRecord(String),

    #[error("the number of state items does not match the number of payloads: {items} != {payloads}")]
    StateItemCount { items: usize, payloads: usize },
}

/// Missing or inconsistent runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error(
        "no payload bucket defined and payload too large: length {actual} (max {max}); \
         define a payload bucket to enable uploads of oversized payloads"
    )]
    PayloadTooLarge { actual: usize, max: usize },

    #[error("a payload bucket must be configured to launch workflows")]
    MissingPayloadBucket,

    #[error("batch size must be between 1 and {max}, got {actual}")]
    BatchSize { actual: usize, max: usize },

    #[error("failed to load configuration: {0}")]
    Load(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transient_is_retryable() {
        assert!(ErrorKind::Transient.is_retryable());
        assert!(!ErrorKind::Terminal.is_retryable());
        assert!(!ErrorKind::Validation.is_retryable());
        assert!(!ErrorKind::Configuration.is_retryable());
    }

    #[test]
    fn oversized_message_names_actual_and_max() {
        let err = ConfigurationError::PayloadTooLarge {
            actual: 300_001,
            max: 250_000,
        };
        let msg = err.to_string();
        assert!(msg.contains("300001"));
        assert!(msg.contains("250000"));
    }
}
