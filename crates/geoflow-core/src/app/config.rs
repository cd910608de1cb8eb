//! LaunchConfig - 起動時の設定
//!
//! 環境変数（`GEOFLOW_` prefix）から読み込み、Launcher に明示的に渡します。
//! プロセス全体の状態を都度読みに行くことはしません。

use config::{Config, Environment};
use serde::Deserialize;

use crate::domain::{ConfigurationError, MAX_PAYLOAD_LENGTH};

pub const ENV_PREFIX: &str = "GEOFLOW";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LaunchConfig {
    /// Bucket for execution inputs and oversized payloads.
    pub payload_bucket: Option<String>,
    /// Prefix the active step's workflow name is appended to.
    pub base_workflow_arn: String,
    /// Largest inline execution input, in bytes.
    pub max_payload_length: usize,
}

impl Default for LaunchConfig {
    fn default() -> Self {
        Self {
            payload_bucket: None,
            base_workflow_arn: String::new(),
            max_payload_length: MAX_PAYLOAD_LENGTH,
        }
    }
}

impl LaunchConfig {
    /// `GEOFLOW_PAYLOAD_BUCKET`, `GEOFLOW_BASE_WORKFLOW_ARN`,
    /// `GEOFLOW_MAX_PAYLOAD_LENGTH`.
    pub fn from_env() -> Result<Self, ConfigurationError> {
        Self::from_environment(Environment::with_prefix(ENV_PREFIX))
    }

    pub fn from_environment(environment: Environment) -> Result<Self, ConfigurationError> {
        Config::builder()
            .add_source(environment.try_parsing(true).ignore_empty(true))
            .build()
            .and_then(|config| config.try_deserialize())
            .map_err(|e| ConfigurationError::Load(e.to_string()))
    }

    pub fn with_payload_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.payload_bucket = Some(bucket.into());
        self
    }

    pub fn with_base_workflow_arn(mut self, arn: impl Into<String>) -> Self {
        self.base_workflow_arn = arn.into();
        self
    }

    pub fn with_max_payload_length(mut self, max: usize) -> Self {
        self.max_payload_length = max;
        self
    }

    /// Execution target for a workflow name.
    pub fn target(&self, workflow: &str) -> String {
        format!("{}{}", self.base_workflow_arn, workflow)
    }
}
