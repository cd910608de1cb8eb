//! InMemoryExecutionEngine - 開発用の実行エンジン
//!
//! start を受け取って記録するだけで、workflow は実行しません。

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashSet;
use tokio::sync::Mutex;

use crate::ports::{EngineError, ExecutionEngine};

/// A start command the engine accepted.
#[derive(Debug, Clone, PartialEq)]
pub struct StartedExecution {
    pub target: String,
    pub name: String,
    pub input: Value,
}

#[derive(Default)]
pub struct InMemoryExecutionEngine {
    /// `None` accepts every target.
    targets: Option<HashSet<String>>,
    started: Mutex<Vec<StartedExecution>>,
}

impl InMemoryExecutionEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Only the given targets exist; any other start fails as not found.
    pub fn with_targets<I, S>(targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            targets: Some(targets.into_iter().map(Into::into).collect()),
            started: Mutex::new(Vec::new()),
        }
    }

    pub async fn started(&self) -> Vec<StartedExecution> {
        self.started.lock().await.clone()
    }
}

#[async_trait]
impl ExecutionEngine for InMemoryExecutionEngine {
    async fn start(
        &self,
        target: &str,
        execution_name: &str,
        input: &[u8],
    ) -> Result<String, EngineError> {
        if let Some(targets) = &self.targets
            && !targets.contains(target)
        {
            return Err(EngineError::TargetNotFound(target.to_string()));
        }
        let input: Value = serde_json::from_slice(input)
            .map_err(|e| EngineError::Provider(format!("invalid execution input: {e}")))?;

        let mut started = self.started.lock().await;
        if started
            .iter()
            .any(|s| s.target == target && s.name == execution_name)
        {
            return Err(EngineError::Provider(format!(
                "execution already exists: {target}:{execution_name}"
            )));
        }
        started.push(StartedExecution {
            target: target.to_string(),
            name: execution_name.to_string(),
            input,
        });
        Ok(format!("{target}:{execution_name}"))
    }
}
