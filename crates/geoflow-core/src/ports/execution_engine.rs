//! ExecutionEngine port - workflow 実行エンジン
//!
//! エンジン内部のスケジューリングは扱いません。start コマンドを受け取り、
//! 実行ハンドルを返すだけのインターフェースです。

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// The target workflow does not exist. Retrying cannot help.
    #[error("execution target does not exist: {0}")]
    TargetNotFound(String),

    #[error("execution engine error: {0}")]
    Provider(String),
}

#[async_trait]
pub trait ExecutionEngine: Send + Sync {
    /// Start one execution; returns its handle.
    async fn start(
        &self,
        target: &str,
        execution_name: &str,
        input: &[u8],
    ) -> Result<String, EngineError>;
}
