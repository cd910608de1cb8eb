//! StateStore port - payload 状態の正本（source of truth）
//!
//! StateStore は以下を管理します：
//! - 状態（StateEnum）
//! - 実行ハンドル（execution）
//! - 遷移の履歴（WorkflowEvent）
//!
//! # 設計原則
//! - `claim` は条件付き書き込み（PROCESSING / CLAIMED の上書き禁止）
//! - invocation 間の排他制御はこの条件付き claim だけで行う

use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;

use crate::domain::{PayloadId, StateEnum};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Another invocation owns the record. Not a failure: callers skip.
    #[error("conditional check failed for {0}")]
    ConditionalCheckFailed(PayloadId),

    #[error("state store error: {0}")]
    Backend(String),
}

#[async_trait]
pub trait StateStore: Send + Sync {
    /// Atomically move the record to CLAIMED unless it is in flight.
    ///
    /// Returns the execution name the caller must start under.
    async fn claim(
        &self,
        id: &PayloadId,
        payload_url: &str,
        target_base: &str,
    ) -> Result<String, StoreError>;

    /// Record the started execution handle (state PROCESSING).
    async fn record_started(
        &self,
        id: &PayloadId,
        execution: &str,
        payload_url: &str,
    ) -> Result<(), StoreError>;

    async fn record_failed(
        &self,
        id: &PayloadId,
        message: &str,
        payload_url: &str,
    ) -> Result<(), StoreError>;

    /// Audit-only: the state is left unchanged.
    async fn record_skipped(
        &self,
        id: &PayloadId,
        observed: StateEnum,
        payload_url: &str,
    ) -> Result<(), StoreError>;

    /// Audit-only: the state is left unchanged.
    async fn record_duplicate(&self, id: &PayloadId, payload_url: &str) -> Result<(), StoreError>;

    /// Current states; ids without a record are absent from the map.
    async fn get_states(
        &self,
        ids: &[PayloadId],
    ) -> Result<HashMap<PayloadId, StateEnum>, StoreError>;
}
