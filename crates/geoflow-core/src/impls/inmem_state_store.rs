//! InMemoryStateStore - 開発用・テスト用の状態 DB
//!
//! # 実装詳細
//! - HashMap<PayloadId, StateRecord> を tokio の Mutex で保護
//! - claim は lock の中で「確認 → 書き込み」を行うので原子的
//! - すべての遷移を WorkflowEvent として順番に記録

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::domain::{PayloadId, StateEnum, WorkflowEvent};
use crate::ports::{IdGenerator, StateStore, StoreError, SystemClock, UlidGenerator};

/// One row of the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateRecord {
    pub state: StateEnum,
    pub payload_url: Option<String>,
    /// Execution name handed out by the last claim.
    pub execution_name: Option<String>,
    /// Handle recorded once the execution started.
    pub execution: Option<String>,
    pub last_error: Option<String>,
}

impl StateRecord {
    fn new(state: StateEnum) -> Self {
        Self {
            state,
            payload_url: None,
            execution_name: None,
            execution: None,
            last_error: None,
        }
    }
}

#[derive(Default)]
struct StoreState {
    records: HashMap<PayloadId, StateRecord>,
    events: Vec<WorkflowEvent>,
}

pub struct InMemoryStateStore {
    state: Mutex<StoreState>,
    ids: Arc<dyn IdGenerator>,
}

impl InMemoryStateStore {
    pub fn new(ids: Arc<dyn IdGenerator>) -> Self {
        Self {
            state: Mutex::new(StoreState::default()),
            ids,
        }
    }

    /// Seed a record (tests, fixtures).
    pub async fn set_state(&self, id: &PayloadId, state: StateEnum) {
        let mut guard = self.state.lock().await;
        guard
            .records
            .entry(id.clone())
            .and_modify(|r| r.state = state)
            .or_insert_with(|| StateRecord::new(state));
    }

    pub async fn state(&self, id: &PayloadId) -> Option<StateEnum> {
        self.state.lock().await.records.get(id).map(|r| r.state)
    }

    pub async fn record(&self, id: &PayloadId) -> Option<StateRecord> {
        self.state.lock().await.records.get(id).cloned()
    }

    pub async fn events(&self) -> Vec<WorkflowEvent> {
        self.state.lock().await.events.clone()
    }
}

impl Default for InMemoryStateStore {
    fn default() -> Self {
        Self::new(Arc::new(UlidGenerator::new(SystemClock)))
    }
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    async fn claim(
        &self,
        id: &PayloadId,
        payload_url: &str,
        target_base: &str,
    ) -> Result<String, StoreError> {
        let mut guard = self.state.lock().await;
        if let Some(existing) = guard.records.get(id)
            && existing.state.is_in_flight()
        {
            return Err(StoreError::ConditionalCheckFailed(id.clone()));
        }

        let execution_name = self.ids.generate_execution_name();
        let record = guard
            .records
            .entry(id.clone())
            .or_insert_with(|| StateRecord::new(StateEnum::Claimed));
        record.state = StateEnum::Claimed;
        record.payload_url = Some(payload_url.to_string());
        record.execution_name = Some(execution_name.clone());
        record.execution = None;
        record.last_error = None;

        tracing::trace!(payload_id = %id, target_base, %execution_name, "claimed");
        guard.events.push(WorkflowEvent::Claimed {
            payload_id: id.clone(),
            execution_name: execution_name.clone(),
            payload_url: payload_url.to_string(),
        });
        Ok(execution_name)
    }

    async fn record_started(
        &self,
        id: &PayloadId,
        execution: &str,
        payload_url: &str,
    ) -> Result<(), StoreError> {
        let mut guard = self.state.lock().await;
        match guard.records.get_mut(id) {
            Some(record) if record.state == StateEnum::Claimed => {
                record.state = StateEnum::Processing;
                record.execution = Some(execution.to_string());
            }
            _ => return Err(StoreError::ConditionalCheckFailed(id.clone())),
        }
        guard.events.push(WorkflowEvent::Started {
            payload_id: id.clone(),
            execution: execution.to_string(),
            payload_url: payload_url.to_string(),
        });
        Ok(())
    }

    async fn record_failed(
        &self,
        id: &PayloadId,
        message: &str,
        payload_url: &str,
    ) -> Result<(), StoreError> {
        let mut guard = self.state.lock().await;
        let record = guard
            .records
            .entry(id.clone())
            .or_insert_with(|| StateRecord::new(StateEnum::Failed));
        record.state = StateEnum::Failed;
        record.payload_url = Some(payload_url.to_string());
        record.last_error = Some(message.to_string());
        guard.events.push(WorkflowEvent::Failed {
            payload_id: id.clone(),
            message: message.to_string(),
            payload_url: payload_url.to_string(),
        });
        Ok(())
    }

    async fn record_skipped(
        &self,
        id: &PayloadId,
        observed: StateEnum,
        payload_url: &str,
    ) -> Result<(), StoreError> {
        self.state.lock().await.events.push(WorkflowEvent::Skipped {
            payload_id: id.clone(),
            state: observed,
            payload_url: payload_url.to_string(),
        });
        Ok(())
    }

    async fn record_duplicate(&self, id: &PayloadId, payload_url: &str) -> Result<(), StoreError> {
        self.state.lock().await.events.push(WorkflowEvent::Duplicated {
            payload_id: id.clone(),
            payload_url: payload_url.to_string(),
        });
        Ok(())
    }

    async fn get_states(
        &self,
        ids: &[PayloadId],
    ) -> Result<HashMap<PayloadId, StateEnum>, StoreError> {
        let guard = self.state.lock().await;
        Ok(ids
            .iter()
            .filter_map(|id| guard.records.get(id).map(|r| (id.clone(), r.state)))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn id() -> PayloadId {
        PayloadId::parse("c/workflow-w/a").unwrap()
    }

    #[tokio::test]
    async fn claim_then_start_moves_to_processing() {
        let store = InMemoryStateStore::default();
        let name = store.claim(&id(), "s3://b/in.json", "arn:").await.unwrap();
        assert_eq!(store.state(&id()).await, Some(StateEnum::Claimed));

        store
            .record_started(&id(), &format!("arn:w:{name}"), "s3://b/in.json")
            .await
            .unwrap();
        let record = store.record(&id()).await.unwrap();
        assert_eq!(record.state, StateEnum::Processing);
        assert_eq!(record.execution_name.as_deref(), Some(name.as_str()));
        assert_eq!(store.events().await.len(), 2);
    }

    #[rstest]
    #[case::processing(StateEnum::Processing)]
    #[case::claimed(StateEnum::Claimed)]
    #[tokio::test]
    async fn claim_is_conditional_on_in_flight_states(#[case] state: StateEnum) {
        let store = InMemoryStateStore::default();
        store.set_state(&id(), state).await;
        assert_eq!(
            store.claim(&id(), "u", "arn:").await,
            Err(StoreError::ConditionalCheckFailed(id()))
        );
    }

    #[rstest]
    #[case::failed(StateEnum::Failed)]
    #[case::aborted(StateEnum::Aborted)]
    #[case::completed(StateEnum::Completed)]
    #[case::invalid(StateEnum::Invalid)]
    #[tokio::test]
    async fn claim_overwrites_settled_states(#[case] state: StateEnum) {
        let store = InMemoryStateStore::default();
        store.set_state(&id(), state).await;
        assert!(store.claim(&id(), "u", "arn:").await.is_ok());
        assert_eq!(store.state(&id()).await, Some(StateEnum::Claimed));
    }

    #[tokio::test]
    async fn started_requires_a_claim() {
        let store = InMemoryStateStore::default();
        assert!(matches!(
            store.record_started(&id(), "exec", "u").await,
            Err(StoreError::ConditionalCheckFailed(_))
        ));
    }

    #[tokio::test]
    async fn audit_records_leave_state_alone() {
        let store = InMemoryStateStore::default();
        store.set_state(&id(), StateEnum::Completed).await;
        store.record_skipped(&id(), StateEnum::Completed, "u").await.unwrap();
        store.record_duplicate(&id(), "u").await.unwrap();

        assert_eq!(store.state(&id()).await, Some(StateEnum::Completed));
        let events = store.events().await;
        assert!(matches!(events[0], WorkflowEvent::Skipped { state: StateEnum::Completed, .. }));
        assert!(matches!(events[1], WorkflowEvent::Duplicated { .. }));
    }

    #[tokio::test]
    async fn get_states_omits_unknown_ids() {
        let store = InMemoryStateStore::default();
        let other = PayloadId::parse("c/workflow-w/b").unwrap();
        store.set_state(&id(), StateEnum::Failed).await;

        let states = store.get_states(&[id(), other.clone()]).await.unwrap();
        assert_eq!(states.get(&id()), Some(&StateEnum::Failed));
        assert!(!states.contains_key(&other));
    }
}
