//! PayloadSet - payload の一括起動
//!
//! 入力順に処理し、結果を started / skipped / dropped / failed に振り分けます。
//! 同じ呼び出しの中で二度目に現れた id は状態を見ずに dropped になります。

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::app::launcher::{LaunchError, LaunchOutcome, Launcher};
use crate::domain::{PayloadId, ProcessPayload, StateEnum, StateItem, ValidationError};
use crate::ports::StoreError;

/// Disjoint id lists, each in processing order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PayloadSetResults {
    pub started: Vec<PayloadId>,
    pub skipped: Vec<PayloadId>,
    pub dropped: Vec<PayloadId>,
    pub failed: Vec<PayloadId>,
}

pub struct PayloadSet {
    payloads: Vec<ProcessPayload>,
    states: Option<HashMap<PayloadId, StateEnum>>,
}

impl PayloadSet {
    /// Every payload must already carry an id.
    pub fn new(payloads: Vec<ProcessPayload>) -> Result<Self, ValidationError> {
        for payload in &payloads {
            payload.require_id()?;
        }
        Ok(Self {
            payloads,
            states: None,
        })
    }

    /// Use caller-supplied states instead of looking them up.
    pub fn with_state_items(
        payloads: Vec<ProcessPayload>,
        items: Vec<StateItem>,
    ) -> Result<Self, ValidationError> {
        if items.len() != payloads.len() {
            return Err(ValidationError::StateItemCount {
                items: items.len(),
                payloads: payloads.len(),
            });
        }
        let mut set = Self::new(payloads)?;
        set.states = Some(
            items
                .into_iter()
                .map(|item| (item.payload_id, item.state))
                .collect(),
        );
        Ok(set)
    }

    pub fn payloads(&self) -> &[ProcessPayload] {
        &self.payloads
    }

    pub fn len(&self) -> usize {
        self.payloads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payloads.is_empty()
    }

    fn ids(&self) -> Vec<PayloadId> {
        let mut seen = HashSet::new();
        self.payloads
            .iter()
            .filter_map(ProcessPayload::id)
            .filter(|id| seen.insert(*id))
            .cloned()
            .collect()
    }

    /// Launch what needs launching.
    ///
    /// Terminal launch failures land in `failed`; a transient failure stops
    /// the batch and is returned so the caller can redrive it.
    pub async fn process(
        &mut self,
        launcher: &Launcher,
        replace: bool,
    ) -> Result<PayloadSetResults, LaunchError> {
        let states = match self.states.take() {
            Some(states) => states,
            None => launcher
                .state_store()
                .get_states(&self.ids())
                .await
                .map_err(LaunchError::StateLookup)?,
        };

        let mut results = PayloadSetResults::default();
        let mut seen: HashSet<PayloadId> = HashSet::new();

        for payload in &self.payloads {
            let id = payload.require_id()?;
            let payload_url = launcher.payload_url(id)?;

            if seen.contains(id) {
                tracing::warn!(payload_id = %id, "dropping duplicated payload");
                record(launcher.state_store().record_duplicate(id, &payload_url).await, id)?;
                results.dropped.push(id.clone());
                continue;
            }
            seen.insert(id.clone());

            let state = states.get(id).copied();
            let retryable = state.is_none_or(StateEnum::is_retryable);
            if retryable || replace || payload.process().replace() {
                match payload.launch(launcher).await {
                    Ok(LaunchOutcome::Started { id, .. }) => results.started.push(id),
                    Ok(LaunchOutcome::Skipped { id }) => results.skipped.push(id),
                    Err(LaunchError::Terminal { id, .. }) => results.failed.push(id),
                    Err(e) => return Err(e),
                }
            } else if let Some(state) = state {
                tracing::info!(payload_id = %id, %state, "skipping, input already in this state");
                record(
                    launcher
                        .state_store()
                        .record_skipped(id, state, &payload_url)
                        .await,
                    id,
                )?;
                results.skipped.push(id.clone());
            }
        }

        self.states = Some(states);
        Ok(results)
    }
}

fn record(result: Result<(), StoreError>, id: &PayloadId) -> Result<(), LaunchError> {
    result.map_err(|e| LaunchError::Transient {
        id: id.clone(),
        message: format!("failed recording payload event ({e})"),
    })
}
