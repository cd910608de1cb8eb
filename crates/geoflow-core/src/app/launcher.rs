//! Launcher - 1 payload の起動（claim → start → record）
//!
//! # フロー
//! 1. 実行対象 = `base_workflow_arn` + workflow 名
//! 2. 実行入力の正本を `{bucket}/{id}/input.json` に保存
//! 3. StateStore::claim（条件付き）。失敗したら skip
//! 4. ExecutionEngine::start（inline または `{url}` pointer）
//! 5. StateStore::record_started
//!
//! 失敗は必ず state store に FAILED として記録してから返します。
//! 実行対象が存在しない場合だけ Terminal、それ以外は Transient です。

use std::sync::Arc;

use crate::app::config::LaunchConfig;
use crate::domain::{
    ConfigurationError, ErrorKind, PayloadError, PayloadId, ProcessPayload, StateEnum,
    ValidationError,
};
use crate::ports::{
    BlobStore, EngineError, ExecutionEngine, IdGenerator, StateStore, StoreError, SystemClock,
    UlidGenerator,
};

/// Result of one launch attempt that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchOutcome {
    Started { id: PayloadId, execution: String },
    /// Another invocation owns the payload; nothing was started.
    Skipped { id: PayloadId },
}

impl LaunchOutcome {
    pub fn id(&self) -> &PayloadId {
        match self {
            LaunchOutcome::Started { id, .. } | LaunchOutcome::Skipped { id } => id,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LaunchError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// Retrying cannot help; route to a dead-letter path.
    #[error("terminal launch failure for {id}: {message}")]
    Terminal { id: PayloadId, message: String },

    /// Recorded as FAILED; the surrounding infrastructure should redrive.
    #[error("launch failure for {id}: {message}")]
    Transient { id: PayloadId, message: String },

    /// Batched state lookup failed before anything was launched.
    #[error("failed fetching payload states: {0}")]
    StateLookup(#[source] StoreError),
}

impl LaunchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LaunchError::Validation(_) => ErrorKind::Validation,
            LaunchError::Configuration(_) => ErrorKind::Configuration,
            LaunchError::Terminal { .. } => ErrorKind::Terminal,
            LaunchError::Transient { .. } | LaunchError::StateLookup(_) => ErrorKind::Transient,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.kind() == ErrorKind::Terminal
    }
}

/// Which external call broke the attempt.
#[derive(Debug, thiserror::Error)]
enum AttemptError {
    #[error("{0}")]
    Payload(#[from] PayloadError),

    #[error("{0}")]
    Store(#[from] StoreError),

    #[error("{0}")]
    Engine(#[from] EngineError),
}

/// Launch coordinator over the state store, execution engine and blob store.
pub struct Launcher {
    state_store: Arc<dyn StateStore>,
    engine: Arc<dyn ExecutionEngine>,
    blob_store: Arc<dyn BlobStore>,
    ids: Arc<dyn IdGenerator>,
    config: LaunchConfig,
}

impl Launcher {
    pub fn builder() -> LauncherBuilder {
        LauncherBuilder::new()
    }

    pub fn config(&self) -> &LaunchConfig {
        &self.config
    }

    pub fn state_store(&self) -> &Arc<dyn StateStore> {
        &self.state_store
    }

    /// Location of the authoritative execution input for `id`.
    pub fn payload_url(&self, id: &PayloadId) -> Result<String, ConfigurationError> {
        let bucket = self
            .config
            .payload_bucket
            .as_deref()
            .ok_or(ConfigurationError::MissingPayloadBucket)?;
        Ok(id.payload_url(bucket))
    }

    /// Start the payload's active step, at most once per id.
    pub async fn launch(&self, payload: &ProcessPayload) -> Result<LaunchOutcome, LaunchError> {
        let id = payload.require_id()?.clone();
        let payload_url = self.payload_url(&id)?;
        let target = self.config.target(payload.workflow());

        match self.attempt(payload, &id, &target, &payload_url).await {
            Ok(Some(execution)) => {
                tracing::debug!(payload_id = %id, %target, %execution, "started execution");
                Ok(LaunchOutcome::Started { id, execution })
            }
            Ok(None) => {
                tracing::info!(payload_id = %id, "payload claimed elsewhere, skipping");
                self.state_store
                    .record_skipped(&id, StateEnum::Processing, &payload_url)
                    .await
                    .map_err(|e| LaunchError::Transient {
                        id: id.clone(),
                        message: format!("failed recording skip ({e})"),
                    })?;
                Ok(LaunchOutcome::Skipped { id })
            }
            Err(e) => Err(self.fail(id, &target, &payload_url, e).await),
        }
    }

    /// `Ok(None)` when the conditional claim (or the conditional start
    /// record) lost against another invocation.
    async fn attempt(
        &self,
        payload: &ProcessPayload,
        id: &PayloadId,
        target: &str,
        payload_url: &str,
    ) -> Result<Option<String>, AttemptError> {
        self.blob_store
            .put_json(&payload.to_value(), payload_url)
            .await
            .map_err(PayloadError::from)?;

        let execution_name = match self
            .state_store
            .claim(id, payload_url, &self.config.base_workflow_arn)
            .await
        {
            Ok(name) => name,
            Err(StoreError::ConditionalCheckFailed(_)) => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let input = payload
            .transport_payload(
                self.config.max_payload_length,
                self.config.payload_bucket.as_deref(),
                self.blob_store.as_ref(),
                self.ids.as_ref(),
            )
            .await?;

        let execution = self
            .engine
            .start(target, &execution_name, &input.to_bytes())
            .await?;

        match self.state_store.record_started(id, &execution, payload_url).await {
            Ok(()) => Ok(Some(execution)),
            Err(StoreError::ConditionalCheckFailed(_)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn fail(
        &self,
        id: PayloadId,
        target: &str,
        payload_url: &str,
        error: AttemptError,
    ) -> LaunchError {
        let terminal = matches!(error, AttemptError::Engine(EngineError::TargetNotFound(_)));
        let message = if terminal {
            format!("workflow target does not exist: {target}")
        } else {
            format!("failed starting workflow ({error})")
        };

        if let Err(e) = self.state_store.record_failed(&id, &message, payload_url).await {
            tracing::error!(payload_id = %id, error = %e, "failed recording launch failure");
            return LaunchError::Transient {
                id,
                message: format!("{message}; recording the failure also failed ({e})"),
            };
        }

        if terminal {
            tracing::error!(payload_id = %id, %target, "terminal launch failure");
            LaunchError::Terminal { id, message }
        } else {
            tracing::error!(payload_id = %id, %target, %message, "launch failed");
            LaunchError::Transient { id, message }
        }
    }
}

impl ProcessPayload {
    /// Launch this payload through `launcher`.
    pub async fn launch(&self, launcher: &Launcher) -> Result<LaunchOutcome, LaunchError> {
        launcher.launch(self).await
    }
}

/// LauncherBuilder は Launcher を構築
///
/// # Fail-fast 設計
/// - build() 時に必須 port が揃っているかチェック
/// - 不足があれば BuildError を返す
#[derive(Default)]
pub struct LauncherBuilder {
    state_store: Option<Arc<dyn StateStore>>,
    engine: Option<Arc<dyn ExecutionEngine>>,
    blob_store: Option<Arc<dyn BlobStore>>,
    ids: Option<Arc<dyn IdGenerator>>,
    config: LaunchConfig,
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum BuildError {
    #[error("Missing ports: {0:?}. These ports must be provided before building.")]
    MissingPorts(Vec<&'static str>),
}

impl LauncherBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state_store(mut self, store: Arc<dyn StateStore>) -> Self {
        self.state_store = Some(store);
        self
    }

    pub fn engine(mut self, engine: Arc<dyn ExecutionEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    pub fn blob_store(mut self, store: Arc<dyn BlobStore>) -> Self {
        self.blob_store = Some(store);
        self
    }

    /// Defaults to ULIDs on the system clock.
    pub fn id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = Some(ids);
        self
    }

    pub fn config(mut self, config: LaunchConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Result<Launcher, BuildError> {
        match (self.state_store, self.engine, self.blob_store) {
            (Some(state_store), Some(engine), Some(blob_store)) => Ok(Launcher {
                state_store,
                engine,
                blob_store,
                ids: self
                    .ids
                    .unwrap_or_else(|| Arc::new(UlidGenerator::new(SystemClock))),
                config: self.config,
            }),
            (state_store, engine, blob_store) => {
                let mut missing = Vec::new();
                if state_store.is_none() {
                    missing.push("state_store");
                }
                if engine.is_none() {
                    missing.push("engine");
                }
                if blob_store.is_none() {
                    missing.push("blob_store");
                }
                Err(BuildError::MissingPorts(missing))
            }
        }
    }
}
