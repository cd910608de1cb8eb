//! Impls - 実装（開発用・テスト用）
//!
//! このモジュールには ports の in-memory 実装を含めます。
//!
//! # 含まれる実装
//! - **InMemoryStateStore**: 条件付き claim を持つ状態 DB
//! - **InMemoryExecutionEngine**: start を記録するだけの実行エンジン
//! - **InMemoryBlobStore**: url をキーにした JSON ストア
//! - **InMemoryQueueClient / InMemoryTopicClient**: 一括送信の記録
//!
//! 本番用の実装（クラウドプロバイダの SDK を使うもの）は別クレートに配置します。

pub mod inmem_blob_store;
pub mod inmem_engine;
pub mod inmem_publish;
pub mod inmem_state_store;

pub use self::inmem_blob_store::InMemoryBlobStore;
pub use self::inmem_engine::{InMemoryExecutionEngine, StartedExecution};
pub use self::inmem_publish::{InMemoryQueueClient, InMemoryTopicClient};
pub use self::inmem_state_store::{InMemoryStateStore, StateRecord};
