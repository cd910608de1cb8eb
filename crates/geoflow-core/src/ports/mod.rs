//! Ports - 抽象化レイヤー
//!
//! このモジュールは Hexagonal Architecture の「ポート」を定義します。
//! 各 trait は外部システム（状態 DB, 実行エンジン, Blob storage, キュー/トピック）への
//! インターフェースを提供し、実装の詳細を隠蔽します。

pub mod blob_store;
pub mod clock;
pub mod execution_engine;
pub mod id_generator;
pub mod message_sink;
pub mod state_store;

pub use self::blob_store::{BlobError, BlobStore, parse_blob_url};
pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::execution_engine::{EngineError, ExecutionEngine};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::message_sink::{MAX_BATCH_ENTRIES, QueueClient, QueueEntry, TopicClient, TopicEntry};
pub use self::state_store::{StateStore, StoreError};
