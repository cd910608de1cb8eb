//! geoflow-core
//!
//! Core building blocks for launching and chaining geospatial workflows.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, feature, step, payload, chain, filter, state, errors）
//! - **ports**: 抽象化レイヤー（StateStore, ExecutionEngine, BlobStore, Queue/Topic, Clock, IdGenerator）
//! - **app**: アプリケーションロジック（config, launcher, payload_set）
//! - **publish**: 一括送信（BatchHandler, QueuePublisher, TopicPublisher）
//! - **impls**: 実装（InMemoryStateStore など開発用）

pub mod app;
pub mod domain;
pub mod impls;
pub mod ports;
pub mod publish;
