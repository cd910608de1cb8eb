//! Publish - bounded batching and queue/topic publishers.
//!
//! - **handler**: generic `BatchHandler` + scoped flush (`BatchScope`)
//! - **publisher**: `QueuePublisher` / `TopicPublisher` over provider batch calls
//! - **attributes**: message attributes and the feature projection

pub mod attributes;
pub mod handler;
pub mod publisher;

pub use self::attributes::{
    MAX_MESSAGE_ATTRIBUTES, MessageAttribute, MessageAttributes, feature_attributes,
};
pub use self::handler::{BatchHandler, BatchScope, BatchSink, with_batch_handler};
pub use self::publisher::{QueuePublisher, QueueSink, TopicPublisher, TopicSink};

use thiserror::Error;

use crate::domain::ConfigurationError;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PublishError {
    #[error("message has {count} attributes; at most {max} are allowed")]
    AttributeLimitExceeded { count: usize, max: usize },

    #[error("batch send to {target} failed: {message}")]
    Send { target: String, message: String },

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
}
