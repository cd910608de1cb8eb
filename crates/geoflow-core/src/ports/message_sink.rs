//! Queue / Topic ports - プロバイダの一括送信 API
//!
//! 一回の呼び出しで送れる件数と、1 件あたりの attribute 数には上限があります。
//! 上限の検査は publisher 側で行い、ここでは送信だけを抽象化します。

use crate::publish::MessageAttributes;
use crate::publish::PublishError;

/// Provider ceiling on entries per batch call.
pub const MAX_BATCH_ENTRIES: usize = 10;

/// One queue message in a batch call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueEntry {
    /// Unique within one batch call.
    pub id: String,
    pub body: String,
}

/// One topic message in a batch call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicEntry {
    pub id: String,
    pub body: String,
    pub attributes: MessageAttributes,
}

pub trait QueueClient: Send + Sync {
    fn send_message_batch(&self, queue_url: &str, entries: Vec<QueueEntry>) -> Result<(), PublishError>;
}

pub trait TopicClient: Send + Sync {
    fn publish_batch(&self, topic_arn: &str, entries: Vec<TopicEntry>) -> Result<(), PublishError>;
}
