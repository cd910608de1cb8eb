//! In-memory queue / topic clients.
//!
//! Record every batch call per target and enforce the provider limits the
//! real services enforce, so publisher bugs surface in tests.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::ports::{MAX_BATCH_ENTRIES, QueueClient, QueueEntry, TopicClient, TopicEntry};
use crate::publish::{MAX_MESSAGE_ATTRIBUTES, PublishError};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

fn check_entries<E>(target: &str, entries: &[E]) -> Result<(), PublishError> {
    if entries.is_empty() || entries.len() > MAX_BATCH_ENTRIES {
        return Err(PublishError::Send {
            target: target.to_string(),
            message: format!("batch must hold 1..={MAX_BATCH_ENTRIES} entries, got {}", entries.len()),
        });
    }
    Ok(())
}

#[derive(Default)]
pub struct InMemoryQueueClient {
    batches: Mutex<HashMap<String, Vec<Vec<QueueEntry>>>>,
}

impl InMemoryQueueClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn batch_sizes(&self, queue_url: &str) -> Vec<usize> {
        lock(&self.batches)
            .get(queue_url)
            .map(|b| b.iter().map(Vec::len).collect())
            .unwrap_or_default()
    }

    /// Message bodies in send order.
    pub fn messages(&self, queue_url: &str) -> Vec<String> {
        lock(&self.batches)
            .get(queue_url)
            .map(|b| b.iter().flatten().map(|e| e.body.clone()).collect())
            .unwrap_or_default()
    }
}

impl QueueClient for InMemoryQueueClient {
    fn send_message_batch(&self, queue_url: &str, entries: Vec<QueueEntry>) -> Result<(), PublishError> {
        check_entries(queue_url, &entries)?;
        lock(&self.batches)
            .entry(queue_url.to_string())
            .or_default()
            .push(entries);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryTopicClient {
    batches: Mutex<HashMap<String, Vec<Vec<TopicEntry>>>>,
    failure: Mutex<Option<String>>,
}

impl InMemoryTopicClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following publish fail with `message`.
    pub fn fail_with(&self, message: impl Into<String>) {
        *lock(&self.failure) = Some(message.into());
    }

    pub fn batch_sizes(&self, topic_arn: &str) -> Vec<usize> {
        lock(&self.batches)
            .get(topic_arn)
            .map(|b| b.iter().map(Vec::len).collect())
            .unwrap_or_default()
    }

    pub fn messages(&self, topic_arn: &str) -> Vec<TopicEntry> {
        lock(&self.batches)
            .get(topic_arn)
            .map(|b| b.iter().flatten().cloned().collect())
            .unwrap_or_default()
    }
}

impl TopicClient for InMemoryTopicClient {
    fn publish_batch(&self, topic_arn: &str, entries: Vec<TopicEntry>) -> Result<(), PublishError> {
        if let Some(message) = lock(&self.failure).clone() {
            return Err(PublishError::Send {
                target: topic_arn.to_string(),
                message,
            });
        }
        check_entries(topic_arn, &entries)?;
        if let Some(entry) = entries.iter().find(|e| e.attributes.len() > MAX_MESSAGE_ATTRIBUTES) {
            return Err(PublishError::Send {
                target: topic_arn.to_string(),
                message: format!("entry {} has too many message attributes", entry.id),
            });
        }
        lock(&self.batches)
            .entry(topic_arn.to_string())
            .or_default()
            .push(entries);
        Ok(())
    }
}
